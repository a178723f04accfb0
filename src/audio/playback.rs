//! Audio playback over PipeWire
//!
//! Implements [`PlaybackSession`]: the note's WAV is preloaded into memory
//! and a PipeWire output stream on a background thread drains it. Pausing
//! keeps the stream alive but delivers silence without advancing the
//! cursor, so seek and resume stay cheap. Natural exhaustion posts
//! [`AudioEvent::PlaybackFinished`].

use pipewire as pw;
use pw::spa;
use pw::spa::param::format::{MediaSubtype, MediaType};
use pw::spa::param::format_utils;
use pw::spa::pod::Pod;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::Context;
use log::error;

use super::engine::{AudioEvent, EventSink, PlaybackSession};
use super::meter::SILENCE_FLOOR_DB;
use super::wav;

/// What the process callback should write next.
enum Feed {
    Chunk(Vec<f32>),
    Silence,
    Exhausted,
}

/// Playback cursor shared with the PipeWire thread.
#[derive(Clone)]
struct SharedPlayback {
    inner: Arc<Mutex<PlayCursor>>,
}

struct PlayCursor {
    samples: Vec<f32>,
    sample_rate: u32,
    cursor: usize,
    paused: bool,
    recent_rms: f32,
}

impl SharedPlayback {
    fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PlayCursor {
                samples,
                sample_rate,
                cursor: 0,
                paused: false,
                recent_rms: 0.0,
            })),
        }
    }

    fn position(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        wav::duration_seconds(inner.cursor, inner.sample_rate)
    }

    fn seek(&self, seconds: f64) {
        let mut inner = self.inner.lock().unwrap();
        let target = (seconds.max(0.0) * inner.sample_rate as f64) as usize;
        inner.cursor = target.min(inner.samples.len());
    }

    fn set_paused(&self, paused: bool) {
        self.inner.lock().unwrap().paused = paused;
    }

    fn recent_rms(&self) -> f32 {
        self.inner.lock().unwrap().recent_rms
    }

    /// Advance the cursor by up to `count` samples.
    fn next(&self, count: usize) -> Feed {
        let mut inner = self.inner.lock().unwrap();
        if inner.paused {
            inner.recent_rms = 0.0;
            return Feed::Silence;
        }
        if inner.cursor >= inner.samples.len() {
            return Feed::Exhausted;
        }

        let end = (inner.cursor + count).min(inner.samples.len());
        let chunk = inner.samples[inner.cursor..end].to_vec();
        inner.cursor = end;

        let mean_sq: f32 = chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32;
        inner.recent_rms = mean_sq.sqrt();

        Feed::Chunk(chunk)
    }
}

enum PlaybackCommand {
    Stop,
}

/// An open PipeWire playback session over one WAV resource.
pub struct PipewirePlayback {
    shared: SharedPlayback,
    duration: f64,
    events: EventSink,
    stop_requested: Arc<AtomicBool>,
    stop_tx: Option<pw::channel::Sender<PlaybackCommand>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl PipewirePlayback {
    pub fn open(source: &Path, events: EventSink) -> anyhow::Result<Self> {
        let (samples, sample_rate) = wav::read_samples(source)
            .with_context(|| format!("cannot load {}", source.display()))?;
        let duration = wav::duration_seconds(samples.len(), sample_rate);

        Ok(Self {
            shared: SharedPlayback::new(samples, sample_rate),
            duration,
            events,
            stop_requested: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            thread_handle: None,
        })
    }

    fn loop_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    fn spawn_loop(&mut self) {
        let (stop_tx, stop_rx) = pw::channel::channel::<PlaybackCommand>();
        self.stop_tx = Some(stop_tx);
        self.stop_requested.store(false, Ordering::SeqCst);

        let shared = self.shared.clone();
        let events = self.events.clone();
        let requested = Arc::clone(&self.stop_requested);
        self.thread_handle = Some(thread::spawn(move || {
            if let Err(e) = run_playback_loop(shared, events.clone(), stop_rx) {
                error!("playback loop failed: {e}");
                if !requested.load(Ordering::SeqCst) {
                    events.post(AudioEvent::PlaybackFinished);
                }
            }
        }));
    }

    fn shut_down(&mut self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(PlaybackCommand::Stop);
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl PlaybackSession for PipewirePlayback {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn start(&mut self) {
        self.shared.set_paused(false);
        if !self.loop_running() {
            self.spawn_loop();
        }
    }

    fn pause(&mut self) {
        self.shared.set_paused(true);
    }

    fn seek(&mut self, seconds: f64) {
        self.shared.seek(seconds);
    }

    fn position(&self) -> f64 {
        self.shared.position()
    }

    fn average_power(&self) -> f32 {
        let rms = self.shared.recent_rms();
        if rms <= 0.0 {
            SILENCE_FLOOR_DB
        } else {
            (20.0 * rms.log10()).max(SILENCE_FLOOR_DB)
        }
    }

    fn stop(&mut self) {
        self.shut_down();
    }
}

impl Drop for PipewirePlayback {
    fn drop(&mut self) {
        self.shut_down();
    }
}

/// Run the PipeWire playback loop until stopped or exhausted.
fn run_playback_loop(
    shared: SharedPlayback,
    events: EventSink,
    stop_rx: pw::channel::Receiver<PlaybackCommand>,
) -> Result<(), String> {
    pw::init();

    let mainloop = pw::main_loop::MainLoopRc::new(None)
        .map_err(|e| format!("failed to create PipeWire main loop: {e}"))?;

    let context = pw::context::ContextRc::new(&mainloop, None)
        .map_err(|e| format!("failed to create PipeWire context: {e}"))?;

    let core = context
        .connect_rc(None)
        .map_err(|e| format!("failed to connect to PipeWire: {e}"))?;

    let mainloop_weak = mainloop.downgrade();
    let _receiver = stop_rx.attach(mainloop.loop_(), move |cmd| match cmd {
        PlaybackCommand::Stop => {
            if let Some(mainloop) = mainloop_weak.upgrade() {
                mainloop.quit();
            }
        }
    });

    struct UserData {
        format: spa::param::audio::AudioInfoRaw,
        shared: SharedPlayback,
        events: EventSink,
        finished: bool,
        mainloop_weak: pw::main_loop::MainLoopWeak,
    }

    let user_data = UserData {
        format: Default::default(),
        shared: shared.clone(),
        events,
        finished: false,
        mainloop_weak: mainloop.downgrade(),
    };

    let sample_rate = {
        let inner = shared.inner.lock().unwrap();
        inner.sample_rate
    };

    let props = pw::properties::properties! {
        *pw::keys::MEDIA_TYPE => "Audio",
        *pw::keys::MEDIA_CATEGORY => "Playback",
        *pw::keys::MEDIA_ROLE => "Music",
        *pw::keys::APP_NAME => "Murmur Voice Notes",
    };

    let stream = pw::stream::StreamBox::new(&core, "murmur-playback", props)
        .map_err(|e| format!("failed to create PipeWire stream: {e}"))?;

    let _listener = stream
        .add_local_listener_with_user_data(user_data)
        .param_changed(|_, user_data, id, param| {
            let Some(param) = param else { return };
            if id != spa::param::ParamType::Format.as_raw() {
                return;
            }

            let (media_type, media_subtype) = match format_utils::parse_format(param) {
                Ok(v) => v,
                Err(_) => return,
            };

            if media_type != MediaType::Audio || media_subtype != MediaSubtype::Raw {
                return;
            }

            if let Err(e) = user_data.format.parse(param) {
                error!("failed to parse negotiated audio format: {e:?}");
            }
        })
        .process(|stream, user_data| {
            let Some(mut buffer) = stream.dequeue_buffer() else {
                return;
            };

            let datas = buffer.datas_mut();
            if datas.is_empty() {
                return;
            }

            let data = &mut datas[0];
            let n_channels = user_data.format.channels().max(1) as usize;
            let stride = std::mem::size_of::<f32>() * n_channels;

            let Some(slice) = data.data() else {
                return;
            };

            let n_frames = slice.len() / stride;

            match user_data.shared.next(n_frames) {
                Feed::Chunk(chunk) => {
                    for (i, &sample) in chunk.iter().enumerate() {
                        let offset = i * stride;
                        if offset + std::mem::size_of::<f32>() <= slice.len() {
                            let bytes = sample.to_le_bytes();
                            slice[offset..offset + 4].copy_from_slice(&bytes);
                            // Duplicate mono into the second channel.
                            if n_channels > 1 && offset + 8 <= slice.len() {
                                slice[offset + 4..offset + 8].copy_from_slice(&bytes);
                            }
                        }
                    }
                    let written = chunk.len() * stride;
                    if written < slice.len() {
                        slice[written..].fill(0);
                    }

                    let chunk_meta = data.chunk_mut();
                    *chunk_meta.offset_mut() = 0;
                    *chunk_meta.stride_mut() = stride as i32;
                    *chunk_meta.size_mut() = (chunk.len() * stride) as u32;
                }
                Feed::Silence => {
                    slice.fill(0);
                    let chunk_meta = data.chunk_mut();
                    *chunk_meta.offset_mut() = 0;
                    *chunk_meta.stride_mut() = stride as i32;
                    *chunk_meta.size_mut() = (n_frames * stride) as u32;
                }
                Feed::Exhausted => {
                    if !user_data.finished {
                        user_data.finished = true;
                        user_data.events.post(AudioEvent::PlaybackFinished);
                    }
                    if let Some(mainloop) = user_data.mainloop_weak.upgrade() {
                        mainloop.quit();
                    }
                }
            }
        })
        .register()
        .map_err(|e| format!("failed to register stream listener: {e}"))?;

    let mut audio_info = spa::param::audio::AudioInfoRaw::new();
    audio_info.set_format(spa::param::audio::AudioFormat::F32LE);
    audio_info.set_rate(sample_rate);

    let obj = spa::pod::Object {
        type_: spa::utils::SpaTypes::ObjectParamFormat.as_raw(),
        id: spa::param::ParamType::EnumFormat.as_raw(),
        properties: audio_info.into(),
    };

    let values: Vec<u8> = spa::pod::serialize::PodSerializer::serialize(
        std::io::Cursor::new(Vec::new()),
        &spa::pod::Value::Object(obj),
    )
    .map_err(|e| format!("failed to serialize audio format: {e:?}"))?
    .0
    .into_inner();

    let mut params = [Pod::from_bytes(&values).unwrap()];

    stream
        .connect(
            spa::utils::Direction::Output,
            None,
            pw::stream::StreamFlags::AUTOCONNECT
                | pw::stream::StreamFlags::MAP_BUFFERS
                | pw::stream::StreamFlags::RT_PROCESS,
            &mut params,
        )
        .map_err(|e| format!("failed to connect stream: {e}"))?;

    mainloop.run();

    Ok(())
}
