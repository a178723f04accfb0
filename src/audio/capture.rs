//! Microphone capture over PipeWire
//!
//! Implements [`CaptureSession`]: a PipeWire input stream runs on a
//! background thread and accumulates mono samples; `stop` tears the stream
//! down and flushes the destination WAV. If the loop dies on its own the
//! session posts [`AudioEvent::CaptureFinished`] so the transport can
//! react.

use pipewire as pw;
use pw::spa;
use pw::spa::param::format::{MediaSubtype, MediaType};
use pw::spa::param::format_utils;
use pw::spa::pod::Pod;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::Context;
use log::error;

use super::engine::{AudioEvent, CaptureSession, EventSink};
use super::wav;

/// Capture buffer shared with the PipeWire thread.
#[derive(Clone)]
struct SharedCapture {
    inner: Arc<Mutex<CaptureBuffer>>,
}

struct CaptureBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    duration: f64,
}

impl SharedCapture {
    fn new(sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CaptureBuffer {
                samples: Vec::new(),
                sample_rate,
                duration: 0.0,
            })),
        }
    }

    fn push(&self, samples: &[f32], sample_rate: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.sample_rate = sample_rate;
        inner.samples.extend_from_slice(samples);
        inner.duration = wav::duration_seconds(inner.samples.len(), sample_rate);
    }

    fn duration(&self) -> f64 {
        self.inner.lock().unwrap().duration
    }

    fn take(&self) -> (Vec<f32>, u32) {
        let mut inner = self.inner.lock().unwrap();
        let rate = inner.sample_rate;
        (std::mem::take(&mut inner.samples), rate)
    }
}

enum CaptureCommand {
    Stop,
}

/// An open PipeWire capture session writing to a WAV destination.
pub struct PipewireCapture {
    shared: SharedCapture,
    destination: PathBuf,
    stop_requested: Arc<AtomicBool>,
    stop_tx: Option<pw::channel::Sender<CaptureCommand>>,
    thread_handle: Option<JoinHandle<()>>,
    flushed: bool,
}

impl PipewireCapture {
    pub fn open(
        destination: &Path,
        sample_rate: u32,
        events: EventSink,
    ) -> anyhow::Result<Self> {
        // Reserve the destination up front so an unwritable path fails the
        // open rather than the stop.
        std::fs::File::create(destination)
            .with_context(|| format!("cannot create {}", destination.display()))?;

        let shared = SharedCapture::new(sample_rate);
        let stop_requested = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = pw::channel::channel::<CaptureCommand>();

        let state = shared.clone();
        let requested = Arc::clone(&stop_requested);
        let thread_handle = thread::spawn(move || {
            if let Err(e) = run_capture_loop(state, sample_rate, stop_rx) {
                error!("capture loop failed: {e}");
            }
            if !requested.load(Ordering::SeqCst) {
                events.post(AudioEvent::CaptureFinished);
            }
        });

        Ok(Self {
            shared,
            destination: destination.to_path_buf(),
            stop_requested,
            stop_tx: Some(stop_tx),
            thread_handle: Some(thread_handle),
            flushed: false,
        })
    }

    fn shut_down(&mut self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(CaptureCommand::Stop);
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl CaptureSession for PipewireCapture {
    fn elapsed(&self) -> f64 {
        self.shared.duration()
    }

    fn stop(&mut self) -> f64 {
        self.shut_down();
        let duration = self.shared.duration();
        if !self.flushed {
            self.flushed = true;
            let (samples, rate) = self.shared.take();
            if let Err(e) = wav::write_samples(&self.destination, &samples, rate) {
                error!("failed to flush recording: {e:#}");
            }
        }
        duration
    }
}

impl Drop for PipewireCapture {
    fn drop(&mut self) {
        self.shut_down();
    }
}

/// Run the PipeWire capture loop until stopped.
fn run_capture_loop(
    state: SharedCapture,
    sample_rate: u32,
    stop_rx: pw::channel::Receiver<CaptureCommand>,
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
        CaptureCommand::Stop => {
            if let Some(mainloop) = mainloop_weak.upgrade() {
                mainloop.quit();
            }
        }
    });

    struct UserData {
        format: spa::param::audio::AudioInfoRaw,
        state: SharedCapture,
    }

    let user_data = UserData {
        format: Default::default(),
        state,
    };

    let props = pw::properties::properties! {
        *pw::keys::MEDIA_TYPE => "Audio",
        *pw::keys::MEDIA_CATEGORY => "Capture",
        *pw::keys::MEDIA_ROLE => "Communication",
        *pw::keys::APP_NAME => "Murmur Voice Notes",
    };

    let stream = pw::stream::StreamBox::new(&core, "murmur-capture", props)
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
            let n_channels = user_data.format.channels().max(1);
            let rate = user_data.format.rate();
            let n_samples = data.chunk().size() / (std::mem::size_of::<f32>() as u32);

            if let Some(raw_samples) = data.data() {
                // Keep the first channel of each frame.
                let mut mono = Vec::with_capacity((n_samples / n_channels) as usize);
                for i in (0..n_samples).step_by(n_channels as usize) {
                    let start = i as usize * std::mem::size_of::<f32>();
                    let end = start + std::mem::size_of::<f32>();
                    if end <= raw_samples.len() {
                        let sample = f32::from_le_bytes(
                            raw_samples[start..end].try_into().unwrap_or([0; 4]),
                        );
                        mono.push(sample);
                    }
                }
                user_data.state.push(&mono, rate);
            }
        })
        .register()
        .map_err(|e| format!("failed to register stream listener: {e}"))?;

    let mut audio_info = spa::param::audio::AudioInfoRaw::new();
    audio_info.set_format(spa::param::audio::AudioFormat::F32LE);
    audio_info.set_rate(sample_rate);
    audio_info.set_channels(1);

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
            spa::utils::Direction::Input,
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
