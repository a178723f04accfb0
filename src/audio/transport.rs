//! Transport state machine
//!
//! Owns the recording/playback mode, the current position, the active
//! engine session, the progress ticker, and the intensity meter. All user
//! gestures and side-channel device events funnel through here; engine
//! failures are logged and never surfaced as typed errors; callers
//! observe only the resulting state.
//!
//! State transitions run on the owner's thread. The tick thread is the
//! only other writer, which is why the inner state sits behind a mutex;
//! the ticker must never be started or stopped while that lock is held.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, warn};

use super::engine::{
    event_channel, AudioEngine, AudioEvent, CaptureSession, EventSink, PlaybackSession,
};
use super::meter::{Bar, IntensityMeter, DEFAULT_BARS, DEFAULT_DIVISOR};
use super::ticker::{Tick, Ticker, TICK_INTERVAL};
use super::wav::WavStore;

/// The transport's mode. Exactly one value at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    #[default]
    Idle,
    Recording,
    Playing,
    Paused,
}

impl TransportMode {
    pub fn label(&self) -> &'static str {
        match self {
            TransportMode::Idle => "Idle",
            TransportMode::Recording => "Recording",
            TransportMode::Playing => "Playing",
            TransportMode::Paused => "Paused",
        }
    }
}

/// Tunables for the transport; defaults match the meter and ticker
/// constants.
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    pub tick_interval: Duration,
    pub meter_bars: usize,
    pub meter_divisor: f32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tick_interval: TICK_INTERVAL,
            meter_bars: DEFAULT_BARS,
            meter_divisor: DEFAULT_DIVISOR,
        }
    }
}

/// Point-in-time view of the transport for observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportSnapshot {
    pub mode: TransportMode,
    pub position: f64,
    pub recorded_duration: f64,
}

struct TransportInner {
    mode: TransportMode,
    /// Elapsed seconds within the current recording or playback.
    position: f64,
    /// Duration of the most recently completed recording.
    recorded_duration: f64,
    capture: Option<Box<dyn CaptureSession>>,
    playback: Option<Box<dyn PlaybackSession>>,
    /// Destination of the recording in progress (or just finished, until
    /// the host claims it).
    record_path: Option<PathBuf>,
    meter: IntensityMeter,
}

fn enter_idle(st: &mut TransportInner) {
    st.mode = TransportMode::Idle;
    st.meter.reset_states();
}

/// The audio transport controller.
pub struct Transport {
    inner: Arc<Mutex<TransportInner>>,
    ticker: Ticker,
    engine: Arc<dyn AudioEngine>,
    files: WavStore,
    events_tx: EventSink,
    events_rx: Receiver<AudioEvent>,
    tick_interval: Duration,
}

impl Transport {
    pub fn new(engine: Arc<dyn AudioEngine>, files: WavStore, config: TransportConfig) -> Self {
        let (events_tx, events_rx) = event_channel();
        Self {
            inner: Arc::new(Mutex::new(TransportInner {
                mode: TransportMode::Idle,
                position: 0.0,
                recorded_duration: 0.0,
                capture: None,
                playback: None,
                record_path: None,
                meter: IntensityMeter::new(config.meter_bars, config.meter_divisor),
            })),
            ticker: Ticker::new(),
            engine,
            files,
            events_tx,
            events_rx,
            tick_interval: config.tick_interval,
        }
    }

    pub fn mode(&self) -> TransportMode {
        self.inner.lock().unwrap().mode
    }

    pub fn position(&self) -> f64 {
        self.inner.lock().unwrap().position
    }

    pub fn recorded_duration(&self) -> f64 {
        self.inner.lock().unwrap().recorded_duration
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        let st = self.inner.lock().unwrap();
        TransportSnapshot {
            mode: st.mode,
            position: st.position,
            recorded_duration: st.recorded_duration,
        }
    }

    /// Current meter bars, for rendering.
    pub fn meter_bars(&self) -> Vec<Bar> {
        self.inner.lock().unwrap().meter.bars().to_vec()
    }

    /// Path of the recording in progress or just finished, if any.
    pub fn recording_path(&self) -> Option<PathBuf> {
        self.inner.lock().unwrap().record_path.clone()
    }

    /// Claim the finished recording file. Once claimed, `cancel_and_reset`
    /// no longer deletes it; the caller owns it from here.
    pub fn take_recording(&mut self) -> Option<PathBuf> {
        self.inner.lock().unwrap().record_path.take()
    }

    /// Sink for host event sources (route changes, interruptions) and
    /// engine completions.
    pub fn event_sink(&self) -> EventSink {
        self.events_tx.clone()
    }

    /// Open a fresh capture session and start recording.
    ///
    /// Valid from Idle, or from Playing (playback is stopped first). If
    /// the capture session cannot be opened the failure is logged and the
    /// mode is unchanged.
    pub fn start_recording(&mut self) {
        match self.mode() {
            TransportMode::Idle => {}
            TransportMode::Playing => self.stop_playing(),
            other => {
                warn!("start_recording is not valid while {}", other.label());
                return;
            }
        }

        if let Err(e) = self.files.ensure_dir() {
            error!("cannot prepare notes directory: {e}");
            return;
        }
        let path = self.files.path_for(Utc::now());

        match self.engine.open_capture(&path, self.events_tx.clone()) {
            Ok(session) => {
                {
                    let mut st = self.inner.lock().unwrap();
                    st.capture = Some(session);
                    st.record_path = Some(path);
                    st.position = 0.0;
                    st.mode = TransportMode::Recording;
                }
                self.start_ticker();
            }
            Err(e) => error!("failed to open capture session: {e:#}"),
        }
    }

    /// Stop the active recording, capturing its final elapsed time into
    /// `recorded_duration`.
    pub fn stop_recording(&mut self) {
        let session = {
            let mut st = self.inner.lock().unwrap();
            if st.mode != TransportMode::Recording {
                warn!("stop_recording called while {}", st.mode.label());
                return;
            }
            st.capture.take()
        };

        // stop() may join the engine's worker thread; keep it off the lock.
        let duration = session.map(|mut s| s.stop()).unwrap_or(0.0);
        self.ticker.stop();

        let mut st = self.inner.lock().unwrap();
        st.recorded_duration = duration;
        enter_idle(&mut st);
    }

    /// Open `resource` and start playback.
    ///
    /// No-op with a diagnostic when `resource` is `None`. A zero-length
    /// resource is opened but never started: the session is retained and
    /// the mode stays Idle, matching long-observed behavior.
    pub fn play(&mut self, resource: Option<&Path>) {
        if self.mode() != TransportMode::Idle {
            warn!("play is only valid when idle");
            return;
        }
        let Some(path) = resource else {
            warn!("tried to play without an audio resource");
            return;
        };

        match self.engine.open_playback(path, self.events_tx.clone()) {
            Err(e) => error!("failed to open playback session: {e:#}"),
            Ok(mut session) => {
                if session.duration() <= 0.0 {
                    debug!("resource has zero duration; session opened but not started");
                    self.inner.lock().unwrap().playback = Some(session);
                    return;
                }
                session.start();
                {
                    let mut st = self.inner.lock().unwrap();
                    st.playback = Some(session);
                    st.position = 0.0;
                    st.meter.clear();
                    st.mode = TransportMode::Playing;
                }
                self.start_ticker();
            }
        }
    }

    /// Suspend playback, keeping the session and position.
    pub fn pause_playback(&mut self) {
        {
            let mut st = self.inner.lock().unwrap();
            if st.mode != TransportMode::Playing {
                warn!("pause_playback called while {}", st.mode.label());
                return;
            }
            if let Some(p) = st.playback.as_mut() {
                p.pause();
            }
            st.mode = TransportMode::Paused;
        }
        self.ticker.stop();
    }

    /// Continue playback from the last observed position.
    pub fn resume_playback(&mut self) {
        {
            let mut st = self.inner.lock().unwrap();
            if st.mode != TransportMode::Paused {
                warn!("resume_playback called while {}", st.mode.label());
                return;
            }
            let position = st.position;
            if let Some(p) = st.playback.as_mut() {
                p.seek(position);
                p.start();
            }
            st.mode = TransportMode::Playing;
        }
        self.start_ticker();
    }

    /// Halt playback and return to Idle.
    pub fn stop_playing(&mut self) {
        let session = {
            let mut st = self.inner.lock().unwrap();
            if st.mode != TransportMode::Playing && st.mode != TransportMode::Paused {
                warn!("stop_playing called while {}", st.mode.label());
                return;
            }
            st.playback.take()
        };
        if let Some(mut p) = session {
            p.stop();
        }
        self.ticker.stop();
        enter_idle(&mut self.inner.lock().unwrap());
    }

    /// Dispatch to `play`, `pause_playback`, or `resume_playback` based on
    /// the current mode. No-op while recording.
    pub fn toggle_play_pause(&mut self, resource: Option<&Path>) {
        match self.mode() {
            TransportMode::Idle => self.play(resource),
            TransportMode::Recording => {}
            TransportMode::Playing => self.pause_playback(),
            TransportMode::Paused => self.resume_playback(),
        }
    }

    /// React to a scrub gesture. `began == true` suspends the engine and
    /// the ticker without leaving Playing; `began == false` re-seeks to the
    /// current position and resumes. Only reacts while Playing.
    pub fn scrub(&mut self, began: bool) {
        if self.mode() != TransportMode::Playing {
            return;
        }
        if began {
            {
                let mut st = self.inner.lock().unwrap();
                if let Some(p) = st.playback.as_mut() {
                    p.pause();
                }
            }
            self.ticker.stop();
        } else {
            {
                let mut st = self.inner.lock().unwrap();
                let position = st.position;
                if let Some(p) = st.playback.as_mut() {
                    p.seek(position);
                    p.start();
                }
            }
            self.start_ticker();
        }
    }

    /// Blanket cancellation: stop whatever is active, zero the state, and
    /// delete an unclaimed recording file if one exists. Safe to call from
    /// any state, repeatedly.
    pub fn cancel_and_reset(&mut self) {
        let (capture, playback, record_path) = {
            let mut st = self.inner.lock().unwrap();
            (st.capture.take(), st.playback.take(), st.record_path.take())
        };

        if let Some(mut c) = capture {
            c.stop();
        }
        if let Some(mut p) = playback {
            p.stop();
        }
        self.ticker.stop();

        {
            let mut st = self.inner.lock().unwrap();
            st.position = 0.0;
            st.recorded_duration = 0.0;
            st.mode = TransportMode::Idle;
            st.meter.clear();
        }

        if let Some(path) = record_path {
            if path.exists() {
                if let Err(e) = self.files.remove(&path) {
                    error!("could not remove partial recording: {e:#}");
                }
            }
        }
    }

    /// Feed one side-channel event into the transition function.
    ///
    /// Completions are honored only if the mode still matches the session
    /// that produced them; anything else is a stale notification from a
    /// superseded session and is dropped.
    pub fn handle_event(&mut self, event: AudioEvent) {
        match event {
            AudioEvent::CaptureFinished => {
                let session = {
                    let mut st = self.inner.lock().unwrap();
                    if st.mode != TransportMode::Recording {
                        debug!("ignoring stale capture completion");
                        return;
                    }
                    st.capture.take()
                };
                let duration = session.map(|mut s| s.stop());
                self.ticker.stop();
                let mut st = self.inner.lock().unwrap();
                if let Some(d) = duration {
                    st.recorded_duration = d;
                }
                enter_idle(&mut st);
            }
            AudioEvent::PlaybackFinished => {
                let session = {
                    let mut st = self.inner.lock().unwrap();
                    if st.mode != TransportMode::Playing {
                        debug!("ignoring stale playback completion");
                        return;
                    }
                    st.playback.take()
                };
                if let Some(mut p) = session {
                    p.stop();
                }
                self.ticker.stop();
                enter_idle(&mut self.inner.lock().unwrap());
            }
            AudioEvent::OutputRouteLost => match self.mode() {
                TransportMode::Playing => self.stop_playing(),
                TransportMode::Recording => self.stop_recording(),
                _ => {}
            },
            AudioEvent::InterruptionBegan => match self.mode() {
                TransportMode::Playing => self.pause_playback(),
                // Capture cannot be silently paused; stopping is the only
                // safe response.
                TransportMode::Recording => self.stop_recording(),
                _ => {}
            },
            AudioEvent::InterruptionEnded { should_resume } => {
                if should_resume && self.mode() == TransportMode::Paused {
                    self.resume_playback();
                }
            }
        }
    }

    /// Drain queued events into [`Transport::handle_event`].
    pub fn pump_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
    }

    fn start_ticker(&mut self) {
        let inner = Arc::clone(&self.inner);
        self.ticker.start(self.tick_interval, move || {
            let mut guard = inner.lock().unwrap();
            let st = &mut *guard;
            match st.mode {
                TransportMode::Recording => {
                    if let Some(c) = st.capture.as_ref() {
                        st.position = c.elapsed();
                    }
                    Tick::Continue
                }
                TransportMode::Playing | TransportMode::Paused => {
                    if let Some(p) = st.playback.as_ref() {
                        st.position = p.position();
                        if st.mode == TransportMode::Playing {
                            let decibels = p.average_power();
                            let duration = p.duration();
                            st.meter.sample(st.position, duration, decibels, true);
                        }
                    }
                    Tick::Continue
                }
                TransportMode::Idle => {
                    // Invariant guard, not a normal path.
                    error!("ticker fired while idle; stopping it");
                    Tick::Stop
                }
            }
        });
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.ticker.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::meter::BarState;
    use std::thread::sleep;
    use std::time::Instant;

    struct MockCapture {
        started: Instant,
        stopped: Option<f64>,
    }

    impl CaptureSession for MockCapture {
        fn elapsed(&self) -> f64 {
            self.stopped
                .unwrap_or_else(|| self.started.elapsed().as_secs_f64())
        }

        fn stop(&mut self) -> f64 {
            let elapsed = self.elapsed();
            self.stopped = Some(elapsed);
            elapsed
        }
    }

    struct MockPlayback {
        duration: f64,
        base: f64,
        playing_since: Option<Instant>,
    }

    impl MockPlayback {
        fn current(&self) -> f64 {
            let pos = self.base
                + self
                    .playing_since
                    .map(|t| t.elapsed().as_secs_f64())
                    .unwrap_or(0.0);
            pos.min(self.duration)
        }
    }

    impl PlaybackSession for MockPlayback {
        fn duration(&self) -> f64 {
            self.duration
        }

        fn start(&mut self) {
            if self.playing_since.is_none() {
                self.playing_since = Some(Instant::now());
            }
        }

        fn pause(&mut self) {
            self.base = self.current();
            self.playing_since = None;
        }

        fn seek(&mut self, seconds: f64) {
            let was_playing = self.playing_since.is_some();
            self.base = seconds.clamp(0.0, self.duration);
            if was_playing {
                self.playing_since = Some(Instant::now());
            }
        }

        fn position(&self) -> f64 {
            self.current()
        }

        fn average_power(&self) -> f32 {
            -24.0
        }

        fn stop(&mut self) {
            self.pause();
        }
    }

    struct MockEngine {
        fail_capture: bool,
        playback_duration: f64,
        last_sink: Mutex<Option<EventSink>>,
    }

    impl MockEngine {
        fn new() -> Self {
            Self {
                fail_capture: false,
                playback_duration: 10.0,
                last_sink: Mutex::new(None),
            }
        }

        fn sink(&self) -> EventSink {
            self.last_sink.lock().unwrap().clone().unwrap()
        }
    }

    impl AudioEngine for MockEngine {
        fn open_capture(
            &self,
            destination: &Path,
            events: EventSink,
        ) -> anyhow::Result<Box<dyn CaptureSession>> {
            if self.fail_capture {
                anyhow::bail!("no capture device");
            }
            *self.last_sink.lock().unwrap() = Some(events);
            std::fs::File::create(destination)?;
            Ok(Box::new(MockCapture {
                started: Instant::now(),
                stopped: None,
            }))
        }

        fn open_playback(
            &self,
            _source: &Path,
            events: EventSink,
        ) -> anyhow::Result<Box<dyn PlaybackSession>> {
            *self.last_sink.lock().unwrap() = Some(events);
            Ok(Box::new(MockPlayback {
                duration: self.playback_duration,
                base: 0.0,
                playing_since: None,
            }))
        }
    }

    struct Fixture {
        engine: Arc<MockEngine>,
        transport: Transport,
        _dir: tempfile::TempDir,
        clip: PathBuf,
    }

    fn fixture(engine: MockEngine) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.wav");
        let engine = Arc::new(engine);
        let files = WavStore::new().with_notes_dir(dir.path());
        let transport = Transport::new(
            Arc::clone(&engine) as Arc<dyn AudioEngine>,
            files,
            TransportConfig::default(),
        );
        Fixture {
            engine,
            transport,
            _dir: dir,
            clip,
        }
    }

    #[test]
    fn recording_tracks_elapsed_time_and_stop_captures_duration() {
        let mut f = fixture(MockEngine::new());
        f.transport.start_recording();
        assert_eq!(f.transport.mode(), TransportMode::Recording);

        sleep(Duration::from_millis(500));
        let midway = f.transport.position();
        assert!(
            (midway - 0.5).abs() < 0.15,
            "midway position was {midway}"
        );

        sleep(Duration::from_millis(500));
        f.transport.stop_recording();
        assert_eq!(f.transport.mode(), TransportMode::Idle);
        let duration = f.transport.recorded_duration();
        assert!(
            (duration - 1.0).abs() < 0.1,
            "recorded duration was {duration}"
        );
    }

    #[test]
    fn capture_open_failure_leaves_state_unchanged() {
        let mut f = fixture(MockEngine {
            fail_capture: true,
            ..MockEngine::new()
        });
        f.transport.start_recording();
        assert_eq!(f.transport.mode(), TransportMode::Idle);
        assert_eq!(f.transport.position(), 0.0);
        assert!(f.transport.recording_path().is_none());
    }

    #[test]
    fn start_recording_while_playing_stops_playback_first() {
        let mut f = fixture(MockEngine::new());
        f.transport.play(Some(&f.clip));
        assert_eq!(f.transport.mode(), TransportMode::Playing);

        f.transport.start_recording();
        assert_eq!(f.transport.mode(), TransportMode::Recording);
    }

    #[test]
    fn start_recording_is_rejected_while_paused() {
        let mut f = fixture(MockEngine::new());
        f.transport.play(Some(&f.clip));
        f.transport.pause_playback();

        f.transport.start_recording();
        assert_eq!(f.transport.mode(), TransportMode::Paused);
    }

    #[test]
    fn play_without_resource_is_a_noop() {
        let mut f = fixture(MockEngine::new());
        f.transport.play(None);
        assert_eq!(f.transport.mode(), TransportMode::Idle);
    }

    #[test]
    fn zero_duration_resource_never_plays() {
        let mut f = fixture(MockEngine {
            playback_duration: 0.0,
            ..MockEngine::new()
        });
        f.transport.play(Some(&f.clip));
        assert_eq!(f.transport.mode(), TransportMode::Idle);
        assert_eq!(f.transport.position(), 0.0);
    }

    #[test]
    fn playback_position_advances() {
        let mut f = fixture(MockEngine::new());
        f.transport.play(Some(&f.clip));

        sleep(Duration::from_millis(500));
        assert_eq!(f.transport.mode(), TransportMode::Playing);
        let position = f.transport.position();
        assert!(
            (position - 0.5).abs() < 0.15,
            "position after 0.5s was {position}"
        );
    }

    #[test]
    fn pause_freezes_position_and_resume_continues_from_it() {
        let mut f = fixture(MockEngine::new());
        f.transport.play(Some(&f.clip));
        sleep(Duration::from_millis(400));

        f.transport.pause_playback();
        assert_eq!(f.transport.mode(), TransportMode::Paused);
        let paused_at = f.transport.position();
        assert!(paused_at > 0.2, "paused position was {paused_at}");

        sleep(Duration::from_millis(200));
        assert_eq!(f.transport.position(), paused_at);

        f.transport.resume_playback();
        assert_eq!(f.transport.mode(), TransportMode::Playing);
        sleep(Duration::from_millis(200));
        let resumed = f.transport.position();
        assert!(
            resumed >= paused_at && (resumed - paused_at - 0.2).abs() < 0.15,
            "resumed position was {resumed}, paused at {paused_at}"
        );
    }

    #[test]
    fn scrub_suspends_updates_without_leaving_playing() {
        let mut f = fixture(MockEngine::new());
        f.transport.play(Some(&f.clip));
        sleep(Duration::from_millis(200));

        f.transport.scrub(true);
        assert_eq!(f.transport.mode(), TransportMode::Playing);
        let held = f.transport.position();
        sleep(Duration::from_millis(200));
        assert_eq!(f.transport.position(), held);

        f.transport.scrub(false);
        sleep(Duration::from_millis(200));
        assert!(f.transport.position() > held);
        assert_eq!(f.transport.mode(), TransportMode::Playing);
    }

    #[test]
    fn cancel_and_reset_removes_partial_recording_and_is_idempotent() {
        let mut f = fixture(MockEngine::new());
        f.transport.start_recording();
        let path = f.transport.recording_path().unwrap();
        assert!(path.exists());
        sleep(Duration::from_millis(100));

        f.transport.cancel_and_reset();
        assert_eq!(f.transport.mode(), TransportMode::Idle);
        assert_eq!(f.transport.position(), 0.0);
        assert_eq!(f.transport.recorded_duration(), 0.0);
        assert!(!path.exists());

        // Repeated calls are harmless, including from Idle.
        f.transport.cancel_and_reset();
        assert_eq!(f.transport.mode(), TransportMode::Idle);
    }

    #[test]
    fn cancel_and_reset_clears_playback() {
        let mut f = fixture(MockEngine::new());
        f.transport.play(Some(&f.clip));
        sleep(Duration::from_millis(150));

        f.transport.cancel_and_reset();
        assert_eq!(f.transport.mode(), TransportMode::Idle);
        assert_eq!(f.transport.position(), 0.0);
    }

    #[test]
    fn claimed_recording_survives_cancel() {
        let mut f = fixture(MockEngine::new());
        f.transport.start_recording();
        sleep(Duration::from_millis(100));
        f.transport.stop_recording();

        let path = f.transport.take_recording().unwrap();
        assert!(path.exists());

        f.transport.cancel_and_reset();
        assert!(path.exists());
    }

    #[test]
    fn stale_completions_are_ignored() {
        let mut f = fixture(MockEngine::new());
        f.transport.play(Some(&f.clip));

        // A capture completion from a superseded session must not disturb
        // active playback.
        f.transport.handle_event(AudioEvent::CaptureFinished);
        assert_eq!(f.transport.mode(), TransportMode::Playing);

        f.transport.stop_playing();
        f.transport.handle_event(AudioEvent::PlaybackFinished);
        assert_eq!(f.transport.mode(), TransportMode::Idle);
    }

    #[test]
    fn playback_completion_returns_to_idle_and_neutralizes_bars() {
        let mut f = fixture(MockEngine::new());
        f.transport.play(Some(&f.clip));
        sleep(Duration::from_millis(200));
        assert!(f
            .transport
            .meter_bars()
            .iter()
            .any(|b| b.state == BarState::Played));

        f.transport.handle_event(AudioEvent::PlaybackFinished);
        assert_eq!(f.transport.mode(), TransportMode::Idle);
        assert!(f
            .transport
            .meter_bars()
            .iter()
            .all(|b| b.state == BarState::Neutral));
    }

    #[test]
    fn route_loss_stops_playback() {
        let mut f = fixture(MockEngine::new());
        f.transport.play(Some(&f.clip));

        // Delivered the way a device event source would: through the sink.
        f.transport.event_sink().post(AudioEvent::OutputRouteLost);
        f.transport.pump_events();
        assert_eq!(f.transport.mode(), TransportMode::Idle);
    }

    #[test]
    fn route_loss_stops_recording_with_duration() {
        let mut f = fixture(MockEngine::new());
        f.transport.start_recording();
        sleep(Duration::from_millis(200));

        f.transport.handle_event(AudioEvent::OutputRouteLost);
        assert_eq!(f.transport.mode(), TransportMode::Idle);
        assert!(f.transport.recorded_duration() > 0.1);
    }

    #[test]
    fn interruption_pauses_playback_and_resume_hint_restores_it() {
        let mut f = fixture(MockEngine::new());
        f.transport.play(Some(&f.clip));
        sleep(Duration::from_millis(200));

        f.transport.handle_event(AudioEvent::InterruptionBegan);
        assert_eq!(f.transport.mode(), TransportMode::Paused);
        let paused_at = f.transport.position();

        f.transport
            .handle_event(AudioEvent::InterruptionEnded { should_resume: false });
        assert_eq!(f.transport.mode(), TransportMode::Paused);

        f.transport
            .handle_event(AudioEvent::InterruptionEnded { should_resume: true });
        assert_eq!(f.transport.mode(), TransportMode::Playing);
        assert!(f.transport.position() >= paused_at);
    }

    #[test]
    fn interruption_stops_recording() {
        let mut f = fixture(MockEngine::new());
        f.transport.start_recording();
        sleep(Duration::from_millis(150));

        f.transport.handle_event(AudioEvent::InterruptionBegan);
        assert_eq!(f.transport.mode(), TransportMode::Idle);
        assert!(f.transport.recorded_duration() > 0.05);
    }

    #[test]
    fn toggle_dispatches_by_mode() {
        let mut f = fixture(MockEngine::new());

        f.transport.toggle_play_pause(Some(&f.clip));
        assert_eq!(f.transport.mode(), TransportMode::Playing);

        f.transport.toggle_play_pause(Some(&f.clip));
        assert_eq!(f.transport.mode(), TransportMode::Paused);

        f.transport.toggle_play_pause(Some(&f.clip));
        assert_eq!(f.transport.mode(), TransportMode::Playing);

        f.transport.stop_playing();
        f.transport.start_recording();
        f.transport.toggle_play_pause(Some(&f.clip));
        assert_eq!(f.transport.mode(), TransportMode::Recording);
    }

    #[test]
    fn engine_posted_events_arrive_via_pump() {
        let mut f = fixture(MockEngine::new());
        f.transport.play(Some(&f.clip));

        f.engine.sink().post(AudioEvent::PlaybackFinished);
        f.transport.pump_events();
        assert_eq!(f.transport.mode(), TransportMode::Idle);
    }
}
