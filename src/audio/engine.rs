//! Engine seams for the transport controller
//!
//! The transport state machine never talks to audio hardware directly; it
//! drives a [`CaptureSession`] or [`PlaybackSession`] obtained from an
//! [`AudioEngine`]. The PipeWire implementations live in `audio::capture`
//! and `audio::playback`; tests substitute in-memory sessions.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};

use log::debug;

/// An open microphone capture session writing to a destination file.
pub trait CaptureSession: Send {
    /// Seconds of audio captured so far.
    fn elapsed(&self) -> f64;

    /// Stop capturing and flush the destination file.
    ///
    /// Returns the final elapsed time. Must be safe to call more than once.
    fn stop(&mut self) -> f64;
}

/// An open playback session over a single audio resource.
pub trait PlaybackSession: Send {
    /// Total duration of the loaded resource in seconds.
    fn duration(&self) -> f64;

    /// Begin or continue playing from the current position.
    fn start(&mut self);

    /// Suspend output without closing the session.
    fn pause(&mut self);

    /// Move the playback cursor to `seconds` from the start.
    fn seek(&mut self, seconds: f64);

    /// Current position within the resource in seconds.
    fn position(&self) -> f64;

    /// Instantaneous average signal power in dB, floored at
    /// [`SILENCE_FLOOR_DB`](crate::audio::meter::SILENCE_FLOOR_DB).
    fn average_power(&self) -> f32;

    /// Halt output and close the session. Safe to call more than once.
    fn stop(&mut self);
}

/// Factory for capture and playback sessions.
pub trait AudioEngine: Send + Sync {
    /// Open a capture session writing to `destination`.
    fn open_capture(
        &self,
        destination: &Path,
        events: EventSink,
    ) -> anyhow::Result<Box<dyn CaptureSession>>;

    /// Open a playback session over `source`.
    fn open_playback(
        &self,
        source: &Path,
        events: EventSink,
    ) -> anyhow::Result<Box<dyn PlaybackSession>>;
}

/// Side-channel events delivered into the transport's transition function.
///
/// Completions originate from engine sessions; route and interruption
/// events come from whatever device/session event source the host wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEvent {
    /// The capture session finished on its own (not via `stop`).
    CaptureFinished,
    /// The playback session ran out of audio.
    PlaybackFinished,
    /// The output device in use disappeared (e.g. headphones unplugged).
    OutputRouteLost,
    /// Another audio session preempted ours.
    InterruptionBegan,
    /// The interruption ended; `should_resume` carries the system's hint.
    InterruptionEnded { should_resume: bool },
}

/// Cloneable sender half of the transport's event queue.
///
/// Handed to engine sessions so completion notifications can be posted from
/// their worker threads; drained by `Transport::pump_events`.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<AudioEvent>,
}

impl EventSink {
    pub fn post(&self, event: AudioEvent) {
        if self.tx.send(event).is_err() {
            debug!("dropping {event:?}: transport event queue is gone");
        }
    }
}

/// Create a connected event sink/receiver pair.
pub fn event_channel() -> (EventSink, Receiver<AudioEvent>) {
    let (tx, rx) = mpsc::channel();
    (EventSink { tx }, rx)
}
