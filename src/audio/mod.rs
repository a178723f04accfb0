//! Audio capture, playback, and the transport controller
//!
//! This module provides:
//! - The transport state machine driving recording/playback transitions
//! - A periodic ticker sampling position and signal level
//! - PipeWire-backed capture and playback engines behind trait seams
//! - WAV storage for note audio via hound

pub mod engine;
pub mod meter;
pub mod ticker;
pub mod transport;
pub mod wav;

mod capture;
mod playback;

use std::path::Path;

use engine::{AudioEngine, CaptureSession, EventSink, PlaybackSession};

pub use capture::PipewireCapture;
pub use playback::PipewirePlayback;
pub use transport::{Transport, TransportConfig, TransportMode, TransportSnapshot};
pub use wav::{WavStore, NOTE_SAMPLE_RATE};

/// The real engine: PipeWire streams for both directions.
pub struct PipewireEngine {
    sample_rate: u32,
}

impl PipewireEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Default for PipewireEngine {
    fn default() -> Self {
        Self::new(NOTE_SAMPLE_RATE)
    }
}

impl AudioEngine for PipewireEngine {
    fn open_capture(
        &self,
        destination: &Path,
        events: EventSink,
    ) -> anyhow::Result<Box<dyn CaptureSession>> {
        Ok(Box::new(PipewireCapture::open(
            destination,
            self.sample_rate,
            events,
        )?))
    }

    fn open_playback(
        &self,
        source: &Path,
        events: EventSink,
    ) -> anyhow::Result<Box<dyn PlaybackSession>> {
        Ok(Box::new(PipewirePlayback::open(source, events)?))
    }
}
