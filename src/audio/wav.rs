//! WAV storage for note audio
//!
//! Notes are stored as mono linear-PCM f32 WAV files at 44.1kHz. Filenames
//! are derived deterministically from the note's creation timestamp.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use hound::{WavSpec, WavWriter};

/// Sample rate for note audio.
pub const NOTE_SAMPLE_RATE: u32 = 44_100;

fn note_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    }
}

/// Write mono f32 samples to a WAV file at `path`.
pub fn write_samples(path: &Path, samples: &[f32], sample_rate: u32) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = WavWriter::new(BufWriter::new(file), note_spec(sample_rate))
        .context("failed to create WAV writer")?;

    for &sample in samples {
        writer.write_sample(sample).context("failed to write sample")?;
    }
    writer.finalize().context("failed to finalize WAV file")?;
    Ok(())
}

/// Read samples and sample rate from a WAV file, converting integer
/// formats to float.
pub fn read_samples(path: &Path) -> anyhow::Result<(Vec<f32>, u32)> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;

    let samples: Result<Vec<f32>, _> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect()
        }
    };

    Ok((samples.context("failed to read samples")?, sample_rate))
}

/// Duration of a sample buffer in seconds.
pub fn duration_seconds(sample_count: usize, sample_rate: u32) -> f64 {
    sample_count as f64 / sample_rate as f64
}

/// Directory layout and naming for note audio files.
#[derive(Clone)]
pub struct WavStore {
    notes_dir: PathBuf,
}

impl WavStore {
    pub fn new() -> Self {
        let notes_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("murmur")
            .join("notes");
        Self { notes_dir }
    }

    pub fn with_notes_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.notes_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.notes_dir)
    }

    /// Path for a note created at `created_at`. Deterministic: the same
    /// timestamp always maps to the same file.
    pub fn path_for(&self, created_at: DateTime<Utc>) -> PathBuf {
        let stamp = created_at.format("%Y%m%d-%H%M%S");
        self.notes_dir.join(format!("note-{stamp}.wav"))
    }

    /// Remove a note's audio file.
    pub fn remove(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove {}", path.display()))
    }
}

impl Default for WavStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duration_calculation() {
        assert_eq!(duration_seconds(44_100, NOTE_SAMPLE_RATE), 1.0);
        assert_eq!(duration_seconds(22_050, NOTE_SAMPLE_RATE), 0.5);
        assert_eq!(duration_seconds(0, NOTE_SAMPLE_RATE), 0.0);
    }

    #[test]
    fn path_is_deterministic_for_a_timestamp() {
        let store = WavStore::new().with_notes_dir("/tmp/murmur-test");
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();

        let a = store.path_for(at);
        let b = store.path_for(at);
        assert_eq!(a, b);
        assert_eq!(a.file_name().unwrap(), "note-20260314-092653.wav");
    }

    #[test]
    fn written_file_reads_back_with_matching_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let samples = vec![0.25f32; 4_410];

        write_samples(&path, &samples, NOTE_SAMPLE_RATE).unwrap();
        let (read, rate) = read_samples(&path).unwrap();

        assert_eq!(rate, NOTE_SAMPLE_RATE);
        assert_eq!(read.len(), samples.len());
        assert!((duration_seconds(read.len(), rate) - 0.1).abs() < 1e-6);
    }
}
