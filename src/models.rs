use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An optional scheduled reminder for a note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub at: DateTime<Utc>,
    pub repeats: bool,
}

/// A saved voice note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: Uuid,
    pub audio_path: PathBuf,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub reminder: Option<Reminder>,
}

impl NoteRecord {
    pub fn new(
        audio_path: PathBuf,
        comment: String,
        duration_seconds: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            audio_path,
            comment,
            created_at,
            duration_seconds,
            reminder: None,
        }
    }

    /// Short display form of the id, for list output.
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }
}
