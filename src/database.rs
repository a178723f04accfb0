//! JSON-based database for persisting notes
//!
//! Note metadata lives in a JSON file at ~/.local/share/murmur/notes.json;
//! the audio itself stays in the WAV store. Deleting a note also cancels
//! its pending reminder and removes its audio file. Both are best-effort
//! and logged, neither blocks dropping the record.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use log::error;
use uuid::Uuid;

use crate::models::{NoteRecord, Reminder};
use crate::reminders::ReminderScheduler;

pub struct NotesDatabase {
    path: PathBuf,
}

impl NotesDatabase {
    pub fn new() -> Self {
        Self {
            path: Self::default_path(),
        }
    }

    fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("murmur")
            .join("notes.json")
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    fn ensure_dir(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        Ok(())
    }

    /// Load all notes; an absent database is an empty one.
    pub fn load(&self) -> anyhow::Result<Vec<NoteRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_json::from_str(&contents).context("failed to parse notes database")
    }

    pub fn save(&self, notes: &[NoteRecord]) -> anyhow::Result<()> {
        self.ensure_dir()?;
        let contents =
            serde_json::to_string_pretty(notes).context("failed to serialize notes")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    /// Add a new note (newest first) and persist.
    pub fn add_note(&self, note: NoteRecord, existing: &mut Vec<NoteRecord>) -> anyhow::Result<()> {
        existing.insert(0, note);
        self.save(existing)
    }

    /// Replace a note's comment and persist.
    pub fn set_comment(
        &self,
        id: Uuid,
        comment: String,
        existing: &mut Vec<NoteRecord>,
    ) -> anyhow::Result<()> {
        let Some(note) = existing.iter_mut().find(|n| n.id == id) else {
            bail!("no note with id {id}");
        };
        note.comment = comment;
        self.save(existing)
    }

    /// Replace a note's reminder and persist. The caller is responsible
    /// for the matching schedule/cancel call on the scheduler.
    pub fn set_reminder(
        &self,
        id: Uuid,
        reminder: Option<Reminder>,
        existing: &mut Vec<NoteRecord>,
    ) -> anyhow::Result<()> {
        let Some(note) = existing.iter_mut().find(|n| n.id == id) else {
            bail!("no note with id {id}");
        };
        note.reminder = reminder;
        self.save(existing)
    }

    /// Delete a note along with its side effects: cancel a pending
    /// reminder and remove the audio file. Failures in either side effect
    /// are logged and do not block dropping the record.
    pub fn delete_note(
        &self,
        id: Uuid,
        existing: &mut Vec<NoteRecord>,
        reminders: &dyn ReminderScheduler,
    ) -> anyhow::Result<()> {
        let Some(note) = existing.iter().find(|n| n.id == id) else {
            bail!("no note with id {id}");
        };

        if note.reminder.is_some() {
            if let Err(e) = reminders.cancel(id) {
                error!("could not cancel reminder for note {id}: {e:#}");
            }
        }
        if note.audio_path.exists() {
            if let Err(e) = fs::remove_file(&note.audio_path) {
                error!(
                    "could not remove audio file {}: {e}",
                    note.audio_path.display()
                );
            }
        }

        existing.retain(|n| n.id != id);
        self.save(existing)
    }

    /// Find a note by a (possibly shortened) id prefix.
    pub fn find<'a>(notes: &'a [NoteRecord], prefix: &str) -> Option<&'a NoteRecord> {
        if prefix.is_empty() {
            return None;
        }
        notes
            .iter()
            .find(|n| n.id.to_string().starts_with(&prefix.to_lowercase()))
    }
}

impl Default for NotesDatabase {
    fn default() -> Self {
        Self::new()
    }
}
