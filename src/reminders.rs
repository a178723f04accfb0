//! Reminder scheduling and delivery
//!
//! Notes can carry a reminder timestamp. The scheduler interface is
//! narrow, just schedule and cancel by note id, and the desktop
//! implementation keeps pending reminders in a JSON file next to the
//! notes database, delivering due ones as desktop notifications.
//! Repeating reminders re-arm a day ahead after each delivery.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time-based notification scheduling keyed by note id.
pub trait ReminderScheduler {
    fn schedule(&self, note_id: Uuid, at: DateTime<Utc>, repeats: bool) -> anyhow::Result<()>;
    fn cancel(&self, note_id: Uuid) -> anyhow::Result<()>;
}

/// A scheduled-but-not-yet-delivered reminder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingReminder {
    pub note_id: Uuid,
    pub at: DateTime<Utc>,
    pub repeats: bool,
}

/// JSON-backed scheduler delivering desktop notifications.
pub struct DesktopReminders {
    path: PathBuf,
}

impl DesktopReminders {
    pub fn new() -> Self {
        Self {
            path: Self::default_path(),
        }
    }

    fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("murmur")
            .join("reminders.json")
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

    fn load(&self) -> anyhow::Result<Vec<PendingReminder>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_json::from_str(&contents).context("failed to parse reminders file")
    }

    fn save(&self, pending: &[PendingReminder]) -> anyhow::Result<()> {
        self.ensure_dir()?;
        let contents =
            serde_json::to_string_pretty(pending).context("failed to serialize reminders")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    /// Remove and return every reminder due at `now`. Repeating entries
    /// are re-armed to the next future day instead of removed.
    pub fn take_due(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<PendingReminder>> {
        let pending = self.load()?;
        let (due, mut remaining): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(|r| r.at <= now);

        for reminder in &due {
            if reminder.repeats {
                let mut next = reminder.at;
                while next <= now {
                    next += Duration::days(1);
                }
                remaining.push(PendingReminder {
                    at: next,
                    ..*reminder
                });
            }
        }

        self.save(&remaining)?;
        Ok(due)
    }

    /// Deliver every due reminder as a desktop notification. Returns the
    /// number delivered; individual delivery failures are logged.
    pub fn deliver_due(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let due = self.take_due(now)?;
        for reminder in &due {
            info!("delivering reminder for note {}", reminder.note_id);
            let result = notify_rust::Notification::new()
                .appname("Murmur")
                .summary("It is time for your voice note")
                .body(&format!("Play note {} in murmur", reminder.note_id))
                .icon("audio-input-microphone")
                .show();
            if let Err(e) = result {
                error!("failed to show reminder notification: {e}");
            }
        }
        Ok(due.len())
    }
}

impl Default for DesktopReminders {
    fn default() -> Self {
        Self::new()
    }
}

impl ReminderScheduler for DesktopReminders {
    fn schedule(&self, note_id: Uuid, at: DateTime<Utc>, repeats: bool) -> anyhow::Result<()> {
        let mut pending = self.load()?;
        // One reminder per note: scheduling again replaces the old entry.
        pending.retain(|r| r.note_id != note_id);
        pending.push(PendingReminder {
            note_id,
            at,
            repeats,
        });
        self.save(&pending)
    }

    fn cancel(&self, note_id: Uuid) -> anyhow::Result<()> {
        let mut pending = self.load()?;
        pending.retain(|r| r.note_id != note_id);
        self.save(&pending)
    }
}
