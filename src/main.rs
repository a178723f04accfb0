//! Murmur - a personal voice note recorder for Linux
//!
//! Records short audio clips with comments and optional reminders, and
//! plays them back with a live intensity display.

mod audio;
mod cli;
mod database;
mod models;
mod reminders;
mod settings;

use std::io::Write;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::info;
use uuid::Uuid;

use audio::meter::{Bar, BarState};
use audio::{PipewireEngine, Transport, TransportMode, WavStore};
use cli::Command;
use database::NotesDatabase;
use models::{NoteRecord, Reminder};
use reminders::{DesktopReminders, ReminderScheduler};
use settings::Settings;

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    cli::init_logging(&args);

    let settings_path = Settings::default_path();
    let settings = Settings::load_from(&settings_path);
    if !settings_path.exists() {
        if let Err(e) = settings.save_to(&settings_path) {
            log::debug!("could not write default settings: {e:#}");
        }
    }

    match args.command {
        Command::Record {
            comment,
            remind,
            repeats,
        } => cmd_record(&settings, comment, remind, repeats),
        Command::List => cmd_list(),
        Command::Play { id } => cmd_play(&settings, &id),
        Command::Delete { id, yes } => cmd_delete(&settings, &id, yes),
        Command::Comment { id, text } => cmd_comment(&id, text),
        Command::Remind {
            id,
            at,
            repeats,
            clear,
        } => cmd_remind(&id, at, repeats, clear),
        Command::Watch { interval_secs } => cmd_watch(interval_secs),
    }
}

fn open_transport(settings: &Settings) -> Transport {
    let engine = Arc::new(PipewireEngine::new(settings.sample_rate));
    Transport::new(engine, WavStore::new(), settings.transport_config())
}

fn parse_reminder_time(value: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("'{value}' is not an RFC 3339 timestamp"))
}

fn cmd_record(
    settings: &Settings,
    comment: String,
    remind: Option<String>,
    repeats: bool,
) -> anyhow::Result<()> {
    let reminder = remind
        .as_deref()
        .map(parse_reminder_time)
        .transpose()?
        .map(|at| Reminder { at, repeats });

    let created_at = Utc::now();
    let mut transport = open_transport(settings);
    transport.start_recording();
    if transport.mode() != TransportMode::Recording {
        bail!("could not start recording; see log for details");
    }
    if let Some(path) = transport.recording_path() {
        info!("recording to {}", path.display());
    }

    println!("Recording... press Enter to stop.");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    transport.stop_recording();
    let duration = transport.recorded_duration();
    let Some(audio_path) = transport.take_recording() else {
        bail!("no recording was produced");
    };

    let mut note = NoteRecord::new(audio_path, comment, duration, created_at);
    note.reminder = reminder;
    let id = note.id;

    let db = NotesDatabase::new();
    let mut notes = db.load()?;
    db.add_note(note, &mut notes)?;

    if let Some(r) = reminder {
        DesktopReminders::new().schedule(id, r.at, r.repeats)?;
    }

    println!("Saved note {} ({duration:.1}s)", &id.to_string()[..8]);
    Ok(())
}

fn cmd_list() -> anyhow::Result<()> {
    let notes = NotesDatabase::new().load()?;
    if notes.is_empty() {
        println!("No notes yet. Try `murmur record`.");
        return Ok(());
    }

    for note in &notes {
        let reminder = match note.reminder {
            Some(r) if r.repeats => format!("  ⏰ {} (daily)", r.at.format("%Y-%m-%d %H:%M")),
            Some(r) => format!("  ⏰ {}", r.at.format("%Y-%m-%d %H:%M")),
            None => String::new(),
        };
        println!(
            "{}  {}  {:>6.1}s  {}{}",
            note.short_id(),
            note.created_at.format("%Y-%m-%d %H:%M"),
            note.duration_seconds,
            note.comment,
            reminder
        );
    }
    Ok(())
}

fn render_bars(bars: &[Bar]) -> String {
    const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    bars.iter()
        .map(|bar| match bar.state {
            BarState::Neutral => '·',
            BarState::Played => {
                let step = (bar.magnitude.clamp(0.0, 1.0) * (BLOCKS.len() - 1) as f32).round();
                BLOCKS[step as usize]
            }
        })
        .collect()
}

fn cmd_play(settings: &Settings, id: &str) -> anyhow::Result<()> {
    let notes = NotesDatabase::new().load()?;
    let Some(note) = NotesDatabase::find(&notes, id) else {
        bail!("no note matches '{id}'");
    };
    if !note.audio_path.exists() {
        bail!("audio file {} is missing", note.audio_path.display());
    }

    let mut transport = open_transport(settings);
    transport.play(Some(note.audio_path.as_path()));
    if transport.mode() != TransportMode::Playing {
        // Zero-length notes open a session but never start.
        println!("Nothing to play ({:.1}s note).", note.duration_seconds);
        return Ok(());
    }

    let mut stdout = std::io::stdout();
    loop {
        transport.pump_events();
        let snapshot = transport.snapshot();
        if snapshot.mode == TransportMode::Idle {
            break;
        }
        print!(
            "\r{:5.1}s / {:.1}s  {}",
            snapshot.position,
            note.duration_seconds,
            render_bars(&transport.meter_bars())
        );
        let _ = stdout.flush();
        sleep(Duration::from_millis(100));
    }
    println!();
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y"))
}

fn cmd_delete(settings: &Settings, id: &str, yes: bool) -> anyhow::Result<()> {
    let db = NotesDatabase::new();
    let mut notes = db.load()?;
    let Some(note) = NotesDatabase::find(&notes, id) else {
        bail!("no note matches '{id}'");
    };
    let note_id = note.id;
    let short = note.short_id();

    if settings.confirm_on_delete && !yes && !confirm(&format!("Delete note {short}?"))? {
        println!("Kept note {short}.");
        return Ok(());
    }

    db.delete_note(note_id, &mut notes, &DesktopReminders::new())?;
    println!("Deleted note {short}.");
    Ok(())
}

fn cmd_comment(id: &str, text: String) -> anyhow::Result<()> {
    let db = NotesDatabase::new();
    let mut notes = db.load()?;
    let Some(note) = NotesDatabase::find(&notes, id) else {
        bail!("no note matches '{id}'");
    };
    let note_id = note.id;
    db.set_comment(note_id, text, &mut notes)
}

fn cmd_remind(id: &str, at: Option<String>, repeats: bool, clear: bool) -> anyhow::Result<()> {
    let db = NotesDatabase::new();
    let scheduler = DesktopReminders::new();
    let mut notes = db.load()?;
    let Some(note) = NotesDatabase::find(&notes, id) else {
        bail!("no note matches '{id}'");
    };
    let note_id: Uuid = note.id;

    if clear {
        scheduler.cancel(note_id)?;
        db.set_reminder(note_id, None, &mut notes)?;
        println!("Cleared reminder.");
        return Ok(());
    }

    let Some(at) = at else {
        bail!("either --at <time> or --clear is required");
    };
    let at = parse_reminder_time(&at)?;
    scheduler.schedule(note_id, at, repeats)?;
    db.set_reminder(note_id, Some(Reminder { at, repeats }), &mut notes)?;
    println!("Reminder set for {}.", at.format("%Y-%m-%d %H:%M"));
    Ok(())
}

fn cmd_watch(interval_secs: u64) -> anyhow::Result<()> {
    let scheduler = DesktopReminders::new();
    info!("watching for due reminders every {interval_secs}s");
    loop {
        match scheduler.deliver_due(Utc::now()) {
            Ok(0) => {}
            Ok(n) => info!("delivered {n} reminder(s)"),
            Err(e) => log::error!("reminder delivery failed: {e:#}"),
        }
        sleep(Duration::from_secs(interval_secs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::meter::{IntensityMeter, DEFAULT_DIVISOR};

    #[test]
    fn bars_render_played_and_neutral_differently() {
        let mut meter = IntensityMeter::new(4, DEFAULT_DIVISOR);
        meter.sample(0.0, 4.0, 0.0, true);

        let rendered = render_bars(meter.bars());
        let chars: Vec<char> = rendered.chars().collect();
        assert_eq!(chars.len(), 4);
        assert_eq!(chars[0], '█');
        assert!(chars[1..].iter().all(|&c| c == '·'));
        assert_eq!(meter.bars()[0].state, BarState::Played);
    }

    #[test]
    fn reminder_time_parsing() {
        assert!(parse_reminder_time("2026-08-07T09:00:00Z").is_ok());
        assert!(parse_reminder_time("2026-08-07T09:00:00+02:00").is_ok());
        assert!(parse_reminder_time("tomorrow").is_err());
    }
}
