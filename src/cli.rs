//! Command-line interface for Murmur
//!
//! Handles argument parsing and logging configuration.

use clap::{Parser, Subcommand};
use log::LevelFilter;

/// Murmur - personal voice note recorder
#[derive(Parser, Debug)]
#[command(name = "murmur")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a new voice note (press Enter to stop)
    Record {
        /// Comment to attach to the note
        #[arg(short, long, default_value = "")]
        comment: String,

        /// Reminder time, RFC 3339 (e.g. 2026-08-07T09:00:00Z)
        #[arg(long)]
        remind: Option<String>,

        /// Repeat the reminder daily
        #[arg(long, requires = "remind")]
        repeats: bool,
    },

    /// List saved notes
    List,

    /// Play a note (an id prefix is enough)
    Play {
        id: String,
    },

    /// Delete a note, its audio file, and any pending reminder
    Delete {
        id: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Replace a note's comment
    Comment {
        id: String,
        text: String,
    },

    /// Set or clear a note's reminder
    Remind {
        id: String,

        /// Reminder time, RFC 3339
        #[arg(long, conflicts_with = "clear")]
        at: Option<String>,

        /// Repeat the reminder daily
        #[arg(long, requires = "at")]
        repeats: bool,

        /// Remove the note's reminder
        #[arg(long)]
        clear: bool,
    },

    /// Deliver due reminders in a loop
    Watch {
        /// Seconds between delivery checks
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
    },
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(LevelFilter::Warn);
    builder.filter_module("murmur", args.log_level());

    builder.format_timestamp_millis().init();
}
