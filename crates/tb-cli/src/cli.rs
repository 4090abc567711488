//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Time bank.
///
/// Meters accrue signed, weighted time while active. The balance is the sum
/// of every activation's duration times its factor.
#[derive(Debug, Parser)]
#[command(name = "tb", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the balance and what is running.
    Status,

    /// Manage meters.
    #[command(subcommand)]
    Meters(MetersAction),

    /// Start a meter, stopping whatever runs.
    Start {
        /// Meter id, name or 1-based position.
        meter: String,

        /// Comment for the event. Required for activity accounts.
        #[arg(short = 'm', long)]
        comment: Option<String>,
    },

    /// Stop the running meter.
    Stop,

    /// Inspect and correct recorded events.
    #[command(subcommand)]
    Events(EventsAction),

    /// Show the balance over the recent past.
    Timeline {
        /// Window length in hours. Defaults to the stored timeline period.
        #[arg(long)]
        hours: Option<u32>,

        /// Output JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show or set the timeline period.
    Period {
        /// Hours (e.g. `48`) or `[d.]hh:mm:ss`.
        #[arg(allow_hyphen_values = true)]
        value: Option<String>,
    },

    /// Show or change user settings.
    Settings {
        /// Interface language code.
        #[arg(long)]
        language: Option<String>,

        /// Enable or disable notifications.
        #[arg(long)]
        notifications: Option<bool>,

        /// Mark the tutorial as completed or not.
        #[arg(long)]
        tutorial_completed: Option<bool>,
    },

    /// Write all data as JSON.
    Export {
        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace all data with a JSON export.
    Import {
        /// Input file, or `-` for stdin.
        input: PathBuf,
    },

    /// Restore the default meters and delete every event.
    Reset {
        /// Confirm the reset.
        #[arg(long)]
        yes: bool,
    },

    /// Copy data to or from the configured backup.
    #[command(subcommand)]
    Sync(SyncAction),

    /// Read device signals from stdin and keep the backup in sync.
    ///
    /// Each line is `face N`, `face` (unknown face), `connect` or
    /// `disconnect`.
    Watch,
}

/// Meter management actions.
#[derive(Debug, Subcommand)]
pub enum MetersAction {
    /// List meters in display order.
    List {
        /// Include meter ids.
        #[arg(long)]
        ids: bool,
    },

    /// Add a meter.
    Add {
        name: String,

        /// Time multiplier in [-10, 10]. Defaults to 1.
        #[arg(short, long, allow_hyphen_values = true)]
        factor: Option<f64>,
    },

    /// Rename a meter. Recorded events keep the old name.
    Rename {
        /// Meter id, name or 1-based position.
        meter: String,
        name: String,
    },

    /// Remove a meter. The running meter cannot be removed.
    Remove {
        /// Meter id, name or 1-based position.
        meter: String,
    },

    /// Set the display order.
    Reorder {
        /// Every meter, in the new order.
        #[arg(required = true)]
        meters: Vec<String>,
    },
}

/// Event actions.
#[derive(Debug, Subcommand)]
pub enum EventsAction {
    /// List events, oldest first.
    List {
        /// Show only the most recent N events.
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Include event ids.
        #[arg(long)]
        ids: bool,
    },

    /// Change the interval of a finished event.
    Edit {
        /// Event id or 1-based index from `events list`.
        event: String,

        /// New start (RFC 3339 or e.g. "2 hours ago").
        #[arg(long)]
        start: String,

        /// New end (RFC 3339 or e.g. "30 minutes ago").
        #[arg(long)]
        end: String,
    },

    /// Delete an event.
    Delete {
        /// Event id or 1-based index from `events list`.
        event: String,
    },
}

/// Backup actions.
#[derive(Debug, Subcommand)]
pub enum SyncAction {
    /// Upload the current data.
    Push,

    /// Replace local data with the backup.
    Pull,
}
