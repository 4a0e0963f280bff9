//! # flowbatch CLI Module
//!
//! This module implements the CLI interface for flowbatch.
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new batch database
//! - `detect` - Detect and store batches from a sample file
//! - `batches` - List stored batches of a system
//! - `ticket` - Assign a ticket number to a batch
//! - `fingerprint` - Compute the dedup fingerprint of a batch

mod commands;

use crate::config::AppConfig;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use flowbatch_core::{BatchError, Fingerprint, LocalCalendar, Window};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// flowbatch - batch detection over flow-meter telemetry
///
/// Segments a system's readings into day-bounded batches and stores each one
/// exactly once.
#[derive(Parser, Debug)]
#[command(name = "flowbatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the batch database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// A time range given either as `--from/--to` or as a whole local `--day`.
#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// Range start (RFC 3339)
    #[arg(long, requires = "to", conflicts_with = "day")]
    pub from: Option<DateTime<Utc>>,

    /// Range end, inclusive (RFC 3339)
    #[arg(long, requires = "from", conflicts_with = "day")]
    pub to: Option<DateTime<Utc>>,

    /// A local calendar day (YYYY-MM-DD)
    #[arg(long)]
    pub day: Option<NaiveDate>,
}

impl RangeArgs {
    /// Resolve to a window. Days are local days of `calendar`.
    pub fn window(&self, calendar: &LocalCalendar) -> Result<Window, BatchError> {
        match (self.from, self.to, self.day) {
            (_, _, Some(day)) => calendar.day_window(day),
            (Some(from), Some(to), None) => Window::new(from, to),
            _ => Err(BatchError::InvalidInput(
                "Either --from and --to, or --day is required".to_string(),
            )),
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Detect batches from a sample file and store them
    Detect {
        /// System to detect batches for
        #[arg(short, long)]
        system: String,

        /// Sample file (JSON array or JSON lines)
        #[arg(short = 'f', long)]
        samples: PathBuf,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// List stored batches starting in a range
    Batches {
        /// System to list
        #[arg(short, long)]
        system: String,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// Assign a ticket number to a stored batch (once)
    Ticket {
        /// Batch fingerprint
        #[arg(short, long)]
        fingerprint: String,

        /// Ticket number
        #[arg(short, long)]
        number: String,
    },

    /// Compute the dedup fingerprint of a batch
    Fingerprint {
        #[arg(short, long)]
        system: String,

        /// Batch start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// Batch end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,

        /// Volume threshold of the batch profile
        #[arg(long)]
        threshold: f64,

        /// Closing timeout of the batch profile, in minutes
        #[arg(long)]
        timeout: u32,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), BatchError> {
    let config = AppConfig::load_optional(cli.config.as_deref())?;
    let db_path = config.database_path(cli.database.as_deref());
    let calendar = LocalCalendar::new(config.detection.offset());
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Init { force } => cmd_init(&db_path, force),
        Commands::Detect {
            system,
            samples,
            range,
        } => {
            let window = range.window(&calendar)?;
            cmd_detect(&db_path, &config, json_mode, &system, &samples, &window)
        }
        Commands::Batches { system, range } => {
            let window = range.window(&calendar)?;
            cmd_batches(&db_path, json_mode, &system, &window)
        }
        Commands::Ticket {
            fingerprint,
            number,
        } => cmd_ticket(&db_path, json_mode, &Fingerprint(fingerprint), &number),
        Commands::Fingerprint {
            system,
            start,
            end,
            threshold,
            timeout,
        } => cmd_fingerprint(json_mode, &system, start, end, threshold, timeout),
    }
}
