//! # flowbatch
//!
//! The main binary for the flowbatch detection engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              apps/flowbatch (THE BINARY)             │
//! │                                                      │
//! │  ┌─────────────┐   ┌──────────────┐   ┌───────────┐  │
//! │  │    CLI      │   │ Sample files │   │  Config   │  │
//! │  │   (clap)    │   │ (serde_json) │   │  (toml)   │  │
//! │  └──────┬──────┘   └──────┬───────┘   └─────┬─────┘  │
//! │         └─────────────────┼─────────────────┘        │
//! │                           ▼                          │
//! │                  ┌────────────────┐                  │
//! │                  │ flowbatch-core │                  │
//! │                  │  (THE ENGINE)  │                  │
//! │                  └────────────────┘                  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! flowbatch init
//! flowbatch detect -s skid-1 -f samples.jsonl --day 2024-03-01
//! flowbatch batches -s skid-1 --day 2024-03-01
//! flowbatch ticket -f <fingerprint> -n T-1042
//! ```

use clap::Parser;
use flowbatch::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing: FLOWBATCH_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("FLOWBATCH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "flowbatch=debug,flowbatch_core=debug"
    } else {
        "flowbatch=info,flowbatch_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr so that --json-mode output stays parseable.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the flowbatch startup banner.
fn print_banner() {
    println!(
        r#"
  ┏━╸╻  ┏━┓╻ ╻┏┓ ┏━┓╺┳╸┏━╸╻ ╻
  ┣╸ ┃  ┃ ┃┃╻┃┣┻┓┣━┫ ┃ ┃  ┣━┫
  ╹  ┗━╸┗━┛┗┻┛┗━┛╹ ╹ ╹ ┗━╸╹ ╹

  Batch Detection v{}

  Day-bounded • Idempotent • Reset-tolerant
"#,
        env!("CARGO_PKG_VERSION")
    );
}
