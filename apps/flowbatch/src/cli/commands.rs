//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::AppConfig;
use crate::samples::load_samples;
use chrono::{DateTime, Utc};
use flowbatch_core::{
    Batch, BatchError, BatchStore, DetectionOrchestrator, DetectionReport, Fingerprint,
    RedbStore, SampleSeries, Window, fingerprint,
};
use std::path::Path;

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize new database.
pub fn cmd_init(db_path: &Path, force: bool) -> Result<(), BatchError> {
    if db_path.exists() {
        if !force {
            return Err(BatchError::InvalidInput(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| BatchError::IoError(format!("Remove database: {}", e)))?;
    }

    let _store = RedbStore::open(db_path)?;
    println!("Initialized new batch database at {:?}", db_path);
    Ok(())
}

// =============================================================================
// DETECT COMMAND
// =============================================================================

/// Run one detection over a sample file and persist the batches.
pub fn run_detection(
    db_path: &Path,
    config: &AppConfig,
    system: &str,
    samples_file: &Path,
    window: &Window,
) -> Result<DetectionReport, BatchError> {
    tracing::info!("Detecting batches for {} from {:?}", system, samples_file);

    let samples = load_samples(samples_file)?;
    let orchestrator = DetectionOrchestrator::new(
        SampleSeries::from_samples(samples),
        open_store(db_path)?,
        config.detection.clone(),
    );
    orchestrator.detect(system, window.start, window.end)
}

/// Detect batches and print the report.
pub fn cmd_detect(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    system: &str,
    samples_file: &Path,
    window: &Window,
) -> Result<(), BatchError> {
    let report = run_detection(db_path, config, system, samples_file, window)?;

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Detection Report");
    println!("================");
    println!("System:   {}", report.system_id);
    println!("Window:   {} .. {}", report.window_start, report.window_end);
    println!("New:      {}", report.new_count);
    println!("Existing: {}", report.existing_count);
    println!("Raw mass: {:.3}", report.raw_mass_total);
    println!();
    print_batches(&report.batches);

    Ok(())
}

// =============================================================================
// BATCHES COMMAND
// =============================================================================

/// List stored batches starting in the window.
pub fn cmd_batches(
    db_path: &Path,
    json_mode: bool,
    system: &str,
    window: &Window,
) -> Result<(), BatchError> {
    let store = open_store(db_path)?;
    let batches = store.list_by_start_range(system, window)?;

    if json_mode {
        print_json(&batches);
        return Ok(());
    }

    println!("Batches of {} ({} .. {})", system, window.start, window.end);
    println!();
    print_batches(&batches);
    Ok(())
}

// =============================================================================
// TICKET COMMAND
// =============================================================================

/// Assign a ticket number to a stored batch.
pub fn cmd_ticket(
    db_path: &Path,
    json_mode: bool,
    fingerprint: &Fingerprint,
    number: &str,
) -> Result<(), BatchError> {
    let store = open_store(db_path)?;
    let batch = store.assign_ticket(fingerprint, number)?;
    tracing::info!(%fingerprint, ticket = number, "ticket assigned");

    if json_mode {
        print_json(&batch);
        return Ok(());
    }

    println!("Ticket {} assigned to batch {}", number, batch.fingerprint);
    Ok(())
}

// =============================================================================
// FINGERPRINT COMMAND
// =============================================================================

/// Print the dedup fingerprint of a batch.
pub fn cmd_fingerprint(
    json_mode: bool,
    system: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    threshold: f64,
    timeout: u32,
) -> Result<(), BatchError> {
    let fp = fingerprint(system, start, end, threshold, timeout);

    if json_mode {
        print_json(&serde_json::json!({
            "system_id": system,
            "start_time": start,
            "end_time": end,
            "volume_threshold": threshold,
            "closing_timeout_minutes": timeout,
            "fingerprint": fp,
        }));
        return Ok(());
    }

    println!("{}", fp);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open an existing batch database.
pub fn open_store(db_path: &Path) -> Result<RedbStore, BatchError> {
    if !db_path.exists() {
        return Err(BatchError::IoError(format!(
            "Database {:?} not found. Run `flowbatch init` first.",
            db_path
        )));
    }
    RedbStore::open(db_path)
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn print_batches(batches: &[Batch]) {
    if batches.is_empty() {
        println!("No batches.");
        return;
    }

    println!(
        "{:<26} {:<26} {:>12} {:>12} {:<10} FINGERPRINT",
        "START", "END", "MASS", "VOLUME", "TICKET"
    );
    for batch in batches {
        println!(
            "{:<26} {:<26} {:>12.3} {:>12.3} {:<10} {}",
            batch.start_time.to_rfc3339(),
            batch.end_time.to_rfc3339(),
            batch.total_mass,
            batch.total_volume,
            batch.ticket_number.as_deref().unwrap_or("-"),
            batch.fingerprint
        );
    }
}
