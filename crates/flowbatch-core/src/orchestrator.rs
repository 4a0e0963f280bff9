//! # Detection Orchestrator
//!
//! One idempotent detection run for one system and window:
//!
//! 1. Fetch samples over `[start - margin, end + margin]`
//! 2. Detect with `[start, end]` as the emission range
//! 3. Drop batches starting in the margin
//! 4. Upsert each batch by fingerprint
//! 5. Sum raw flowing mass over exactly `[start, end]`
//! 6. Report every stored batch starting in `[start, end]`
//!
//! Re-running over the same or an overlapping window inserts nothing new.

use crate::accumulator::MassAccumulator;
use crate::detector::BatchDetector;
use crate::reader::TimeSeriesReader;
use crate::store::BatchStore;
use crate::window::Window;
use crate::{Batch, BatchError, DetectionConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Outcome of one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub system_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Batches inserted by this run.
    pub new_count: usize,
    /// Detected batches that were already stored.
    pub existing_count: usize,
    /// Every stored batch of the system starting inside the window.
    pub batches: Vec<Batch>,
    /// Independent flowing-mass total over the exact window.
    pub raw_mass_total: f64,
}

/// Whether an upsert inserted or reused a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Existing,
}

/// Runs detection against a reader and a store.
#[derive(Debug)]
pub struct DetectionOrchestrator<R, S> {
    reader: R,
    store: S,
    config: DetectionConfig,
}

impl<R: TimeSeriesReader, S: BatchStore> DetectionOrchestrator<R, S> {
    #[must_use]
    pub fn new(reader: R, store: S, config: DetectionConfig) -> Self {
        Self {
            reader,
            store,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Detect and persist batches of `system_id` starting in `[start, end]`.
    ///
    /// # Errors
    ///
    /// - `BatchError::InvalidInput` for an inverted or oversized window, a
    ///   margin past chrono's range, or if the reader returns unsorted or
    ///   foreign samples
    /// - `BatchError::StorageUnavailable` if the reader or store fails; batches
    ///   inserted before the failure stay valid
    pub fn detect(
        &self,
        system_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DetectionReport, BatchError> {
        let window = Window::new(start, end)?;
        let scan_range = window.expanded(self.config.margin())?;

        let samples = self.reader.read(system_id, &scan_range)?;
        if let Some(foreign) = samples.iter().find(|s| s.system_id != system_id) {
            return Err(BatchError::InvalidInput(format!(
                "reader returned samples of {} for {}",
                foreign.system_id, system_id
            )));
        }
        debug!(system_id, samples = samples.len(), %start, %end, "samples fetched");

        let detected = BatchDetector::from_config(&self.config).detect(&samples, &window)?;

        let mut new_count = 0usize;
        let mut existing_count = 0usize;
        for candidate in detected {
            if candidate.start_time > window.end {
                debug!(
                    system_id,
                    start = %candidate.start_time,
                    "batch starts in margin, left for the next window"
                );
                continue;
            }
            match self.upsert(candidate.into_batch())? {
                UpsertOutcome::Created => new_count += 1,
                UpsertOutcome::Existing => existing_count += 1,
            }
        }

        let raw_mass_total = MassAccumulator::from_config(&self.config).total(&samples, &window);
        let batches = self.store.list_by_start_range(system_id, &window)?;

        info!(
            system_id,
            new_count,
            existing_count,
            listed = batches.len(),
            raw_mass_total,
            "detection run complete"
        );

        Ok(DetectionReport {
            system_id: system_id.to_string(),
            window_start: window.start,
            window_end: window.end,
            new_count,
            existing_count,
            batches,
            raw_mass_total,
        })
    }

    /// Insert `batch` unless its fingerprint is already stored.
    ///
    /// A `UniqueViolation` from a concurrent insert is resolved by re-fetching
    /// and reported as `Existing`.
    pub fn upsert(&self, batch: Batch) -> Result<UpsertOutcome, BatchError> {
        if self.store.find_by_fingerprint(&batch.fingerprint)?.is_some() {
            return Ok(UpsertOutcome::Existing);
        }

        let fingerprint = batch.fingerprint.clone();
        match self.store.create(batch) {
            Ok(created) => {
                info!(
                    system_id = %created.system_id,
                    fingerprint = %created.fingerprint,
                    start = %created.start_time,
                    end = %created.end_time,
                    mass = created.total_mass,
                    "batch created"
                );
                Ok(UpsertOutcome::Created)
            }
            Err(BatchError::UniqueViolation(_)) => {
                warn!(%fingerprint, "concurrent insert detected, re-fetching");
                match self.store.find_by_fingerprint(&fingerprint)? {
                    Some(_) => Ok(UpsertOutcome::Existing),
                    None => Err(BatchError::StorageUnavailable(format!(
                        "batch {} reported as duplicate but not found",
                        fingerprint
                    ))),
                }
            }
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
