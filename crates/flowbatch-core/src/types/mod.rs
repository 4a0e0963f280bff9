//! # Core Type Definitions
//!
//! This module contains all core types for the flowbatch engine:
//! - Telemetry input (`Sample`, `Profile`)
//! - Persisted output (`Batch`, `Fingerprint`)
//! - Error types (`BatchError`)
//!
//! ## Time Handling
//!
//! All instants are `DateTime<Utc>`. Local calendar days are derived from a
//! fixed UTC offset carried in [`crate::DetectionConfig`], never from the host
//! clock, so detection is reproducible on any machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// DETECTION PROFILE
// =============================================================================

/// The `{volume_threshold, closing_timeout}` pair active on the device
/// when a sample was recorded.
///
/// Profiles are snapshotted into each sample at ingestion time. The detector
/// never looks configuration up, so re-running detection after the device
/// configuration changed still reproduces the original batches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Minimum accumulated mass for a candidate to become a batch.
    pub volume_threshold: f64,
    /// Minutes of non-positive flow required before a batch closes.
    pub closing_timeout_minutes: u32,
}

impl Profile {
    /// Create a new profile.
    #[must_use]
    pub const fn new(volume_threshold: f64, closing_timeout_minutes: u32) -> Self {
        Self {
            volume_threshold,
            closing_timeout_minutes,
        }
    }

    /// A profile can open a candidate only if its threshold is a finite,
    /// non-negative number.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.volume_threshold.is_finite() && self.volume_threshold >= 0.0
    }

    /// The closing timeout as a chrono duration.
    #[must_use]
    pub fn closing_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.closing_timeout_minutes))
    }
}

// =============================================================================
// SAMPLE
// =============================================================================

/// A single flow-meter telemetry reading.
///
/// Only `system_id` and `timestamp` are mandatory. Samples missing the flow
/// rate or either cumulative counter are skipped by the detector; missing
/// temperature, density or pressure only drop out of the averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// The physical system this reading belongs to.
    pub system_id: String,
    /// Device clock at recording time.
    pub timestamp: DateTime<Utc>,
    /// Signed mass flow rate.
    #[serde(default)]
    pub flow_rate: Option<f64>,
    /// Cumulative mass counter. Monotonic, but the device may reset it.
    #[serde(default)]
    pub cumulative_mass: Option<f64>,
    /// Cumulative volume counter.
    #[serde(default)]
    pub cumulative_volume: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub density: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    /// Detection profile active on the device for this reading.
    #[serde(default)]
    pub profile: Option<Profile>,
}

impl Sample {
    /// Create a bare sample with no readings attached.
    #[must_use]
    pub fn new(system_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            system_id: system_id.into(),
            timestamp,
            flow_rate: None,
            cumulative_mass: None,
            cumulative_volume: None,
            temperature: None,
            density: None,
            pressure: None,
            profile: None,
        }
    }

    /// Attach flow rate and both cumulative counters.
    #[must_use]
    pub fn with_flow(mut self, rate: f64, cumulative_mass: f64, cumulative_volume: f64) -> Self {
        self.flow_rate = Some(rate);
        self.cumulative_mass = Some(cumulative_mass);
        self.cumulative_volume = Some(cumulative_volume);
        self
    }

    /// Attach process conditions. Pressure is optional on most meters.
    #[must_use]
    pub fn with_conditions(mut self, temperature: f64, density: f64, pressure: Option<f64>) -> Self {
        self.temperature = Some(temperature);
        self.density = Some(density);
        self.pressure = pressure;
        self
    }

    /// Attach the detection profile active for this reading.
    #[must_use]
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }
}

// =============================================================================
// FINGERPRINT
// =============================================================================

/// Deterministic deduplication key of a batch (lowercase BLAKE3 hex).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// Get the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// BATCH
// =============================================================================

/// A persisted batch: one contiguous flow episode within one local day.
///
/// Immutable once stored, except for a one-time `ticket_number` assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub system_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_volume: f64,
    pub total_mass: f64,
    pub avg_temperature: Option<f64>,
    pub avg_density: Option<f64>,
    pub avg_pressure: Option<f64>,
    /// Number of flowing samples collected into the batch.
    pub sample_count: usize,
    /// `end_time - start_time` in whole seconds.
    pub duration_secs: i64,
    /// Profile captured when the candidate opened.
    pub profile: Profile,
    pub fingerprint: Fingerprint,
    pub ticket_number: Option<String>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the flowbatch engine.
///
/// - No silent failures
/// - Use `Result<T, BatchError>` for fallible operations
/// - Sub-threshold candidates and samples without a profile are outcomes,
///   not errors; they never appear here
#[derive(Debug, Error)]
pub enum BatchError {
    /// The caller violated the input contract (unsorted or mixed-system
    /// samples, inverted window).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A batch with this fingerprint already exists in the store.
    #[error("Batch already exists: {0}")]
    UniqueViolation(Fingerprint),

    /// The store could not be reached or a transaction failed.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// No batch carries the given fingerprint.
    #[error("Batch not found: {0}")]
    BatchNotFound(Fingerprint),

    /// The batch already has a ticket number.
    #[error("Ticket already assigned for batch {0}")]
    TicketAlreadyAssigned(Fingerprint),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
