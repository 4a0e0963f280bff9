//! # flowbatch-core
//!
//! The batch-detection engine for flowbatch.
//!
//! This crate scans time-ordered flow-meter telemetry for one physical system
//! and segments it into batches: contiguous episodes of positive flow that
//! reach a minimum-mass threshold, close after a hysteresis timeout, and never
//! span more than one local calendar day.
//!
//! ## Components
//!
//! - `reader`: the `TimeSeriesReader` contract and an in-memory series
//! - `hasher`: BLAKE3 dedup fingerprints
//! - `accumulator`: raw flowing-mass totals, tolerant of counter resets
//! - `detector`: the `NoBatch / InBatch / Closing` state machine
//! - `store`: the `BatchStore` contract, in-memory and redb backends
//! - `orchestrator`: margin handling, filtering and idempotent upsert
//!
//! ## Architectural Constraints
//!
//! - Synchronous, no async, no network dependencies
//! - A run is a pure function of its samples and window, plus inserts
//! - No state shared between systems; the store's fingerprint uniqueness is
//!   the only concurrency control

// =============================================================================
// MODULES
// =============================================================================

pub mod accumulator;
pub mod config;
pub mod detector;
pub mod formats;
pub mod hasher;
pub mod orchestrator;
pub mod primitives;
pub mod reader;
pub mod store;
pub mod types;
pub mod validate;
pub mod window;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Batch, BatchError, Fingerprint, Profile, Sample};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use accumulator::MassAccumulator;
pub use config::DetectionConfig;
pub use detector::{BatchDetector, CloseReason, DetectedBatch};
pub use hasher::fingerprint;
pub use orchestrator::{DetectionOrchestrator, DetectionReport, UpsertOutcome};
pub use reader::{SampleSeries, TimeSeriesReader};
pub use store::{BatchStore, MemoryStore, RedbStore};
pub use validate::{SampleCheck, SkipReason, check_sample};
pub use window::{LocalCalendar, Window};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, batch_from_bytes, batch_to_bytes};
