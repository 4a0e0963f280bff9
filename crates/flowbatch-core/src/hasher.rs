//! # Batch Fingerprints
//!
//! Deterministic deduplication keys for batches.
//!
//! The canonical input is
//! `system_id|start_secs|end_secs|threshold|timeout_minutes`, where the
//! timestamps are UTC Unix seconds (sub-second parts are dropped) and the
//! threshold is the IEEE-754 bit pattern in hex. The key is the BLAKE3 hash of
//! that string, lowercase hex.

use crate::primitives::FINGERPRINT_SEPARATOR;
use crate::{Fingerprint, Profile};
use chrono::{DateTime, Utc};

/// Build the canonical fingerprint input.
#[must_use]
pub fn canonical_input(
    system_id: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    volume_threshold: f64,
    closing_timeout_minutes: u32,
) -> String {
    // -0.0 and 0.0 must hash alike.
    let threshold = if volume_threshold == 0.0 {
        0.0f64
    } else {
        volume_threshold
    };
    let sep = FINGERPRINT_SEPARATOR;
    format!(
        "{system_id}{sep}{}{sep}{}{sep}{:016x}{sep}{closing_timeout_minutes}",
        start_time.timestamp(),
        end_time.timestamp(),
        threshold.to_bits(),
    )
}

/// Compute the fingerprint of a batch.
#[must_use]
pub fn fingerprint(
    system_id: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    volume_threshold: f64,
    closing_timeout_minutes: u32,
) -> Fingerprint {
    let input = canonical_input(
        system_id,
        start_time,
        end_time,
        volume_threshold,
        closing_timeout_minutes,
    );
    Fingerprint(blake3::hash(input.as_bytes()).to_hex().to_string())
}

/// Fingerprint for a batch with the given profile.
#[must_use]
pub fn fingerprint_for(
    system_id: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    profile: &Profile,
) -> Fingerprint {
    fingerprint(
        system_id,
        start_time,
        end_time,
        profile.volume_threshold,
        profile.closing_timeout_minutes,
    )
}
