//! # Sample Validation
//!
//! Per-sample classification consumed by the detector and accumulator.
//!
//! A sample is usable only if it carries a flow rate and both cumulative
//! counters. Anything else is reported as [`SampleCheck::Skip`] with the
//! first missing field, so the scan loops never branch on raw `Option`s.

use crate::Sample;
use std::fmt;

/// Why a sample was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingRate,
    MissingMass,
    MissingVolume,
    /// A reading is present but is NaN or infinite.
    NonFinite,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::MissingRate => "missing flow rate",
            Self::MissingMass => "missing cumulative mass",
            Self::MissingVolume => "missing cumulative volume",
            Self::NonFinite => "non-finite reading",
        };
        f.write_str(reason)
    }
}

/// The mandatory readings of a usable sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub rate: f64,
    pub mass: f64,
    pub volume: f64,
}

impl Reading {
    /// Positive flow.
    #[must_use]
    pub fn is_flowing(&self) -> bool {
        self.rate > 0.0
    }
}

/// Outcome of validating one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleCheck {
    Usable(Reading),
    Skip(SkipReason),
}

/// Classify a sample.
#[must_use]
pub fn check_sample(sample: &Sample) -> SampleCheck {
    let Some(rate) = sample.flow_rate else {
        return SampleCheck::Skip(SkipReason::MissingRate);
    };
    let Some(mass) = sample.cumulative_mass else {
        return SampleCheck::Skip(SkipReason::MissingMass);
    };
    let Some(volume) = sample.cumulative_volume else {
        return SampleCheck::Skip(SkipReason::MissingVolume);
    };
    if !(rate.is_finite() && mass.is_finite() && volume.is_finite()) {
        return SampleCheck::Skip(SkipReason::NonFinite);
    }
    SampleCheck::Usable(Reading { rate, mass, volume })
}
