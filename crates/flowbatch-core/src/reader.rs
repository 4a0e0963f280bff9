//! # Time-Series Reader
//!
//! The contract the orchestrator uses to fetch telemetry, plus an in-memory
//! implementation for tests and file-fed runs.

use crate::window::Window;
use crate::{BatchError, Sample};
use std::collections::BTreeMap;

/// Supplies a system's samples over a time window.
///
/// Implementations must return samples of `system_id` only, in ascending
/// timestamp order, with both window ends inclusive.
pub trait TimeSeriesReader {
    fn read(&self, system_id: &str, window: &Window) -> Result<Vec<Sample>, BatchError>;
}

/// Samples held in memory, grouped per system.
#[derive(Debug, Clone, Default)]
pub struct SampleSeries {
    by_system: BTreeMap<String, Vec<Sample>>,
}

impl SampleSeries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from samples in any order and of any systems.
    #[must_use]
    pub fn from_samples(samples: impl IntoIterator<Item = Sample>) -> Self {
        let mut series = Self::new();
        series.extend(samples);
        series
    }

    /// Add samples, keeping every system's sequence sorted by timestamp.
    ///
    /// Samples with equal timestamps keep their insertion order.
    pub fn extend(&mut self, samples: impl IntoIterator<Item = Sample>) {
        for sample in samples {
            self.by_system
                .entry(sample.system_id.clone())
                .or_default()
                .push(sample);
        }
        for seq in self.by_system.values_mut() {
            seq.sort_by_key(|s| s.timestamp);
        }
    }

    /// Systems present in the series.
    pub fn systems(&self) -> impl Iterator<Item = &str> {
        self.by_system.keys().map(String::as_str)
    }

    /// Total number of samples across systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_system.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TimeSeriesReader for SampleSeries {
    fn read(&self, system_id: &str, window: &Window) -> Result<Vec<Sample>, BatchError> {
        Ok(self
            .by_system
            .get(system_id)
            .map(|seq| {
                seq.iter()
                    .filter(|s| window.contains(s.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
