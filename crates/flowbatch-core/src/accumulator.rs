//! # Mass Accumulator
//!
//! Independent raw mass total over an exact window, regardless of batches,
//! thresholds or profiles.
//!
//! The running reference follows every usable sample in the window. The
//! counter increase up to a flowing sample is added to the total; increases
//! up to a non-flowing sample are not. A decrease, or an increase above the
//! configured ceiling, is a device counter reset: the jump is discarded and
//! the reference re-anchors to the new reading.

use crate::validate::{SampleCheck, check_sample};
use crate::window::Window;
use crate::{DetectionConfig, Sample};
use tracing::debug;

/// Sums flowing mass over a window.
#[derive(Debug, Clone, Copy, Default)]
pub struct MassAccumulator {
    max_jump: Option<f64>,
}

impl MassAccumulator {
    /// Create an accumulator with an optional implausible-jump ceiling.
    #[must_use]
    pub const fn new(max_jump: Option<f64>) -> Self {
        Self { max_jump }
    }

    /// Create an accumulator from the detection configuration.
    #[must_use]
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.max_mass_jump)
    }

    /// Total mass accumulated while flowing inside `window`.
    ///
    /// Samples outside the window and samples that fail validation are
    /// ignored. Returns 0.0 when nothing flowed.
    #[must_use]
    pub fn total(&self, samples: &[Sample], window: &Window) -> f64 {
        let mut total = 0.0;
        let mut reference: Option<f64> = None;

        for sample in samples.iter().filter(|s| window.contains(s.timestamp)) {
            let SampleCheck::Usable(reading) = check_sample(sample) else {
                continue;
            };

            if let Some(previous) = reference {
                let delta = reading.mass - previous;
                if reading.is_flowing() {
                    if self.is_plausible(delta) {
                        total += delta;
                    } else {
                        debug!(
                            system_id = %sample.system_id,
                            timestamp = %sample.timestamp,
                            previous,
                            current = reading.mass,
                            "cumulative mass jump discarded, re-anchoring"
                        );
                    }
                }
            }
            reference = Some(reading.mass);
        }

        total
    }

    fn is_plausible(&self, delta: f64) -> bool {
        if delta < 0.0 {
            return false;
        }
        self.max_jump.is_none_or(|ceiling| delta <= ceiling)
    }
}
