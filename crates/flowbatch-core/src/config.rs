//! # Detection Configuration
//!
//! Tunables shared by the orchestrator, detector and accumulator. The app
//! layer deserializes this from the `[detection]` table of its TOML config.

use crate::primitives::DEFAULT_MARGIN_MINUTES;
use chrono::{Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Lookahead past the caller's window end, used only to observe the tail
    /// of an episode crossing midnight.
    pub margin_minutes: u32,

    /// Offset of the plant's local time from UTC, in minutes. Day boundaries
    /// are local midnights at this offset.
    pub utc_offset_minutes: i32,

    /// Largest plausible cumulative-mass increase between two readings.
    /// Larger jumps are treated as counter glitches by the accumulator.
    /// `None` disables the ceiling.
    pub max_mass_jump: Option<f64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            margin_minutes: DEFAULT_MARGIN_MINUTES,
            utc_offset_minutes: 0,
            max_mass_jump: None,
        }
    }
}

impl DetectionConfig {
    /// The configured margin as a duration.
    #[must_use]
    pub fn margin(&self) -> Duration {
        Duration::minutes(i64::from(self.margin_minutes))
    }

    /// The local-day offset. Out-of-range offsets fall back to UTC.
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }
}
