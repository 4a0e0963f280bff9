//! # Engine Primitives
//!
//! Fixed constants of the flowbatch engine. These are compiled in and do not
//! change at runtime; tunables live in [`crate::DetectionConfig`].

/// Magic bytes for the stored batch record header.
pub const MAGIC_BYTES: &[u8; 4] = b"FBAT";

/// Current record format version.
///
/// Increment this when making breaking changes to the stored batch layout.
pub const FORMAT_VERSION: u8 = 1;

/// Default lookahead past the window end, in minutes.
///
/// Long enough for the tail of any episode that crosses local midnight to be
/// observed by the detector.
pub const DEFAULT_MARGIN_MINUTES: u32 = 360;

/// Upper bound on a single detection window, in days.
///
/// The detector has no cancellation; callers bound its cost with the window.
pub const MAX_WINDOW_DAYS: i64 = 366;

/// Field separator used when building the canonical fingerprint input.
pub const FINGERPRINT_SEPARATOR: char = '|';
