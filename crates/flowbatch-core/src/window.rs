//! # Windows and Local Days
//!
//! Detection windows and the local-calendar arithmetic used to keep every
//! batch inside one day.
//!
//! Local time is a fixed UTC offset. A local day `D` covers
//! `[D 00:00:00, D 23:59:59.999999]` at that offset.

use crate::BatchError;
use crate::primitives::MAX_WINDOW_DAYS;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};

// =============================================================================
// LOCAL CALENDAR
// =============================================================================

/// Maps UTC instants to local calendar days at a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalCalendar {
    offset: FixedOffset,
}

impl LocalCalendar {
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// The local calendar date an instant falls on.
    #[must_use]
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    /// Local 00:00:00 of `date`, as a UTC instant.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::InvalidInput` if the instant is outside chrono's range.
    pub fn start_of_day(&self, date: NaiveDate) -> Result<DateTime<Utc>, BatchError> {
        let offset = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        date.and_time(NaiveTime::MIN)
            .checked_sub_signed(offset)
            .map(|utc| DateTime::from_naive_utc_and_offset(utc, Utc))
            .ok_or_else(|| out_of_range(date))
    }

    /// Local 23:59:59.999999 of `date`, as a UTC instant.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::InvalidInput` if the instant is outside chrono's range.
    pub fn end_of_day(&self, date: NaiveDate) -> Result<DateTime<Utc>, BatchError> {
        self.start_of_day(date)?
            .checked_add_signed(Duration::days(1) - Duration::microseconds(1))
            .ok_or_else(|| out_of_range(date))
    }

    /// The full local day `date` as a window.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::InvalidInput` if either bound is outside chrono's range.
    pub fn day_window(&self, date: NaiveDate) -> Result<Window, BatchError> {
        Ok(Window {
            start: self.start_of_day(date)?,
            end: self.end_of_day(date)?,
        })
    }
}

fn out_of_range(date: NaiveDate) -> BatchError {
    BatchError::InvalidInput(format!("local day {} is out of the supported range", date))
}

// =============================================================================
// WINDOW
// =============================================================================

/// An inclusive `[start, end]` time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// Create a window, rejecting inverted or oversized ranges.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, BatchError> {
        if start > end {
            return Err(BatchError::InvalidInput(format!(
                "window start {} is after end {}",
                start, end
            )));
        }
        if end - start > Duration::days(MAX_WINDOW_DAYS) {
            return Err(BatchError::InvalidInput(format!(
                "window of {} days exceeds maximum of {} days",
                (end - start).num_days(),
                MAX_WINDOW_DAYS
            )));
        }
        Ok(Self { start, end })
    }

    /// Check whether `ts` lies inside the window (both ends inclusive).
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// The same window widened by `margin` on both sides.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::InvalidInput` if either bound leaves chrono's range.
    pub fn expanded(&self, margin: Duration) -> Result<Self, BatchError> {
        let overflow = || {
            BatchError::InvalidInput(format!(
                "margin of {} minutes overflows window {} .. {}",
                margin.num_minutes(),
                self.start,
                self.end
            ))
        };
        Ok(Self {
            start: self.start.checked_sub_signed(margin).ok_or_else(overflow)?,
            end: self.end.checked_add_signed(margin).ok_or_else(overflow)?,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
