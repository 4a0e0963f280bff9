//! # Batch Detector
//!
//! The per-system state machine that turns an ascending sample sequence into
//! batches.
//!
//! ## States
//!
//! ```text
//!               rate > 0, in window, profile
//!   ┌─────────┐ ───────────────────────────► ┌──────────┐
//!   │ NoBatch │                              │ InBatch  │ ◄─┐ rate > 0
//!   └─────────┘ ◄──────────┐                 └──────────┘ ──┘ (day boundary
//!        ▲                 │ timeout elapsed      │ rate <= 0     checked first)
//!        │                 │                      ▼
//!        │                 └──────────────── ┌──────────┐
//!        │                                   │ Closing  │
//!        └── day boundary, next day          └──────────┘
//!            outside window                       │ rate > 0 before timeout
//!                                                 └──────► InBatch
//! ```
//!
//! A candidate's mass is `cumulative_mass(last flowing) - cumulative_mass(start)`.
//! It becomes a batch only if that reaches the threshold of the profile frozen
//! when the candidate opened.

use crate::hasher::fingerprint_for;
use crate::validate::{Reading, SampleCheck, check_sample};
use crate::window::{LocalCalendar, Window};
use crate::{Batch, BatchError, DetectionConfig, Profile, Sample};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

// =============================================================================
// OUTPUT
// =============================================================================

/// What forced a candidate closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Flow stayed non-positive for the closing timeout.
    Timeout,
    /// The episode reached local midnight.
    DayBoundary,
    /// The scan ended with a trailing non-flowing sample.
    EndOfScan,
}

/// A batch emitted by the detector, before fingerprinting.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedBatch {
    pub system_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_mass: f64,
    pub total_volume: f64,
    pub avg_temperature: Option<f64>,
    pub avg_density: Option<f64>,
    pub avg_pressure: Option<f64>,
    pub sample_count: usize,
    pub profile: Profile,
    pub close_reason: CloseReason,
}

impl DetectedBatch {
    /// Fingerprint the batch and turn it into a storable record.
    #[must_use]
    pub fn into_batch(self) -> Batch {
        let fingerprint =
            fingerprint_for(&self.system_id, self.start_time, self.end_time, &self.profile);
        Batch {
            duration_secs: (self.end_time - self.start_time).num_seconds(),
            system_id: self.system_id,
            start_time: self.start_time,
            end_time: self.end_time,
            total_volume: self.total_volume,
            total_mass: self.total_mass,
            avg_temperature: self.avg_temperature,
            avg_density: self.avg_density,
            avg_pressure: self.avg_pressure,
            sample_count: self.sample_count,
            profile: self.profile,
            fingerprint,
            ticket_number: None,
        }
    }
}

// =============================================================================
// CANDIDATE
// =============================================================================

/// An open flow episode.
#[derive(Debug)]
struct Candidate<'a> {
    /// Counter reference for the mass and volume deltas.
    start: Reading,
    /// Recorded start of the batch.
    start_time: DateTime<Utc>,
    start_day: NaiveDate,
    /// Flowing samples collected while open. Never empty.
    flowing: Vec<(&'a Sample, Reading)>,
    /// Frozen for the candidate's lifetime.
    profile: Profile,
}

impl<'a> Candidate<'a> {
    fn push(&mut self, sample: &'a Sample, reading: Reading) {
        self.flowing.push((sample, reading));
    }

    fn last_flowing(&self) -> Option<&(&'a Sample, Reading)> {
        self.flowing.last()
    }

    fn mass_delta(&self) -> f64 {
        self.last_flowing()
            .map(|(_, r)| r.mass - self.start.mass)
            .unwrap_or(0.0)
    }

    fn volume_delta(&self) -> f64 {
        self.last_flowing()
            .map(|(_, r)| r.volume - self.start.volume)
            .unwrap_or(0.0)
    }

    fn average(&self, field: impl Fn(&Sample) -> Option<f64>) -> Option<f64> {
        let (sum, count) = self
            .flowing
            .iter()
            .filter_map(|(s, _)| field(*s).filter(|v| v.is_finite()))
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        (count > 0).then(|| sum / count as f64)
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug)]
enum ScanState<'a> {
    NoBatch,
    InBatch(Candidate<'a>),
    Closing {
        candidate: Candidate<'a>,
        zero_crossing: DateTime<Utc>,
    },
}

/// One pass over one system's samples.
struct Scan<'a> {
    calendar: LocalCalendar,
    window: Window,
    system_id: &'a str,
    state: ScanState<'a>,
    /// Most recent sample seen, used to seed the next candidate's start.
    previous: Option<&'a Sample>,
    /// Most recent sample that passed validation, in any state.
    last_usable: Option<(&'a Sample, Reading)>,
    emitted: Vec<DetectedBatch>,
}

impl<'a> Scan<'a> {
    fn run(mut self, samples: &'a [Sample]) -> Vec<DetectedBatch> {
        for sample in samples {
            match check_sample(sample) {
                SampleCheck::Skip(reason) => {
                    debug!(
                        system_id = self.system_id,
                        timestamp = %sample.timestamp,
                        %reason,
                        "sample skipped"
                    );
                    if matches!(self.state, ScanState::NoBatch) {
                        self.previous = Some(sample);
                    }
                }
                SampleCheck::Usable(reading) => {
                    self.step(sample, reading);
                    self.previous = Some(sample);
                    self.last_usable = Some((sample, reading));
                }
            }
        }

        if let Some(last) = samples.last() {
            self.finish(last);
        }

        let window = self.window;
        self.emitted.retain(|b| window.contains(b.start_time));
        self.emitted
    }

    fn step(&mut self, sample: &'a Sample, reading: Reading) {
        let state = std::mem::replace(&mut self.state, ScanState::NoBatch);
        self.state = match state {
            ScanState::NoBatch => self.from_idle(sample, reading),
            ScanState::InBatch(candidate) => self.in_batch(candidate, sample, reading),
            ScanState::Closing {
                candidate,
                zero_crossing,
            } => {
                if sample.timestamp - zero_crossing >= candidate.profile.closing_timeout() {
                    self.finalize(candidate, zero_crossing, CloseReason::Timeout);
                    self.from_idle(sample, reading)
                } else if reading.is_flowing() {
                    debug!(
                        system_id = self.system_id,
                        timestamp = %sample.timestamp,
                        "flow resumed before closing timeout"
                    );
                    self.in_batch(candidate, sample, reading)
                } else {
                    ScanState::Closing {
                        candidate,
                        zero_crossing,
                    }
                }
            }
        };
    }

    fn from_idle(&mut self, sample: &'a Sample, reading: Reading) -> ScanState<'a> {
        if !reading.is_flowing() || !self.window.contains(sample.timestamp) {
            return ScanState::NoBatch;
        }
        match self.open(sample, reading) {
            Some(candidate) => ScanState::InBatch(candidate),
            None => ScanState::NoBatch,
        }
    }

    fn in_batch(
        &mut self,
        mut candidate: Candidate<'a>,
        sample: &'a Sample,
        reading: Reading,
    ) -> ScanState<'a> {
        if !reading.is_flowing() {
            if candidate.profile.closing_timeout_minutes == 0 {
                self.finalize(candidate, sample.timestamp, CloseReason::Timeout);
                return ScanState::NoBatch;
            }
            return ScanState::Closing {
                candidate,
                zero_crossing: sample.timestamp,
            };
        }

        let day = self.calendar.local_date(sample.timestamp);
        if day != candidate.start_day {
            return self.day_boundary(candidate, sample, reading, day);
        }

        candidate.push(sample, reading);
        ScanState::InBatch(candidate)
    }

    /// Close the start-day part at local 23:59:59.999999 and, if the
    /// next-day sample is still inside the window, continue with a fresh
    /// candidate starting at local midnight.
    fn day_boundary(
        &mut self,
        candidate: Candidate<'a>,
        sample: &'a Sample,
        reading: Reading,
        day: NaiveDate,
    ) -> ScanState<'a> {
        let end = self.day_end(candidate.start_day);
        self.finalize(candidate, end, CloseReason::DayBoundary);

        if !self.window.contains(sample.timestamp) {
            return ScanState::NoBatch;
        }
        let Some(profile) = usable_profile(sample) else {
            debug!(
                system_id = self.system_id,
                timestamp = %sample.timestamp,
                "no usable profile at day boundary, candidate not reopened"
            );
            return ScanState::NoBatch;
        };
        ScanState::InBatch(self.continuation(sample, reading, day, profile))
    }

    /// A candidate for the part of an episode that runs on from the previous
    /// local day. It starts at local midnight with `sample` as its reference.
    fn continuation(
        &self,
        sample: &'a Sample,
        reading: Reading,
        day: NaiveDate,
        profile: Profile,
    ) -> Candidate<'a> {
        Candidate {
            start: reading,
            start_time: self
                .calendar
                .start_of_day(day)
                .unwrap_or(sample.timestamp),
            start_day: day,
            flowing: vec![(sample, reading)],
            profile,
        }
    }

    fn open(&self, trigger: &'a Sample, reading: Reading) -> Option<Candidate<'a>> {
        let Some(profile) = usable_profile(trigger) else {
            debug!(
                system_id = self.system_id,
                timestamp = %trigger.timestamp,
                "flowing sample without usable profile, candidate not opened"
            );
            return None;
        };

        let start_day = self.calendar.local_date(trigger.timestamp);
        if self.flowed_through_midnight(start_day) {
            debug!(
                system_id = self.system_id,
                timestamp = %trigger.timestamp,
                "flow already running at local midnight, opening day continuation"
            );
            return Some(self.continuation(trigger, reading, start_day, profile));
        }

        let (start_time, start) = match self.preceding_start(start_day) {
            Some((sample, prior)) => (sample.timestamp, prior),
            None => (trigger.timestamp, reading),
        };

        Some(Candidate {
            start,
            start_time,
            start_day,
            flowing: vec![(trigger, reading)],
            profile,
        })
    }

    /// The preceding sample qualifies as the recorded start only if it is a
    /// usable non-flowing reading inside the window and on the same local day.
    fn preceding_start(&self, start_day: NaiveDate) -> Option<(&'a Sample, Reading)> {
        let previous = self.previous?;
        let SampleCheck::Usable(reading) = check_sample(previous) else {
            return None;
        };
        let eligible = !reading.is_flowing()
            && self.window.contains(previous.timestamp)
            && self.calendar.local_date(previous.timestamp) == start_day;
        eligible.then_some((previous, reading))
    }

    /// Whether the last usable sample lies before `start_day` and was still
    /// flowing, i.e. the episode ran through local midnight.
    fn flowed_through_midnight(&self, start_day: NaiveDate) -> bool {
        self.last_usable.is_some_and(|(sample, reading)| {
            reading.is_flowing() && self.calendar.local_date(sample.timestamp) < start_day
        })
    }

    fn day_end(&self, day: NaiveDate) -> DateTime<Utc> {
        self.calendar
            .end_of_day(day)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn finalize(&mut self, candidate: Candidate<'a>, end_time: DateTime<Utc>, reason: CloseReason) {
        // A zero-crossing observed after midnight still ends on the start day.
        let end_time = end_time.min(self.day_end(candidate.start_day));
        let mass = candidate.mass_delta();
        let threshold = candidate.profile.volume_threshold;
        if mass < threshold {
            debug!(
                system_id = self.system_id,
                start = %candidate.start_time,
                mass,
                threshold,
                "candidate under threshold, discarded"
            );
            return;
        }

        debug!(
            system_id = self.system_id,
            start = %candidate.start_time,
            end = %end_time,
            mass,
            ?reason,
            "batch emitted"
        );
        self.emitted.push(DetectedBatch {
            system_id: self.system_id.to_string(),
            start_time: candidate.start_time,
            end_time,
            total_mass: mass,
            total_volume: candidate.volume_delta(),
            avg_temperature: candidate.average(|s| s.temperature),
            avg_density: candidate.average(|s| s.density),
            avg_pressure: candidate.average(|s| s.pressure),
            sample_count: candidate.flowing.len(),
            profile: candidate.profile,
            close_reason: reason,
        });
    }

    /// End-of-scan finalization.
    ///
    /// An open candidate is closed only when the input ends on a non-flowing
    /// sample or on a later local day. A pending closing countdown is never
    /// resolved here: a later scan observes it.
    fn finish(&mut self, last: &'a Sample) {
        let state = std::mem::replace(&mut self.state, ScanState::NoBatch);
        match state {
            ScanState::InBatch(candidate) => {
                let trailing_idle = last.flow_rate.is_some_and(|rate| rate <= 0.0);
                let crossed_day = self.calendar.local_date(last.timestamp) > candidate.start_day;
                if crossed_day {
                    let end = self.day_end(candidate.start_day);
                    self.finalize(candidate, end, CloseReason::DayBoundary);
                } else if trailing_idle {
                    let end = candidate
                        .last_flowing()
                        .map(|(s, _)| s.timestamp)
                        .unwrap_or(candidate.start_time);
                    self.finalize(candidate, end, CloseReason::EndOfScan);
                } else {
                    debug!(
                        system_id = self.system_id,
                        start = %candidate.start_time,
                        "scan ended while flowing, candidate left open"
                    );
                }
            }
            ScanState::Closing { candidate, .. } => {
                debug!(
                    system_id = self.system_id,
                    start = %candidate.start_time,
                    "scan ended inside closing timeout, candidate left open"
                );
            }
            ScanState::NoBatch => {}
        }
    }
}

fn usable_profile(sample: &Sample) -> Option<Profile> {
    sample.profile.filter(Profile::is_usable)
}

// =============================================================================
// DETECTOR
// =============================================================================

/// Converts one system's ascending sample sequence into batches.
#[derive(Debug, Clone, Copy)]
pub struct BatchDetector {
    calendar: LocalCalendar,
}

impl BatchDetector {
    #[must_use]
    pub const fn new(calendar: LocalCalendar) -> Self {
        Self { calendar }
    }

    #[must_use]
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(LocalCalendar::new(config.offset()))
    }

    /// Detect batches whose start falls inside `window`.
    ///
    /// `samples` may extend past either end of `window` (the orchestrator's
    /// margin); only the emission range is `window`.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::InvalidInput` if the samples are not in ascending
    /// timestamp order or belong to more than one system.
    pub fn detect(
        &self,
        samples: &[Sample],
        window: &Window,
    ) -> Result<Vec<DetectedBatch>, BatchError> {
        let Some(first) = samples.first() else {
            return Ok(Vec::new());
        };
        Self::validate_sequence(samples)?;

        let scan = Scan {
            calendar: self.calendar,
            window: *window,
            system_id: &first.system_id,
            state: ScanState::NoBatch,
            previous: None,
            last_usable: None,
            emitted: Vec::new(),
        };
        Ok(scan.run(samples))
    }

    /// Check the caller contract: one system, non-decreasing timestamps.
    pub fn validate_sequence(samples: &[Sample]) -> Result<(), BatchError> {
        for pair in samples.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.system_id != b.system_id {
                return Err(BatchError::InvalidInput(format!(
                    "mixed systems in one sequence: {} and {}",
                    a.system_id, b.system_id
                )));
            }
            if b.timestamp < a.timestamp {
                return Err(BatchError::InvalidInput(format!(
                    "samples out of order: {} after {}",
                    b.timestamp, a.timestamp
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
