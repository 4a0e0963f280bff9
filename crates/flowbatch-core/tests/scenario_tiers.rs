//! # Scenario Tier Tests (T0-T6)
//!
//! End-to-end behaviour of detection runs. If ANY tier fails, batches in
//! storage cannot be trusted.
//!
//! ## Tiers
//! - T0: Idempotent re-detection
//! - T1: Threshold boundary
//! - T2: Closing hysteresis
//! - T3: Day-boundary split
//! - T4: Counter-reset resilience
//! - T5: End-to-end episode
//! - T6: Margin contract

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};
use flowbatch_core::{
    BatchDetector, BatchStore, DetectionConfig, DetectionOrchestrator, LocalCalendar,
    MassAccumulator, MemoryStore, Profile, RedbStore, Sample, SampleSeries, Window,
};

const SYSTEM: &str = "skid-7";

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).single().expect("ts")
}

fn at(minute: i64) -> DateTime<Utc> {
    base() + Duration::minutes(minute)
}

fn reading(ts: DateTime<Utc>, rate: f64, mass: f64, profile: Profile) -> Sample {
    Sample::new(SYSTEM, ts)
        .with_flow(rate, mass, mass)
        .with_profile(profile)
}

/// Builds a minute-resolution series from `(rate, mass)` pairs starting at `base()`.
fn minutes(points: &[(f64, f64)], profile: Profile) -> Vec<Sample> {
    points
        .iter()
        .enumerate()
        .map(|(i, &(rate, mass))| reading(at(i as i64), rate, mass, profile))
        .collect()
}

fn utc_detector() -> BatchDetector {
    BatchDetector::new(LocalCalendar::new(FixedOffset::east_opt(0).expect("offset")))
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).expect("date")
}

fn utc_day_window(d: u32) -> Window {
    LocalCalendar::new(FixedOffset::east_opt(0).expect("offset"))
        .day_window(day(d))
        .expect("day window")
}

// =============================================================================
// TIER T0: IDEMPOTENT RE-DETECTION
// =============================================================================

mod t0_idempotence {
    use super::*;

    fn episode() -> Vec<Sample> {
        let profile = Profile::new(10.0, 5);
        let mut points = vec![(0.0, 0.0)];
        points.extend((0..10).map(|i| (2.0, f64::from(i) * 2.0)));
        points.extend((0..6).map(|_| (0.0, 18.0)));
        minutes(&points, profile)
    }

    /// T0.1: A second run inserts nothing and returns the same set.
    #[test]
    fn second_run_is_a_no_op() {
        let orchestrator = DetectionOrchestrator::new(
            SampleSeries::from_samples(episode()),
            MemoryStore::new(),
            DetectionConfig::default(),
        );

        let first = orchestrator.detect(SYSTEM, at(0), at(120)).expect("first");
        let second = orchestrator.detect(SYSTEM, at(0), at(120)).expect("second");

        assert_eq!(first.new_count, 1);
        assert_eq!(second.new_count, 0);
        assert_eq!(second.existing_count, 1);

        let fps = |r: &flowbatch_core::DetectionReport| {
            r.batches.iter().map(|b| b.fingerprint.clone()).collect::<Vec<_>>()
        };
        assert_eq!(fps(&first), fps(&second));
    }

    /// T0.2: Idempotence survives reopening a redb database.
    #[test]
    fn redb_rerun_after_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("batches.redb");

        let first = {
            let orchestrator = DetectionOrchestrator::new(
                SampleSeries::from_samples(episode()),
                RedbStore::open(&path).expect("open"),
                DetectionConfig::default(),
            );
            orchestrator.detect(SYSTEM, at(0), at(120)).expect("first")
        };

        let orchestrator = DetectionOrchestrator::new(
            SampleSeries::from_samples(episode()),
            RedbStore::open(&path).expect("reopen"),
            DetectionConfig::default(),
        );
        let second = orchestrator.detect(SYSTEM, at(0), at(120)).expect("second");

        assert_eq!(first.new_count, 1);
        assert_eq!(second.new_count, 0);
        assert_eq!(second.batches, first.batches);
        assert_eq!(orchestrator.store().batch_count().expect("count"), 1);
    }

    /// T0.3: Overlapping windows do not duplicate batches.
    #[test]
    fn overlapping_windows_share_batches() {
        let orchestrator = DetectionOrchestrator::new(
            SampleSeries::from_samples(episode()),
            MemoryStore::new(),
            DetectionConfig::default(),
        );
        orchestrator.detect(SYSTEM, at(0), at(60)).expect("narrow");
        let wide = orchestrator
            .detect(SYSTEM, at(-60), at(180))
            .expect("wide");
        assert_eq!(wide.new_count, 0);
        assert_eq!(wide.batches.len(), 1);
    }
}

// =============================================================================
// TIER T1: THRESHOLD BOUNDARY
// =============================================================================

mod t1_threshold {
    use super::*;

    fn episode_with_mass(total: f64) -> Vec<Sample> {
        let profile = Profile::new(10.0, 3);
        let step = total / 4.0;
        let mut points = vec![(0.0, 100.0)];
        points.extend((1..=4).map(|i| (1.0, 100.0 + step * f64::from(i))));
        points.extend((0..4).map(|_| (0.0, 100.0 + total)));
        minutes(&points, profile)
    }

    /// T1.1: Mass exactly at threshold is persisted.
    #[test]
    fn mass_equal_to_threshold_is_persisted() {
        let window = Window::new(at(0), at(60)).expect("window");
        let batches = utc_detector()
            .detect(&episode_with_mass(10.0), &window)
            .expect("detect");
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].total_mass, 10.0);
    }

    /// T1.2: One unit below threshold is discarded.
    #[test]
    fn mass_one_below_threshold_is_discarded() {
        let window = Window::new(at(0), at(60)).expect("window");
        let batches = utc_detector()
            .detect(&episode_with_mass(9.0), &window)
            .expect("detect");
        assert!(batches.is_empty());
    }

    /// T1.3: Discarded candidates never reach the store.
    #[test]
    fn sub_threshold_is_never_stored() {
        let orchestrator = DetectionOrchestrator::new(
            SampleSeries::from_samples(episode_with_mass(9.0)),
            MemoryStore::new(),
            DetectionConfig::default(),
        );
        let report = orchestrator.detect(SYSTEM, at(0), at(60)).expect("detect");
        assert_eq!(report.new_count, 0);
        assert!(report.batches.is_empty());
        // The raw total is independent of the threshold.
        assert!((report.raw_mass_total - 9.0).abs() < 1e-9);
    }
}

// =============================================================================
// TIER T2: CLOSING HYSTERESIS
// =============================================================================

mod t2_hysteresis {
    use super::*;

    /// T2.1: Zero flow for (timeout - 1) minutes, then flow resumes: one batch
    /// from the original start.
    #[test]
    fn short_pause_does_not_close() {
        let profile = Profile::new(10.0, 5);
        let mut points = vec![(0.0, 0.0)];
        points.extend((1..=5).map(|i| (2.0, f64::from(i) * 2.0))); // t1..t5
        points.extend((0..4).map(|_| (0.0, 10.0))); // t6..t9
        points.extend((1..=5).map(|i| (2.0, 10.0 + f64::from(i) * 2.0))); // t10..t14, 4 minutes after t6
        points.extend((0..7).map(|_| (0.0, 20.0))); // t15..t21
        let samples = minutes(&points, profile);

        let window = Window::new(at(0), at(60)).expect("window");
        let batches = utc_detector().detect(&samples, &window).expect("detect");

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].start_time, at(0));
        assert_eq!(batches[0].end_time, at(15));
        assert_eq!(batches[0].total_mass, 20.0);
        assert_eq!(batches[0].sample_count, 10);
    }

    /// T2.2: A pause of the full timeout splits the episode in two.
    #[test]
    fn full_timeout_pause_closes() {
        let profile = Profile::new(10.0, 5);
        let mut points = vec![(0.0, 0.0)];
        points.extend((1..=5).map(|i| (2.0, f64::from(i) * 2.0))); // t1..t5
        points.extend((0..6).map(|_| (0.0, 10.0))); // t6..t11, 5 minutes after t6
        points.extend((1..=5).map(|i| (2.0, 10.0 + f64::from(i) * 2.0))); // t12..t16
        points.extend((0..6).map(|_| (0.0, 20.0))); // t17..t22
        let samples = minutes(&points, profile);

        let window = Window::new(at(0), at(60)).expect("window");
        let batches = utc_detector().detect(&samples, &window).expect("detect");

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].end_time, at(6));
        assert_eq!(batches[1].start_time, at(11));
        assert_eq!(batches[1].end_time, at(17));
    }
}

// =============================================================================
// TIER T3: DAY-BOUNDARY SPLIT
// =============================================================================

mod t3_day_boundary {
    use super::*;

    fn night(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).single().expect("ts")
    }

    /// Idle 22:50, flowing 23:00..=01:00 every 10 minutes (+5 each),
    /// idle from 01:10. Sample times are listed explicitly.
    fn overnight(profile: Profile, first_flow: DateTime<Utc>) -> Vec<Sample> {
        let mut samples = vec![reading(night(1, 22, 50), 0.0, 0.0, profile)];
        let mut ts = night(1, 23, 0);
        let mut mass = 0.0;
        while ts <= night(2, 1, 0) {
            let rate = if ts >= first_flow { 1.0 } else { 0.0 };
            samples.push(reading(ts, rate, mass, profile));
            if ts >= first_flow {
                mass += 5.0;
            }
            ts += Duration::minutes(10);
        }
        let mut ts = night(2, 1, 10);
        while ts <= night(2, 2, 0) {
            samples.push(reading(ts, 0.0, mass, profile));
            ts += Duration::minutes(10);
        }
        samples
    }

    /// Idle 22:55, flowing 23:05..=00:55 every 10 minutes (+5 each) with no
    /// sample at midnight, idle from 01:05.
    fn overnight_without_midnight(profile: Profile) -> Vec<Sample> {
        let mut samples = vec![reading(night(1, 22, 55), 0.0, 0.0, profile)];
        let mut ts = night(1, 23, 5);
        let mut mass = 0.0;
        while ts <= night(2, 0, 55) {
            samples.push(reading(ts, 1.0, mass, profile));
            mass += 5.0;
            ts += Duration::minutes(10);
        }
        let mut ts = night(2, 1, 5);
        while ts <= night(2, 1, 35) {
            samples.push(reading(ts, 0.0, mass - 5.0, profile));
            ts += Duration::minutes(10);
        }
        samples
    }

    /// T3.1: 23:00 to 01:00 yields exactly two batches split at midnight.
    #[test]
    fn overnight_episode_splits() {
        let profile = Profile::new(10.0, 15);
        let samples = overnight(profile, night(1, 23, 0));
        let window = Window::new(night(1, 0, 0), night(2, 23, 0)).expect("window");

        let batches = utc_detector().detect(&samples, &window).expect("detect");
        assert_eq!(batches.len(), 2);

        let first = &batches[0];
        assert_eq!(first.start_time, night(1, 22, 50));
        assert_eq!(first.end_time.hour(), 23);
        assert_eq!(first.end_time.minute(), 59);
        assert_eq!(first.end_time.second(), 59);
        assert_eq!(first.end_time.nanosecond(), 999_999_000);
        assert_eq!(first.total_mass, 25.0);

        let second = &batches[1];
        assert_eq!(second.start_time, night(2, 0, 0));
        assert_eq!(second.end_time, night(2, 1, 10));
        assert_eq!(second.total_mass, 30.0);
    }

    /// T3.2: Each half faces the threshold on its own.
    #[test]
    fn each_half_is_thresholded() {
        let profile = Profile::new(10.0, 15);
        // Flow only starts at 23:50: the start-day part has zero mass.
        let samples = overnight(profile, night(1, 23, 50));
        let window = Window::new(night(1, 0, 0), night(2, 23, 0)).expect("window");

        let batches = utc_detector().detect(&samples, &window).expect("detect");
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].start_time, night(2, 0, 0));
    }

    /// T3.3: Local midnight follows the configured offset, not UTC.
    #[test]
    fn split_uses_local_midnight() {
        let profile = Profile::new(10.0, 15);
        let samples = overnight(profile, night(1, 23, 0));
        let window = Window::new(night(1, 0, 0), night(2, 23, 0)).expect("window");

        // UTC+01:00: the episode runs 00:00..02:00 local on Mar 2, no split.
        let plus_one = BatchDetector::new(LocalCalendar::new(
            FixedOffset::east_opt(3600).expect("offset"),
        ));
        let batches = plus_one.detect(&samples, &window).expect("detect");
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].total_mass, 60.0);
    }

    /// T3.4: Day runs agree with the two-day run.
    #[test]
    fn per_day_runs_match_two_day_run() {
        let profile = Profile::new(10.0, 15);
        let orchestrator = DetectionOrchestrator::new(
            SampleSeries::from_samples(overnight(profile, night(1, 23, 0))),
            MemoryStore::new(),
            DetectionConfig::default(),
        );

        let d1 = utc_day_window(1);
        let d2 = utc_day_window(2);
        let first = orchestrator.detect(SYSTEM, d1.start, d1.end).expect("day 1");
        let second = orchestrator.detect(SYSTEM, d2.start, d2.end).expect("day 2");
        assert_eq!(first.new_count, 1);
        assert_eq!(second.new_count, 1);

        let window = Window::new(night(1, 0, 0), night(2, 23, 0)).expect("window");
        let combined: Vec<_> = utc_detector()
            .detect(&overnight(profile, night(1, 23, 0)), &window)
            .expect("detect")
            .into_iter()
            .map(|b| b.into_batch().fingerprint)
            .collect();
        let stored: Vec<_> = first
            .batches
            .iter()
            .chain(second.batches.iter())
            .map(|b| b.fingerprint.clone())
            .collect();
        assert_eq!(stored, combined);
    }

    /// T3.5: Re-running the second day after a two-day run stores nothing,
    /// even without a sample at midnight.
    #[test]
    fn day_two_rerun_matches_two_day_run() {
        let profile = Profile::new(10.0, 15);
        let orchestrator = DetectionOrchestrator::new(
            SampleSeries::from_samples(overnight_without_midnight(profile)),
            MemoryStore::new(),
            DetectionConfig::default(),
        );

        let both = orchestrator
            .detect(SYSTEM, night(1, 0, 0), night(2, 23, 0))
            .expect("two days");
        assert_eq!(both.new_count, 2);
        assert_eq!(both.batches[0].start_time, night(1, 22, 55));
        assert_eq!(both.batches[0].total_mass, 25.0);
        assert_eq!(both.batches[1].start_time, night(2, 0, 0));
        assert_eq!(both.batches[1].end_time, night(2, 1, 5));
        assert_eq!(both.batches[1].total_mass, 25.0);

        let d2 = utc_day_window(2);
        let rerun = orchestrator.detect(SYSTEM, d2.start, d2.end).expect("day 2");
        assert_eq!(rerun.new_count, 0);
        assert_eq!(rerun.existing_count, 1);
        assert_eq!(rerun.batches, both.batches[1..].to_vec());
        assert_eq!(orchestrator.store().batch_count().expect("count"), 2);
    }
}

// =============================================================================
// TIER T4: COUNTER-RESET RESILIENCE
// =============================================================================

mod t4_counter_reset {
    use super::*;

    /// T4.1: `[100, 150, 5, 60]` while flowing totals 105.
    #[test]
    fn reset_mid_flow() {
        let profile = Profile::new(10.0, 5);
        let samples = minutes(&[(1.0, 100.0), (1.0, 150.0), (1.0, 5.0), (1.0, 60.0)], profile);
        let window = Window::new(at(0), at(10)).expect("window");

        let total = MassAccumulator::default().total(&samples, &window);
        assert_eq!(total, 105.0);
    }

    /// T4.2: The orchestrator's raw total uses the same rule.
    #[test]
    fn raw_total_in_report() {
        let profile = Profile::new(1_000.0, 5);
        let samples = minutes(&[(1.0, 100.0), (1.0, 150.0), (1.0, 5.0), (1.0, 60.0)], profile);
        let orchestrator = DetectionOrchestrator::new(
            SampleSeries::from_samples(samples),
            MemoryStore::new(),
            DetectionConfig::default(),
        );
        let report = orchestrator.detect(SYSTEM, at(0), at(10)).expect("detect");
        assert_eq!(report.raw_mass_total, 105.0);
    }
}

// =============================================================================
// TIER T5: END-TO-END EPISODE
// =============================================================================

mod t5_end_to_end {
    use super::*;

    /// T5.1: t=0 idle, t=1..10 rate 2 with mass 0..18, t=11..16 idle.
    #[test]
    fn reference_episode() {
        let profile = Profile::new(10.0, 5);
        let mut points = vec![(0.0, 0.0)];
        points.extend((0..10).map(|i| (2.0, f64::from(i) * 2.0)));
        points.extend((0..6).map(|_| (0.0, 18.0)));

        let orchestrator = DetectionOrchestrator::new(
            SampleSeries::from_samples(minutes(&points, profile)),
            MemoryStore::new(),
            DetectionConfig::default(),
        );
        let report = orchestrator.detect(SYSTEM, at(0), at(60)).expect("detect");

        assert_eq!(report.new_count, 1);
        let batch = &report.batches[0];
        assert_eq!(batch.start_time, at(0));
        assert_eq!(batch.end_time, at(11));
        assert_eq!(batch.total_mass, 18.0);
        assert_eq!(batch.profile, profile);
        assert_eq!(batch.duration_secs, 660);
        assert_eq!(
            batch.fingerprint,
            flowbatch_core::fingerprint(SYSTEM, at(0), at(11), 10.0, 5)
        );
    }
}

// =============================================================================
// TIER T6: MARGIN CONTRACT
// =============================================================================

mod t6_margin {
    use super::*;

    /// T6.1: An episode starting after the window end, inside the margin, is
    /// not stored by that run; the next day's run stores it.
    #[test]
    fn margin_batch_is_picked_up_next_day() {
        let profile = Profile::new(10.0, 5);
        let next_morning = Utc.with_ymd_and_hms(2024, 3, 2, 2, 0, 0).single().expect("ts");
        let mut samples = vec![reading(next_morning, 0.0, 0.0, profile)];
        for i in 1..=10 {
            let ts = next_morning + Duration::minutes(i);
            samples.push(reading(ts, 2.0, f64::from(i as i32) * 2.0, profile));
        }
        for i in 11..=20 {
            let ts = next_morning + Duration::minutes(i);
            samples.push(reading(ts, 0.0, 20.0, profile));
        }

        let orchestrator = DetectionOrchestrator::new(
            SampleSeries::from_samples(samples),
            MemoryStore::new(),
            DetectionConfig::default(),
        );

        let d1 = utc_day_window(1);
        let day_one = orchestrator.detect(SYSTEM, d1.start, d1.end).expect("day 1");
        assert_eq!(day_one.new_count, 0);
        assert!(day_one.batches.is_empty());
        assert_eq!(orchestrator.store().batch_count().expect("count"), 0);

        let d2 = utc_day_window(2);
        let day_two = orchestrator.detect(SYSTEM, d2.start, d2.end).expect("day 2");
        assert_eq!(day_two.new_count, 1);
        assert_eq!(day_two.batches[0].start_time, next_morning);
    }

    /// T6.2: The margin lets the first day see its midnight split.
    #[test]
    fn margin_reveals_midnight_tail() {
        let profile = Profile::new(10.0, 60);
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).single().expect("ts");
        let mut samples = vec![reading(late - Duration::minutes(1), 0.0, 0.0, profile)];
        for i in 0..=90 {
            let ts = late + Duration::minutes(i);
            samples.push(reading(ts, 1.0, f64::from(i as i32), profile));
        }

        let d1 = utc_day_window(1);
        let without_margin = DetectionOrchestrator::new(
            SampleSeries::from_samples(samples.clone()),
            MemoryStore::new(),
            DetectionConfig {
                margin_minutes: 0,
                ..DetectionConfig::default()
            },
        );
        let report = without_margin
            .detect(SYSTEM, d1.start, d1.end)
            .expect("no margin");
        assert_eq!(report.new_count, 0);

        let with_margin = DetectionOrchestrator::new(
            SampleSeries::from_samples(samples),
            MemoryStore::new(),
            DetectionConfig::default(),
        );
        let report = with_margin.detect(SYSTEM, d1.start, d1.end).expect("margin");
        assert_eq!(report.new_count, 1);
        assert_eq!(report.batches[0].end_time, d1.end);
        assert_eq!(report.batches[0].total_mass, 59.0);
    }
}
