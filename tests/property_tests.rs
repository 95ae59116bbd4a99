//! Property-based tests for invariants using proptest.

use std::time::Duration;

use chrono::Utc;
use hallmonitor::config::parse_duration;
use hallmonitor::model::{Aggregate, BucketKind, CheckResult, MonitorKind, Status};
use proptest::prelude::*;

fn sample_result(up: bool, millis: u64) -> CheckResult {
    CheckResult {
        monitor_name: "a".to_string(),
        kind: MonitorKind::Tcp,
        group: "default".to_string(),
        status: if up { Status::Up } else { Status::Down },
        started_at: Utc::now(),
        duration: Duration::from_millis(millis),
        error: None,
        outcome: None,
    }
}

proptest! {
    // up_checks + down_checks always reconstructs total_checks, and the
    // reported percentage always stays within [0, 100].
    #[test]
    fn prop_aggregate_counts_and_uptime_stay_in_bounds(
        up_flags in prop::collection::vec(any::<bool>(), 0..50),
        millis in prop::collection::vec(1u64..5000u64, 50),
    ) {
        let results: Vec<CheckResult> = up_flags
            .iter()
            .zip(millis.iter())
            .map(|(&up, &ms)| sample_result(up, ms))
            .collect();

        let aggregate = Aggregate::from_results("a", BucketKind::Hour, Utc::now(), &results);

        prop_assert_eq!(aggregate.up_checks + aggregate.down_checks, aggregate.total_checks);
        prop_assert!(aggregate.uptime_pct >= 0.0 && aggregate.uptime_pct <= 100.0);
        if !results.is_empty() {
            prop_assert!(aggregate.min_duration <= aggregate.avg_duration);
            prop_assert!(aggregate.avg_duration <= aggregate.max_duration);
        }
    }
}

proptest! {
    // Every value `parse_duration` accepts round-trips back to the same
    // number of seconds its suffix implies; no accepted input is negative.
    #[test]
    fn prop_parse_duration_accepts_only_well_formed_suffixes(value in 0u64..100_000u64, unit in prop::sample::select(vec!['s', 'm', 'h'])) {
        let input = format!("{value}{unit}");
        let parsed = parse_duration(&input).unwrap();

        let expected_secs = match unit {
            's' => value,
            'm' => value * 60,
            'h' => value * 3600,
            _ => unreachable!(),
        };
        prop_assert_eq!(parsed, Duration::from_secs(expected_secs));
    }
}
