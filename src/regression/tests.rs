// Cross-module scenarios: rolling baseline -> z-score -> comparison
//
// Each scenario builds a default-branch series, scores the newest point
// against the baseline of the ranks before it, and checks the verdict.

use super::*;
use crate::ancestry::OrderKey;
use crate::model::{MetricDirection, Observation, ResultOutcome, TimeSeriesKey};
use crate::stats::BenchmarkStats;

fn series(values: &[f64]) -> Vec<SeriesPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let ts = (i as i64 + 1) * 100;
            SeriesPoint {
                id: format!("obs-{i}"),
                commit_sha: format!("sha-{i}"),
                order_key: OrderKey::default_branch(ts),
                timestamp: ts,
                value,
                begins_distribution_change: false,
            }
        })
        .collect()
}

fn score_last(values: &[f64], direction: MetricDirection) -> Option<f64> {
    let rolling = RollingDistributionEngine::new(100).compute(series(values));
    let last = rolling.len() - 1;
    let baseline = rolling.baseline_at(last);
    ZScoreCalculator::score_baseline(rolling.points()[last].value, &baseline, direction)
}

/// Throughput jumps from ~2.5 items/s to 20 items/s
///
/// Scenario: an optimization lands on the default branch
/// Expected: large positive z, flagged as improvement
#[test]
fn test_throughput_improvement_fixture() {
    let z = score_last(&[2.0, 3.0, 20.0], MetricDirection::from_unit("items/second")).unwrap();
    assert!((z - 24.74873734152916).abs() < 1e-9, "z = {z}");

    let calc = ZScoreCalculator::default();
    assert!(calc.is_improvement(z));
    assert!(!calc.is_regression(z));
}

/// Runtime jumps from ~2.5 s to 12 s
///
/// Scenario: a slowdown lands on the default branch
/// Expected: large negative z, flagged as regression
#[test]
fn test_runtime_regression_fixture() {
    let z = score_last(&[2.0, 3.0, 12.0], MetricDirection::from_unit("seconds")).unwrap();
    assert!((z - -13.435028842544401).abs() < 1e-9, "z = {z}");

    let calc = ZScoreCalculator::default();
    assert!(calc.is_regression(z));
    assert!(!calc.is_improvement(z));
}

/// Benign variance does NOT trigger a false positive
#[test]
fn test_stable_series_within_threshold() {
    let values = [10.0, 10.4, 9.8, 10.1, 9.9, 10.3, 10.0, 9.7, 10.2, 10.1];
    let z = score_last(&values, MetricDirection::LowerIsBetter).unwrap();
    let calc = ZScoreCalculator::default();
    assert!(!calc.is_regression(z));
    assert!(!calc.is_improvement(z));
}

/// Two points are not enough for a residual stddev
#[test]
fn test_second_point_is_unscored() {
    assert_eq!(score_last(&[2.0, 3.0], MetricDirection::HigherIsBetter), None);
    assert_eq!(score_last(&[2.0], MetricDirection::HigherIsBetter), None);
}

/// A flat history has zero spread, so nothing can be scored against it
#[test]
fn test_constant_series_is_unscored() {
    assert_eq!(score_last(&[5.0, 5.0, 5.0, 9.0], MetricDirection::HigherIsBetter), None);
}

/// Scenario: a deliberate change (new compiler) is marked on a result
/// Expected: the first result of the new segment has no baseline mean, and
/// later results are judged against the new level only
#[test]
fn test_distribution_change_resets_baseline() {
    let mut points = series(&[2.0, 3.0, 2.0, 3.0, 20.0, 21.0, 20.0]);
    points[4].begins_distribution_change = true;
    let rolling = RollingDistributionEngine::new(100).compute(points);

    let first = rolling.baseline_at(4);
    assert_eq!(first.mean, None);
    assert_eq!(
        ZScoreCalculator::score_baseline(20.0, &first, MetricDirection::HigherIsBetter),
        None
    );

    let later = rolling.baseline_at(6);
    assert_eq!(later.mean, Some(20.5));
    let z = ZScoreCalculator::score_baseline(20.0, &later, MetricDirection::HigherIsBetter).unwrap();
    assert!(!ZScoreCalculator::default().is_regression(z));
}

/// The window forgets old history
#[test]
fn test_window_drops_old_ranks() {
    let values = [100.0, 100.0, 100.0, 1.0, 2.0, 1.0, 2.0];
    let rolling = RollingDistributionEngine::new(4).compute(series(&values));
    let baseline = rolling.baseline_at(6);
    // ranks 2..=5
    assert_eq!(baseline.observation_count, 4);
    assert_eq!(baseline.mean, Some((100.0 + 1.0 + 2.0 + 1.0) / 4.0));
}

/// Comparison carries the z-score the contender was recorded with
#[test]
fn test_comparison_uses_rolling_z() {
    let key = TimeSeriesKey::new("case", "ctx", "hw", "repo");
    let z = score_last(&[2.0, 3.0, 12.0], MetricDirection::LowerIsBetter);
    let make = |id: &str, mean: f64, z: Option<f64>| ScoredResult {
        observation: Observation::new(
            id,
            &key,
            Some("sha"),
            0,
            "seconds",
            ResultOutcome::Success {
                stats: BenchmarkStats::from_mean(mean),
            },
        ),
        baseline: None,
        z_score: z,
    };

    let report = ResultComparator::default()
        .compare_lists(&[make("base", 3.0, None)], &[make("cont", 12.0, z)]);
    let cmp = &report.comparisons[0];
    assert_eq!(cmp.percent_change, -300.0);
    assert!(cmp.percent_regression_indicated);
    assert!(cmp.z_regression_indicated);
    assert!(report.to_report_string().contains("REGRESSION DETECTED (1 results)"));
}
