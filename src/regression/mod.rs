// Rolling-distribution regression detection
//
// A benchmark result is judged against the recent history of its own time
// series, on its own lineage of commits:
//
// 1. rolling: rank-based rolling mean and residual stddev over the series,
//    reset at distribution-change markers
// 2. zscore: direction-adjusted z-score of a new value against that baseline
// 3. comparator: pairwise run comparison by percent change, carrying the
//    contender's z-score along
//
// Thresholds live in `RegressionConfig`; the engine itself has no policy.

mod comparator;
mod config;
mod rolling;
mod zscore;

pub use comparator::{ComparisonReport, ResultComparator, ResultComparison};
pub use config::RegressionConfig;
pub use rolling::{Baseline, RollingDistributionEngine, RollingPoint, RollingSeries, SeriesPoint};
pub use zscore::{ScoredResult, ZScoreCalculator};

#[cfg(test)]
mod tests;
