// Z-score of a result against its rolling baseline
//
// Sign convention: negative z is worse, positive z is better, whatever the
// unit. Lower-is-better units (seconds, bytes) flip the raw z so that a
// slowdown scores negative.

use crate::model::{MetricDirection, Observation};
use crate::regression::config::RegressionConfig;
use crate::regression::rolling::Baseline;
use serde::{Deserialize, Serialize};

/// An observation with the baseline and z-score it was recorded against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub observation: Observation,
    /// `None` when ancestry was unavailable
    pub baseline: Option<Baseline>,
    pub z_score: Option<f64>,
}

impl ScoredResult {
    pub fn unscored(observation: Observation) -> Self {
        Self {
            observation,
            baseline: None,
            z_score: None,
        }
    }
}

/// Scores values and classifies the scores against `threshold_z`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScoreCalculator {
    threshold_z: f64,
}

impl Default for ZScoreCalculator {
    fn default() -> Self {
        Self::from_config(&RegressionConfig::default())
    }
}

impl ZScoreCalculator {
    pub fn new(threshold_z: f64) -> Self {
        Self { threshold_z }
    }

    pub fn from_config(config: &RegressionConfig) -> Self {
        Self::new(config.threshold_z)
    }

    pub fn threshold_z(&self) -> f64 {
        self.threshold_z
    }

    /// Direction-adjusted z-score
    ///
    /// `None` when either statistic is missing, the stddev is zero, or the
    /// result is not finite.
    ///
    /// # Example
    /// ```
    /// use benchtrend::model::MetricDirection;
    /// use benchtrend::regression::ZScoreCalculator;
    ///
    /// let z = ZScoreCalculator::score(12.0, Some(10.0), Some(1.0), MetricDirection::LowerIsBetter);
    /// assert_eq!(z, Some(-2.0));
    /// ```
    pub fn score(
        value: f64,
        mean: Option<f64>,
        stddev: Option<f64>,
        direction: MetricDirection,
    ) -> Option<f64> {
        let (mean, stddev) = (mean?, stddev?);
        if stddev == 0.0 {
            return None;
        }

        let raw = (value - mean) / stddev;
        if !raw.is_finite() {
            return None;
        }

        match direction {
            MetricDirection::HigherIsBetter => Some(raw),
            MetricDirection::LowerIsBetter if raw == 0.0 => Some(0.0),
            MetricDirection::LowerIsBetter => Some(-raw),
        }
    }

    pub fn score_baseline(value: f64, baseline: &Baseline, direction: MetricDirection) -> Option<f64> {
        Self::score(value, baseline.mean, baseline.stddev, direction)
    }

    pub fn is_regression(&self, z: f64) -> bool {
        -z > self.threshold_z
    }

    pub fn is_improvement(&self, z: f64) -> bool {
        z > self.threshold_z
    }
}
