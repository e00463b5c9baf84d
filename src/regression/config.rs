// Configuration for rolling-distribution regression detection
//
// Two independent signals classify a result: the z-score against the rolling
// baseline of its lineage, and the raw percent change against a chosen
// baseline result. Each has its own threshold.

use serde::{Deserialize, Serialize};

/// Configuration for regression detection
///
/// # Example
/// ```
/// use benchtrend::regression::RegressionConfig;
///
/// let config = RegressionConfig::default();
/// assert_eq!(config.window_size, 100);
/// assert_eq!(config.threshold_z, 5.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Number of commit ranks in the rolling window
    ///
    /// Ranks, not observations: all results on one commit (or on commits
    /// sharing a timestamp after a rebase) enter and leave the window together.
    ///
    /// Default: 100
    pub window_size: usize,

    /// |z| above which a result counts as a regression (negative z) or an
    /// improvement (positive z)
    ///
    /// Default: 5.0
    pub threshold_z: f64,

    /// Percent change above which a pairwise comparison counts as a
    /// regression or improvement, in percent (5.0 = 5%)
    ///
    /// Default: 5.0
    pub threshold_percent: f64,

    /// Minimum iteration samples before quartiles and stdev are reported for
    /// a single result
    ///
    /// Applied when a result is recorded: its summary is recomputed from the
    /// raw samples under this policy. The rolling engine works on the mean,
    /// which is always available.
    ///
    /// Default: 3
    pub min_aggregate_samples: usize,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            threshold_z: 5.0,
            threshold_percent: 5.0,
            min_aggregate_samples: crate::stats::DEFAULT_MIN_AGGREGATE_SAMPLES,
        }
    }
}

impl RegressionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.window_size == 0 {
            return Err("window_size must be >= 1, got 0".to_string());
        }

        if !(self.threshold_z.is_finite() && self.threshold_z >= 0.0) {
            return Err(format!(
                "threshold_z must be a non-negative number, got {}",
                self.threshold_z
            ));
        }

        if !(self.threshold_percent.is_finite() && self.threshold_percent >= 0.0) {
            return Err(format!(
                "threshold_percent must be a non-negative number, got {}",
                self.threshold_percent
            ));
        }

        if self.min_aggregate_samples < 2 {
            return Err(format!(
                "min_aggregate_samples must be >= 2 for a sample stdev, got {}",
                self.min_aggregate_samples
            ));
        }

        Ok(())
    }
}
