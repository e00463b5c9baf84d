//! Sample statistics for benchmark results
//!
//! Two layers live here:
//!
//! - [`BenchmarkStats`]: the per-result summary computed from raw iteration
//!   samples (mean, min, max and, with enough samples, quartiles and spread).
//!   Quartiles go through aprender's `DescriptiveStats` (R-7 quantiles over a
//!   trueno `Vector`). The vector is single precision, so it holds deviations
//!   from the f64 mean rather than the raw samples.
//! - `mean` / `sample_stddev`: double-precision helpers shared by the rolling
//!   engine. Baselines and z-scores never go through single precision.

use aprender::stats::DescriptiveStats;
use serde::{Deserialize, Serialize};
use trueno::Vector;

/// Fewer samples than this and quartiles/stdev are left undefined.
///
/// This is a reporting policy, not part of the regression math: the single
/// value summary (`mean`) is always available.
pub const DEFAULT_MIN_AGGREGATE_SAMPLES: usize = 3;

/// Summary of one result's iteration samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkStats {
    /// Raw samples in iteration order
    pub data: Vec<f64>,
    pub iterations: usize,
    /// Single value summary used for trend analysis
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub median: Option<f64>,
    #[serde(default)]
    pub q1: Option<f64>,
    #[serde(default)]
    pub q3: Option<f64>,
    #[serde(default)]
    pub iqr: Option<f64>,
    #[serde(default)]
    pub stdev: Option<f64>,
}

impl BenchmarkStats {
    /// Summarize raw samples
    ///
    /// Returns `None` for an empty sample set or one containing NaN/inf.
    ///
    /// # Example
    /// ```
    /// use benchtrend::stats::BenchmarkStats;
    ///
    /// let stats = BenchmarkStats::from_samples(&[1.0, 2.0, 3.0], 3).unwrap();
    /// assert_eq!(stats.mean, 2.0);
    /// assert_eq!(stats.median, Some(2.0));
    ///
    /// let short = BenchmarkStats::from_samples(&[1.0, 2.0], 3).unwrap();
    /// assert_eq!(short.mean, 1.5);
    /// assert_eq!(short.median, None);
    /// ```
    pub fn from_samples(samples: &[f64], min_aggregate_samples: usize) -> Option<Self> {
        if samples.is_empty() || samples.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mean = mean(samples)?;
        let mut stats = Self {
            data: samples.to_vec(),
            iterations: samples.len(),
            mean,
            min,
            max,
            median: None,
            q1: None,
            q3: None,
            iqr: None,
            stdev: None,
        };

        if samples.len() >= min_aggregate_samples.max(2) {
            let quartiles = quartiles(samples, mean);
            if let Some((q1, median, q3)) = quartiles {
                stats.q1 = Some(q1);
                stats.median = Some(median);
                stats.q3 = Some(q3);
                stats.iqr = Some(q3 - q1);
            }
            stats.stdev = sample_stddev(samples);
        }

        Some(stats)
    }

    /// Wrap an already-computed mean (e.g. a harness that reports only a summary)
    pub fn from_mean(mean: f64) -> Self {
        Self {
            data: vec![mean],
            iterations: 1,
            mean,
            min: mean,
            max: mean,
            median: None,
            q1: None,
            q3: None,
            iqr: None,
            stdev: None,
        }
    }

    /// Recompute every summary field from `data` under the given policy
    ///
    /// Reported mean, quartiles and spread are discarded. A summary-only
    /// payload (empty `data`) keeps its reported mean. `None` when the
    /// samples, or the reported mean in the summary-only case, are not
    /// finite.
    pub fn normalized(&self, min_aggregate_samples: usize) -> Option<Self> {
        if self.data.is_empty() {
            return self.mean.is_finite().then(|| Self::from_mean(self.mean));
        }
        Self::from_samples(&self.data, min_aggregate_samples)
    }
}

/// (q1, median, q3) via aprender's R-7 quantiles
///
/// Quantiles are translation-equivariant, so they are taken over deviations
/// from `center` and shifted back in f64.
fn quartiles(samples: &[f64], center: f64) -> Option<(f64, f64, f64)> {
    let single: Vec<f32> = samples.iter().map(|&v| (v - center) as f32).collect();
    let vector = Vector::from_slice(&single);
    let stats = DescriptiveStats::new(&vector);

    let q1 = stats.quantile(0.25);
    let median = stats.quantile(0.5);
    let q3 = stats.quantile(0.75);

    match (q1, median, q3) {
        (Ok(q1), Ok(median), Ok(q3)) => Some((
            center + f64::from(q1),
            center + f64::from(median),
            center + f64::from(q3),
        )),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            tracing::debug!("quartiles unavailable: {}", e);
            None
        }
    }
}

/// Arithmetic mean, `None` when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator), `None` below two values
pub fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_samples_basic() {
        let stats = BenchmarkStats::from_samples(&[10.0, 20.0, 30.0], 3).unwrap();
        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.mean, 20.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.median, Some(20.0));
        assert_eq!(stats.q1, Some(15.0));
        assert_eq!(stats.q3, Some(25.0));
        assert_eq!(stats.iqr, Some(10.0));
        assert_eq!(stats.stdev, Some(10.0));
    }

    #[test]
    fn test_from_samples_below_aggregate_policy() {
        let stats = BenchmarkStats::from_samples(&[4.0, 6.0], 3).unwrap();
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.min, 4.0);
        assert_eq!(stats.max, 6.0);
        assert!(stats.median.is_none());
        assert!(stats.stdev.is_none());
    }

    #[test]
    fn test_from_samples_policy_is_configurable() {
        let stats = BenchmarkStats::from_samples(&[4.0, 6.0], 2).unwrap();
        assert_eq!(stats.median, Some(5.0));
        assert!(stats.stdev.is_some());
    }

    #[test]
    fn test_from_samples_rejects_empty_and_nan() {
        assert!(BenchmarkStats::from_samples(&[], 3).is_none());
        assert!(BenchmarkStats::from_samples(&[1.0, f64::NAN, 2.0], 3).is_none());
    }

    #[test]
    fn test_single_sample() {
        let stats = BenchmarkStats::from_samples(&[7.5], 1).unwrap();
        assert_eq!(stats.mean, 7.5);
        // stdev needs two samples no matter the policy
        assert!(stats.stdev.is_none());
    }

    #[test]
    fn test_sample_stddev() {
        assert_eq!(sample_stddev(&[]), None);
        assert_eq!(sample_stddev(&[3.0]), None);
        assert_eq!(sample_stddev(&[5.0, 5.0, 5.0]), Some(0.0));

        let sd = sample_stddev(&[0.0, 1.0]).unwrap();
        assert!((sd - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-15);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn test_quartiles_keep_double_precision() {
        let stats =
            BenchmarkStats::from_samples(&[100000001.0, 100000002.0, 100000003.0], 3).unwrap();
        assert_eq!(stats.mean, 100000002.0);
        assert_eq!(stats.median, Some(100000002.0));
        assert_eq!(stats.q1, Some(100000001.5));
        assert_eq!(stats.q3, Some(100000002.5));
        assert_eq!(stats.iqr, Some(1.0));
    }

    #[test]
    fn test_normalized_discards_reported_summary() {
        let reported = BenchmarkStats {
            data: vec![1.0, 2.0, 3.0],
            iterations: 3,
            mean: 50.0,
            min: 0.0,
            max: 99.0,
            median: Some(2.0),
            q1: None,
            q3: None,
            iqr: None,
            stdev: Some(1.0),
        };

        let strict = reported.normalized(10).unwrap();
        assert_eq!(strict.mean, 2.0);
        assert_eq!(strict.min, 1.0);
        assert_eq!(strict.max, 3.0);
        assert_eq!(strict.median, None);
        assert_eq!(strict.stdev, None);

        let relaxed = reported.normalized(3).unwrap();
        assert_eq!(relaxed.median, Some(2.0));
        assert_eq!(relaxed.stdev, Some(1.0));
    }

    #[test]
    fn test_normalized_summary_only_and_non_finite() {
        let mut summary = BenchmarkStats::from_mean(7.0);
        summary.data.clear();
        assert_eq!(summary.normalized(3), Some(BenchmarkStats::from_mean(7.0)));

        summary.mean = f64::NAN;
        assert_eq!(summary.normalized(3), None);

        let mut broken = BenchmarkStats::from_mean(7.0);
        broken.data = vec![1.0, f64::INFINITY];
        assert_eq!(broken.normalized(3), None);
    }

    #[test]
    fn test_from_mean() {
        let stats = BenchmarkStats::from_mean(42.0);
        assert_eq!(stats.mean, 42.0);
        assert_eq!(stats.iterations, 1);
    }
}
