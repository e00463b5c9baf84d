// Pairwise comparison of two benchmark runs
//
// Results are paired by (case_id, context_id). Each pair carries two
// independent signals: the percent change between the pair's means, and the
// contender's precomputed z-score against its own rolling baseline.

use crate::model::MetricDirection;
use crate::regression::config::RegressionConfig;
use crate::regression::zscore::{ScoredResult, ZScoreCalculator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One baseline/contender pair; either side may be missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultComparison {
    pub baseline_id: Option<String>,
    pub contender_id: Option<String>,
    pub case_id: String,
    pub context_id: String,
    pub unit: String,
    pub baseline_value: Option<f64>,
    pub contender_value: Option<f64>,
    /// Direction-adjusted percent (5.0 = 5% better)
    pub percent_change: f64,
    pub percent_regression_indicated: bool,
    pub percent_improvement_indicated: bool,
    pub z_score: Option<f64>,
    pub z_regression_indicated: bool,
    pub z_improvement_indicated: bool,
}

impl ResultComparison {
    pub fn is_regression(&self) -> bool {
        self.percent_regression_indicated || self.z_regression_indicated
    }

    pub fn is_improvement(&self) -> bool {
        self.percent_improvement_indicated || self.z_improvement_indicated
    }
}

/// All pairs of a run comparison, ordered by `(case_id, context_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub comparisons: Vec<ResultComparison>,
    pub threshold_percent: f64,
    pub threshold_z: f64,
}

impl ComparisonReport {
    pub fn regressions(&self) -> impl Iterator<Item = &ResultComparison> {
        self.comparisons.iter().filter(|c| c.is_regression())
    }

    pub fn improvements(&self) -> impl Iterator<Item = &ResultComparison> {
        self.comparisons.iter().filter(|c| c.is_improvement())
    }

    pub fn has_regression(&self) -> bool {
        self.regressions().next().is_some()
    }

    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();

        let regressions = self.regressions().count();
        if regressions == 0 {
            report.push_str("✅ NO REGRESSION DETECTED\n\n");
        } else {
            report.push_str(&format!("❌ REGRESSION DETECTED ({} results)\n\n", regressions));
        }
        report.push_str(&format!("Results compared: {}\n", self.comparisons.len()));
        report.push_str(&format!(
            "Thresholds: {}% change, |z| > {}\n",
            self.threshold_percent, self.threshold_z
        ));

        let improvements = self.improvements().count();
        if improvements > 0 {
            report.push_str(&format!("Improvements: {}\n", improvements));
        }

        if !self.comparisons.is_empty() {
            report.push_str("\n📊 Comparisons:\n");
            for c in &self.comparisons {
                let marker = if c.is_regression() {
                    "❌"
                } else if c.is_improvement() {
                    "🚀"
                } else {
                    "  "
                };
                report.push_str(&format!(
                    "{} {} [{}] baseline={} contender={} change={:+.2}% z={} ({})\n",
                    marker,
                    c.case_id,
                    c.context_id,
                    fmt_value(c.baseline_value),
                    fmt_value(c.contender_value),
                    c.percent_change,
                    c.z_score.map_or_else(|| "n/a".to_string(), |z| format!("{:+.3}", z)),
                    c.unit
                ));
            }
        }

        report
    }
}

fn fmt_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v))
}

/// Classifies pairs with the configured thresholds
#[derive(Debug, Clone, Copy)]
pub struct ResultComparator {
    threshold_percent: f64,
    zscore: ZScoreCalculator,
}

impl Default for ResultComparator {
    fn default() -> Self {
        Self::new(&RegressionConfig::default())
    }
}

impl ResultComparator {
    pub fn new(config: &RegressionConfig) -> Self {
        Self {
            threshold_percent: config.threshold_percent,
            zscore: ZScoreCalculator::from_config(config),
        }
    }

    /// Compare a contender against a baseline result
    ///
    /// # Example
    /// ```
    /// use benchtrend::model::{Observation, ResultOutcome, TimeSeriesKey};
    /// use benchtrend::regression::{ResultComparator, ScoredResult};
    /// use benchtrend::stats::BenchmarkStats;
    ///
    /// let key = TimeSeriesKey::new("case", "ctx", "hw", "repo");
    /// let run = |id: &str, mean: f64| {
    ///     let outcome = ResultOutcome::Success { stats: BenchmarkStats::from_mean(mean) };
    ///     ScoredResult::unscored(Observation::new(id, &key, None, 0, "seconds", outcome))
    /// };
    ///
    /// let cmp = ResultComparator::default().compare(Some(&run("a", 10.0)), Some(&run("b", 11.0)));
    /// assert!((cmp.percent_change + 10.0).abs() < 1e-9);
    /// assert!(cmp.percent_regression_indicated);
    /// ```
    pub fn compare(
        &self,
        baseline: Option<&ScoredResult>,
        contender: Option<&ScoredResult>,
    ) -> ResultComparison {
        let identity = contender.or(baseline).map(|r| &r.observation);
        let (case_id, context_id, unit) = identity
            .map(|o| (o.case_id.clone(), o.context_id.clone(), o.unit.clone()))
            .unwrap_or_default();

        let baseline_value = baseline.and_then(|r| r.observation.svs());
        let contender_value = contender.and_then(|r| r.observation.svs());
        let direction = MetricDirection::from_unit(&unit);

        let percent_change = match (baseline_value, contender_value) {
            (Some(b), Some(c)) => percent_change(b, c, direction),
            _ => 0.0,
        };

        let z_score = contender.and_then(|r| r.z_score);

        ResultComparison {
            baseline_id: baseline.map(|r| r.observation.id.clone()),
            contender_id: contender.map(|r| r.observation.id.clone()),
            case_id,
            context_id,
            unit,
            baseline_value,
            contender_value,
            percent_change,
            percent_regression_indicated: -percent_change > self.threshold_percent,
            percent_improvement_indicated: percent_change > self.threshold_percent,
            z_score,
            z_regression_indicated: z_score.is_some_and(|z| self.zscore.is_regression(z)),
            z_improvement_indicated: z_score.is_some_and(|z| self.zscore.is_improvement(z)),
        }
    }

    /// Pair two runs by `(case_id, context_id)`
    ///
    /// Unmatched results produce one-sided comparisons. When a run holds the
    /// same pairing key twice, the later result wins.
    pub fn compare_lists(
        &self,
        baseline: &[ScoredResult],
        contender: &[ScoredResult],
    ) -> ComparisonReport {
        type Pair<'a> = (Option<&'a ScoredResult>, Option<&'a ScoredResult>);
        let mut pairs: BTreeMap<(&str, &str), Pair<'_>> = BTreeMap::new();

        for result in baseline {
            let o = &result.observation;
            pairs.entry((o.case_id.as_str(), o.context_id.as_str())).or_default().0 = Some(result);
        }
        for result in contender {
            let o = &result.observation;
            pairs.entry((o.case_id.as_str(), o.context_id.as_str())).or_default().1 = Some(result);
        }

        let comparisons: Vec<ResultComparison> = pairs
            .into_values()
            .map(|(b, c)| self.compare(b, c))
            .collect();

        tracing::debug!(
            "compared {} baseline and {} contender results into {} pairs",
            baseline.len(),
            contender.len(),
            comparisons.len()
        );

        ComparisonReport {
            comparisons,
            threshold_percent: self.threshold_percent,
            threshold_z: self.zscore.threshold_z(),
        }
    }
}

/// Direction-adjusted percent change; 0 when either side is 0
fn percent_change(baseline: f64, contender: f64, direction: MetricDirection) -> f64 {
    if baseline == 0.0 || contender == 0.0 {
        return 0.0;
    }
    let raw = 100.0 * (contender - baseline) / baseline.abs();
    if !raw.is_finite() {
        return 0.0;
    }
    match direction {
        MetricDirection::HigherIsBetter => raw,
        MetricDirection::LowerIsBetter if raw == 0.0 => 0.0,
        MetricDirection::LowerIsBetter => -raw,
    }
}
