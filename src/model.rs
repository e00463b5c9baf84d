//! Plain data records for commits, observations and cached distributions
//!
//! Everything here is a value type. Relationships (commit → fork point,
//! observation → commit) are resolved through the store traits in
//! [`crate::store`], never by attribute access.

use crate::stats::BenchmarkStats;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// A commit with the lineage metadata needed for ancestry resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub repository: String,
    #[serde(default)]
    pub parent_sha: Option<String>,
    /// Where this commit's branch left the default branch. Equals `sha` for
    /// default-branch commits.
    #[serde(default)]
    pub fork_point_sha: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    /// `None` for placeholders whose provenance could not be resolved
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_login: Option<String>,
}

impl Commit {
    /// Placeholder for a commit whose metadata could not be fetched
    pub fn unknown(sha: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            repository: repository.into(),
            parent_sha: None,
            fork_point_sha: None,
            branch: None,
            timestamp: None,
            message: None,
            author_name: None,
            author_login: None,
        }
    }

    /// Sentinel for results submitted without any commit information
    pub fn no_context() -> Self {
        Self::unknown("", "")
    }

    pub fn is_no_context(&self) -> bool {
        self.sha.is_empty() && self.repository.is_empty()
    }

    pub fn is_on_default_branch(&self) -> bool {
        self.fork_point_sha.as_deref() == Some(self.sha.as_str())
    }
}

/// Identifies one logical benchmark history
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSeriesKey {
    pub case_id: String,
    pub context_id: String,
    pub hardware_fingerprint: String,
    pub repository: String,
}

impl TimeSeriesKey {
    pub fn new(
        case_id: impl Into<String>,
        context_id: impl Into<String>,
        hardware_fingerprint: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            context_id: context_id.into(),
            hardware_fingerprint: hardware_fingerprint.into(),
            repository: repository.into(),
        }
    }

    /// Cache key for this series as of `commit_sha`
    pub fn snapshot_key(&self, commit_sha: &str) -> SnapshotKey {
        SnapshotKey {
            commit_sha: commit_sha.to_string(),
            case_id: self.case_id.clone(),
            context_id: self.context_id.clone(),
            hardware_fingerprint: self.hardware_fingerprint.clone(),
        }
    }
}

impl fmt::Display for TimeSeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.case_id, self.context_id, self.hardware_fingerprint, self.repository
        )
    }
}

/// Whether larger values of a unit are good or bad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricDirection {
    LowerIsBetter,
    HigherIsBetter,
}

impl MetricDirection {
    /// Classify a unit string. Rates (anything per second) are
    /// higher-is-better; durations, sizes and counts are lower-is-better.
    pub fn from_unit(unit: &str) -> Self {
        let unit = unit.trim().to_ascii_lowercase();
        let is_rate = unit.ends_with("/s")
            || unit.ends_with("/sec")
            || unit.ends_with("/second")
            || unit.ends_with("per_second")
            || unit.ends_with("per second")
            || matches!(unit.as_str(), "ops" | "iops" | "fps");

        if is_rate {
            Self::HigherIsBetter
        } else {
            Self::LowerIsBetter
        }
    }
}

/// What a benchmark run produced for one case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultOutcome {
    Success { stats: BenchmarkStats },
    Error { message: String },
    /// Some iterations finished before the benchmark failed
    PartialError {
        partial_data: Vec<f64>,
        message: String,
    },
}

impl ResultOutcome {
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Success { .. })
    }

    pub fn stats(&self) -> Option<&BenchmarkStats> {
        match self {
            Self::Success { stats } => Some(stats),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { message } | Self::PartialError { message, .. } => Some(message),
        }
    }
}

/// One benchmark result as recorded by the ingestion layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    #[serde(default)]
    pub run_id: String,
    pub case_id: String,
    pub context_id: String,
    pub hardware_fingerprint: String,
    pub repository: String,
    #[serde(default)]
    pub commit_sha: Option<String>,
    pub timestamp: Timestamp,
    pub unit: String,
    pub outcome: ResultOutcome,
    #[serde(default)]
    pub begins_distribution_change: bool,
}

impl Observation {
    /// A result for `key` with an empty run id
    pub fn new(
        id: impl Into<String>,
        key: &TimeSeriesKey,
        commit_sha: Option<&str>,
        timestamp: Timestamp,
        unit: impl Into<String>,
        outcome: ResultOutcome,
    ) -> Self {
        Self {
            id: id.into(),
            run_id: String::new(),
            case_id: key.case_id.clone(),
            context_id: key.context_id.clone(),
            hardware_fingerprint: key.hardware_fingerprint.clone(),
            repository: key.repository.clone(),
            commit_sha: commit_sha.map(str::to_string),
            timestamp,
            unit: unit.into(),
            outcome,
            begins_distribution_change: false,
        }
    }

    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_distribution_change(mut self) -> Self {
        self.begins_distribution_change = true;
        self
    }

    /// The commit this result was measured on, as a placeholder to resolve
    /// through the store; [`Commit::no_context`] when none was submitted
    pub fn commit_ref(&self) -> Commit {
        match &self.commit_sha {
            Some(sha) => Commit::unknown(sha.as_str(), self.repository.as_str()),
            None => Commit::no_context(),
        }
    }

    pub fn key(&self) -> TimeSeriesKey {
        TimeSeriesKey::new(
            &self.case_id,
            &self.context_id,
            &self.hardware_fingerprint,
            &self.repository,
        )
    }

    /// Single value summary: the sample mean of a successful result
    pub fn svs(&self) -> Option<f64> {
        self.outcome.stats().map(|stats| stats.mean)
    }

    pub fn direction(&self) -> MetricDirection {
        MetricDirection::from_unit(&self.unit)
    }
}

/// Cache key: the distribution of one series as of one commit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub commit_sha: String,
    pub case_id: String,
    pub context_id: String,
    pub hardware_fingerprint: String,
}

/// Materialized rolling baseline for one [`SnapshotKey`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSnapshot {
    pub commit_sha: String,
    pub case_id: String,
    pub context_id: String,
    pub hardware_fingerprint: String,
    pub mean_of_means: f64,
    pub stddev_of_means: Option<f64>,
    pub first_timestamp: Timestamp,
    pub last_timestamp: Timestamp,
    pub observation_count: usize,
    pub window_limit: usize,
}

impl DistributionSnapshot {
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey {
            commit_sha: self.commit_sha.clone(),
            case_id: self.case_id.clone(),
            context_id: self.context_id.clone(),
            hardware_fingerprint: self.hardware_fingerprint.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_branch_commit() {
        let mut commit = Commit::unknown("aaa", "github.com/org/repo");
        assert!(!commit.is_on_default_branch());
        commit.fork_point_sha = Some("aaa".into());
        assert!(commit.is_on_default_branch());
        commit.fork_point_sha = Some("bbb".into());
        assert!(!commit.is_on_default_branch());
    }

    #[test]
    fn test_placeholder_commits() {
        assert_eq!(Commit::unknown("aaa", "repo").timestamp, None);
        assert!(!Commit::unknown("aaa", "repo").is_no_context());
        assert!(Commit::no_context().is_no_context());

        let stats = BenchmarkStats::from_mean(1.0);
        let key = TimeSeriesKey::new("case", "ctx", "hw", "repo");
        let outcome = ResultOutcome::Success { stats };
        let with_commit = Observation::new("o1", &key, Some("aaa"), 10, "s", outcome);
        let commit = with_commit.commit_ref();
        assert_eq!((commit.sha.as_str(), commit.repository.as_str()), ("aaa", "repo"));

        let mut without = with_commit.clone();
        without.commit_sha = None;
        assert!(without.commit_ref().is_no_context());
    }

    #[test]
    fn test_metric_direction_from_unit() {
        assert_eq!(
            MetricDirection::from_unit("items/second"),
            MetricDirection::HigherIsBetter
        );
        assert_eq!(MetricDirection::from_unit("B/s"), MetricDirection::HigherIsBetter);
        assert_eq!(MetricDirection::from_unit("i/s"), MetricDirection::HigherIsBetter);
        assert_eq!(
            MetricDirection::from_unit("requests_per_second"),
            MetricDirection::HigherIsBetter
        );
        assert_eq!(MetricDirection::from_unit("ops"), MetricDirection::HigherIsBetter);
        assert_eq!(MetricDirection::from_unit("s"), MetricDirection::LowerIsBetter);
        assert_eq!(MetricDirection::from_unit("seconds"), MetricDirection::LowerIsBetter);
        assert_eq!(MetricDirection::from_unit("ns"), MetricDirection::LowerIsBetter);
        assert_eq!(MetricDirection::from_unit("B"), MetricDirection::LowerIsBetter);
    }

    #[test]
    fn test_outcome_serde_tagging() {
        let outcome = ResultOutcome::Error {
            message: "segfault".into(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"kind":"error","message":"segfault"}"#);

        let back: ResultOutcome = serde_json::from_str(&json).unwrap();
        assert!(back.is_error());
        assert_eq!(back.error_message(), Some("segfault"));
    }

    #[test]
    fn test_errored_observation_has_no_svs() {
        let key = TimeSeriesKey::new("case", "ctx", "hw", "repo");
        let obs = Observation::new(
            "r1",
            &key,
            Some("aaa"),
            10,
            "s",
            ResultOutcome::PartialError {
                partial_data: vec![1.0, 2.0],
                message: "timeout".into(),
            },
        );
        assert_eq!(obs.svs(), None);
        assert_eq!(obs.key(), key);
    }
}
