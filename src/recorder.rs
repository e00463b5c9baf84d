//! Recording and querying benchmark results
//!
//! [`ResultRecorder`] is the entry point for ingestion and queries. Every call
//! recomputes what it needs from the store; nothing is kept between calls.
//!
//! Recording never fails because of missing commit metadata: a result whose
//! ancestry cannot be resolved is stored unscored and a warning is logged.
//! Successful results are stored with their summary recomputed from the raw
//! samples under `min_aggregate_samples`.

use crate::ancestry::{Ancestry, CommitAncestryResolver};
use crate::cache::DistributionCache;
use crate::error::{Result, TrendError};
use crate::model::{Commit, Observation, ResultOutcome, TimeSeriesKey, Timestamp};
use crate::regression::{
    Baseline, RegressionConfig, RollingDistributionEngine, RollingSeries, ScoredResult,
    ZScoreCalculator,
};
use crate::series::{default_branch_points, lineage_points};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// One default-branch result with its rolling columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub observation_id: String,
    pub commit_sha: String,
    pub commit_timestamp: Timestamp,
    pub timestamp: Timestamp,
    pub value: f64,
    pub unit: String,
    pub begins_distribution_change: bool,
    pub rank: usize,
    pub segment_id: u32,
    pub rolling_mean_excl: f64,
    pub rolling_mean_incl: f64,
    pub residual: f64,
    pub rolling_stddev: Option<f64>,
}

/// Baseline and z-score of one result of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunBaseline {
    pub observation_id: String,
    pub key: TimeSeriesKey,
    pub commit_sha: Option<String>,
    pub baseline: Option<Baseline>,
    pub z_score: Option<f64>,
}

impl From<&ScoredResult> for RunBaseline {
    fn from(scored: &ScoredResult) -> Self {
        Self {
            observation_id: scored.observation.id.clone(),
            key: scored.observation.key(),
            commit_sha: scored.observation.commit_sha.clone(),
            baseline: scored.baseline,
            z_score: scored.z_score,
        }
    }
}

/// Ingestion and query service over a [`Store`]
pub struct ResultRecorder<S: Store> {
    store: S,
    config: RegressionConfig,
}

impl<S: Store> ResultRecorder<S> {
    /// # Errors
    /// `Config` when the thresholds are out of range.
    pub fn new(store: S, config: RegressionConfig) -> Result<Self> {
        config.validate().map_err(TrendError::Config)?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    pub fn cache(&self) -> DistributionCache<'_, S> {
        DistributionCache::new(&self.store)
    }

    fn engine(&self) -> RollingDistributionEngine {
        RollingDistributionEngine::new(self.config.window_size)
    }

    /// Insert or replace commit metadata
    pub fn import_commits(&self, commits: &[Commit]) -> Result<usize> {
        for commit in commits {
            self.store.upsert_commit(commit)?;
        }
        tracing::debug!("imported {} commits", commits.len());
        Ok(commits.len())
    }

    /// Store a result, score it against its lineage, refresh the cache
    ///
    /// Replaying an observation with the same id replaces it and yields the
    /// same score.
    pub fn record_observation(&self, observation: Observation) -> Result<ScoredResult> {
        let observation = self.normalize(observation);
        self.store.upsert_observation(&observation)?;

        let commit = observation.commit_ref();
        if commit.is_no_context() {
            tracing::info!("recorded {} without commit context", observation.id);
            return Ok(ScoredResult::unscored(observation));
        }
        let sha = commit.sha;

        let Some(ancestry) = self.resolve(&sha, &observation.repository)? else {
            return Ok(ScoredResult::unscored(observation));
        };

        let key = observation.key();
        let series = self.lineage_series(&ancestry, &key)?;
        let scored = score(&series, &ancestry, observation);

        self.cache()
            .upsert_with_ancestry(&ancestry, &key, self.config.window_size)?;

        match scored.z_score {
            Some(z) => tracing::info!("recorded {} on {} (z = {:.3})", scored.observation.id, sha, z),
            None => tracing::info!("recorded {} on {} (unscored)", scored.observation.id, sha),
        }
        Ok(scored)
    }

    /// Non-errored default-branch results for `key`, in window order
    pub fn get_history(&self, key: &TimeSeriesKey) -> Result<Vec<HistoryRow>> {
        let commits = self.store.default_branch_commits(&key.repository, None)?;
        let observations = self.store.find_observations_for_key(key)?;
        let units: HashMap<&str, &str> = observations
            .iter()
            .map(|o| (o.id.as_str(), o.unit.as_str()))
            .collect();

        let series = self
            .engine()
            .compute(default_branch_points(&observations, &commits));

        Ok(series
            .iter()
            .map(|(point, stats)| HistoryRow {
                observation_id: point.id.clone(),
                commit_sha: point.commit_sha.clone(),
                commit_timestamp: point.order_key.timestamp,
                timestamp: point.timestamp,
                value: point.value,
                unit: units.get(point.id.as_str()).copied().unwrap_or_default().to_string(),
                begins_distribution_change: point.begins_distribution_change,
                rank: stats.rank,
                segment_id: stats.segment_id,
                rolling_mean_excl: stats.rolling_mean_excl,
                rolling_mean_incl: stats.rolling_mean_incl,
                residual: stats.residual,
                rolling_stddev: stats.rolling_stddev,
            })
            .collect())
    }

    /// Distribution of `key` strictly before `commit_sha` on its lineage
    ///
    /// `None` when the commit's ancestry cannot be resolved.
    pub fn get_baseline_for_commit(
        &self,
        commit_sha: &str,
        key: &TimeSeriesKey,
    ) -> Result<Option<Baseline>> {
        let Some(ancestry) = self.resolve(commit_sha, &key.repository)? else {
            return Ok(None);
        };
        let Some(order_key) = ancestry.head_order_key() else {
            return Ok(None);
        };
        let series = self.lineage_series(&ancestry, key)?;
        Ok(Some(series.baseline_before(&order_key)))
    }

    /// Baselines and z-scores for every result of a run
    pub fn baselines_for_run(&self, run_id: &str) -> Result<Vec<RunBaseline>> {
        Ok(self
            .scored_run(run_id)?
            .iter()
            .map(RunBaseline::from)
            .collect())
    }

    /// Every result of a run scored against its lineage
    ///
    /// Ancestry is resolved once per commit and the rolling series computed
    /// once per (commit, series).
    pub fn scored_run(&self, run_id: &str) -> Result<Vec<ScoredResult>> {
        let observations = self.store.find_observations_for_run(run_id)?;

        let mut ancestries: HashMap<(String, String), Option<Ancestry>> = HashMap::new();
        let mut series: HashMap<(String, TimeSeriesKey), RollingSeries> = HashMap::new();
        let mut scored = Vec::with_capacity(observations.len());

        for observation in observations {
            let commit = observation.commit_ref();
            if commit.is_no_context() {
                scored.push(ScoredResult::unscored(observation));
                continue;
            }
            let sha = commit.sha;

            let lineage = (sha.clone(), observation.repository.clone());
            if !ancestries.contains_key(&lineage) {
                let resolved = self.resolve(&sha, &observation.repository)?;
                ancestries.insert(lineage.clone(), resolved);
            }
            let Some(ancestry) = ancestries.get(&lineage).and_then(Option::as_ref) else {
                scored.push(ScoredResult::unscored(observation));
                continue;
            };

            let key = observation.key();
            let rolling = match series.entry((sha, key)) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    let computed = self.lineage_series(ancestry, &e.key().1)?;
                    e.insert(computed)
                }
            };
            scored.push(score(rolling, ancestry, observation));
        }

        tracing::debug!(
            "scored run {} ({} results, {} commits, {} series)",
            run_id,
            scored.len(),
            ancestries.len(),
            series.len()
        );
        Ok(scored)
    }

    /// Rebuild a successful outcome's summary from its samples
    ///
    /// Samples that cannot be summarized turn the result into an error so it
    /// never enters a distribution.
    fn normalize(&self, mut observation: Observation) -> Observation {
        if let ResultOutcome::Success { stats } = &observation.outcome {
            observation.outcome = match stats.normalized(self.config.min_aggregate_samples) {
                Some(stats) => ResultOutcome::Success { stats },
                None => {
                    tracing::warn!("{} has non-finite or empty samples", observation.id);
                    ResultOutcome::Error {
                        message: "non-finite or empty benchmark samples".to_string(),
                    }
                }
            };
        }
        observation
    }

    /// `Ok(None)` for unavailable ancestry, which is logged
    fn resolve(&self, sha: &str, repository: &str) -> Result<Option<Ancestry>> {
        match CommitAncestryResolver::new(&self.store).ancestry_of(sha, repository) {
            Ok(ancestry) => Ok(Some(ancestry)),
            Err(e) if e.is_ancestry_unavailable() => {
                tracing::warn!("{}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn lineage_series(&self, ancestry: &Ancestry, key: &TimeSeriesKey) -> Result<RollingSeries> {
        let observations = self.store.find_observations_for_key(key)?;
        Ok(self.engine().compute(lineage_points(&observations, ancestry)))
    }
}

/// Score `observation` within the series of its lineage
///
/// A result in the series is baselined on the ranks before its own; an
/// errored result gets the baseline before its commit but no score.
fn score(series: &RollingSeries, ancestry: &Ancestry, observation: Observation) -> ScoredResult {
    let baseline = match series.position_of(&observation.id) {
        Some(pos) => Some(series.baseline_at(pos)),
        None => ancestry
            .head_order_key()
            .map(|order_key| series.baseline_before(&order_key)),
    };

    let z_score = match (observation.svs(), baseline.as_ref()) {
        (Some(value), Some(baseline)) => {
            ZScoreCalculator::score_baseline(value, baseline, observation.direction())
        }
        _ => None,
    };

    ScoredResult {
        observation,
        baseline,
        z_score,
    }
}
