//! Materialized rolling distributions per (commit, series)
//!
//! A snapshot answers "what did this series look like as of this commit"
//! without recomputing the window. Snapshots are derived data: [`rebuild`]
//! drops and recomputes all of them from observations and commits.
//!
//! [`rebuild`]: DistributionCache::rebuild

use crate::ancestry::{Ancestry, CommitAncestryResolver};
use crate::error::Result;
use crate::model::{DistributionSnapshot, Observation, SnapshotKey, TimeSeriesKey};
use crate::regression::RollingDistributionEngine;
use crate::series::lineage_points;
use crate::store::Store;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Counts from one [`DistributionCache::rebuild`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub cleared: usize,
    pub written: usize,
    /// Pairs without usable data or with unresolvable ancestry
    pub skipped: usize,
}

/// Snapshot service over a [`Store`]
pub struct DistributionCache<'a, S: Store + ?Sized> {
    store: &'a S,
}

impl<'a, S: Store + ?Sized> DistributionCache<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn lookup(&self, key: &SnapshotKey) -> Result<Option<DistributionSnapshot>> {
        self.store.get_snapshot(key)
    }

    /// Recompute and store the snapshot for `key` as of `commit_sha`
    ///
    /// Returns `None` (and writes nothing) when the commit's ancestry cannot
    /// be resolved or holds no usable observations.
    pub fn upsert(
        &self,
        commit_sha: &str,
        key: &TimeSeriesKey,
        window_limit: usize,
    ) -> Result<Option<DistributionSnapshot>> {
        let resolver = CommitAncestryResolver::new(self.store);
        let ancestry = match resolver.ancestry_of(commit_sha, &key.repository) {
            Ok(ancestry) => ancestry,
            Err(e) if e.is_ancestry_unavailable() => {
                tracing::debug!("no snapshot for {} at {}: {}", key, commit_sha, e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        self.upsert_with_ancestry(&ancestry, key, window_limit)
    }

    /// Like [`upsert`](Self::upsert) with an already-resolved ancestry
    pub fn upsert_with_ancestry(
        &self,
        ancestry: &Ancestry,
        key: &TimeSeriesKey,
        window_limit: usize,
    ) -> Result<Option<DistributionSnapshot>> {
        let observations = self.store.find_observations_for_key(key)?;
        let Some(snapshot) = snapshot_for(ancestry, key, &observations, window_limit) else {
            return Ok(None);
        };
        self.store.upsert_snapshot(&snapshot)?;
        Ok(Some(snapshot))
    }

    /// Drop every snapshot and recompute one per (commit, series) with data
    ///
    /// Concurrent readers may see missing or stale rows until this returns.
    pub fn rebuild(&self, window_limit: usize) -> Result<RebuildSummary> {
        let mut summary = RebuildSummary {
            cleared: self.store.clear_snapshots()?,
            ..RebuildSummary::default()
        };

        let resolver = CommitAncestryResolver::new(self.store);
        let mut ancestries: HashMap<(String, String), Option<Ancestry>> = HashMap::new();

        for key in self.store.series_keys()? {
            let observations = self.store.find_observations_for_key(&key)?;
            let commits: BTreeSet<&str> = observations
                .iter()
                .filter_map(|o| o.commit_sha.as_deref())
                .collect();

            for sha in commits {
                let cache_key = (sha.to_string(), key.repository.clone());
                if !ancestries.contains_key(&cache_key) {
                    let resolved = match resolver.ancestry_of(sha, &key.repository) {
                        Ok(ancestry) => Some(ancestry),
                        Err(e) if e.is_ancestry_unavailable() => {
                            tracing::debug!("skipping {} during rebuild: {}", sha, e);
                            None
                        }
                        Err(e) => return Err(e),
                    };
                    ancestries.insert(cache_key.clone(), resolved);
                }

                let snapshot = ancestries
                    .get(&cache_key)
                    .and_then(Option::as_ref)
                    .and_then(|ancestry| snapshot_for(ancestry, &key, &observations, window_limit));
                match snapshot {
                    Some(snapshot) => {
                        self.store.upsert_snapshot(&snapshot)?;
                        summary.written += 1;
                    }
                    None => summary.skipped += 1,
                }
            }
        }

        tracing::info!(
            "rebuilt distribution cache: {} cleared, {} written, {} skipped",
            summary.cleared,
            summary.written,
            summary.skipped
        );
        Ok(summary)
    }
}

/// Rolling distribution at the last point of the lineage
fn snapshot_for(
    ancestry: &Ancestry,
    key: &TimeSeriesKey,
    observations: &[Observation],
    window_limit: usize,
) -> Option<DistributionSnapshot> {
    let series = RollingDistributionEngine::new(window_limit).compute(lineage_points(observations, ancestry));
    let last = series.len().checked_sub(1)?;
    let stats = series.stats()[last];
    let window = series.incl_window(last);
    let points = &series.points()[window.clone()];

    Some(DistributionSnapshot {
        commit_sha: ancestry.head().to_string(),
        case_id: key.case_id.clone(),
        context_id: key.context_id.clone(),
        hardware_fingerprint: key.hardware_fingerprint.clone(),
        mean_of_means: stats.rolling_mean_incl,
        stddev_of_means: stats.rolling_stddev,
        first_timestamp: points.first()?.order_key.timestamp,
        last_timestamp: points.last()?.order_key.timestamp,
        observation_count: window.len(),
        window_limit: series.window(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Commit, ResultOutcome};
    use crate::stats::BenchmarkStats;
    use crate::store::{contract, CommitStore, MemoryStore, ObservationStore};

    fn key() -> TimeSeriesKey {
        TimeSeriesKey::new("case", "ctx", "hw", "repo")
    }

    fn seeded(values: &[f64]) -> MemoryStore {
        let store = MemoryStore::new();
        for (i, &value) in values.iter().enumerate() {
            let sha = format!("d{}", i + 1);
            let ts = (i as i64 + 1) * 10;
            store
                .upsert_commit(&contract::commit(&sha, &sha, "main", ts))
                .unwrap();
            let outcome = ResultOutcome::Success {
                stats: BenchmarkStats::from_mean(value),
            };
            store
                .upsert_observation(&Observation::new(format!("o{i}"), &key(), Some(sha.as_str()), ts, "s", outcome))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_upsert_evaluates_last_point() {
        let store = seeded(&[2.0, 3.0, 4.0]);
        let cache = DistributionCache::new(&store);

        let snapshot = cache.upsert("d3", &key(), 2).unwrap().unwrap();
        assert_eq!(snapshot.mean_of_means, 3.5);
        assert_eq!(snapshot.observation_count, 2);
        assert_eq!(snapshot.first_timestamp, 20);
        assert_eq!(snapshot.last_timestamp, 30);
        assert_eq!(snapshot.window_limit, 2);
        assert!(snapshot.stddev_of_means.is_some());

        let stored = cache.lookup(&key().snapshot_key("d3")).unwrap();
        assert_eq!(stored, Some(snapshot));
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = seeded(&[2.0, 3.0, 4.0]);
        let cache = DistributionCache::new(&store);
        let first = cache.upsert("d2", &key(), 100).unwrap();
        let second = cache.upsert("d2", &key(), 100).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.unwrap().observation_count, 2);
    }

    #[test]
    fn test_upsert_unavailable_ancestry() {
        let store = seeded(&[2.0]);
        store.upsert_commit(&Commit::unknown("ghost", "repo")).unwrap();
        let cache = DistributionCache::new(&store);
        assert_eq!(cache.upsert("ghost", &key(), 100).unwrap(), None);
        assert_eq!(cache.upsert("missing", &key(), 100).unwrap(), None);
    }

    #[test]
    fn test_rebuild_recomputes_everything() {
        let store = seeded(&[2.0, 3.0, 4.0]);
        let cache = DistributionCache::new(&store);
        cache.upsert("d3", &key(), 1).unwrap();

        let summary = cache.rebuild(100).unwrap();
        assert_eq!(summary.cleared, 1);
        assert_eq!(summary.written, 3);
        assert_eq!(summary.skipped, 0);

        let d3 = cache.lookup(&key().snapshot_key("d3")).unwrap().unwrap();
        assert_eq!(d3.window_limit, 100);
        assert_eq!(d3.mean_of_means, 3.0);
    }
}
