//! In-memory store
//!
//! Each table is a map behind its own `RwLock`, so snapshot upserts for one
//! key never block history reads of another table.

use super::{CommitStore, ObservationStore, SnapshotStore};
use crate::error::{Result, TrendError};
use crate::model::{Commit, DistributionSnapshot, Observation, SnapshotKey, TimeSeriesKey, Timestamp};
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// `HashMap`-backed store; cheap to create per test
#[derive(Debug, Default)]
pub struct MemoryStore {
    commits: RwLock<HashMap<(String, String), Commit>>,
    observations: RwLock<HashMap<String, Observation>>,
    snapshots: RwLock<HashMap<SnapshotKey, DistributionSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<'a, T>(lock: &'a RwLock<T>, table: &'static str) -> Result<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| TrendError::LockPoisoned(table))
}

fn write<'a, T>(lock: &'a RwLock<T>, table: &'static str) -> Result<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| TrendError::LockPoisoned(table))
}

impl CommitStore for MemoryStore {
    fn find_commit(&self, sha: &str, repository: &str) -> Result<Option<Commit>> {
        let commits = read(&self.commits, "commits")?;
        Ok(commits
            .get(&(sha.to_string(), repository.to_string()))
            .cloned())
    }

    fn default_branch_commits(
        &self,
        repository: &str,
        until: Option<Timestamp>,
    ) -> Result<Vec<Commit>> {
        let commits = read(&self.commits, "commits")?;
        Ok(commits
            .values()
            .filter(|c| c.repository == repository && c.is_on_default_branch())
            .filter(|c| match (c.timestamp, until) {
                (Some(ts), Some(until)) => ts <= until,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .cloned()
            .collect())
    }

    fn branch_commits(
        &self,
        repository: &str,
        branch: &str,
        fork_point_sha: &str,
        until: Timestamp,
    ) -> Result<Vec<Commit>> {
        let commits = read(&self.commits, "commits")?;
        Ok(commits
            .values()
            .filter(|c| {
                c.repository == repository
                    && c.branch.as_deref() == Some(branch)
                    && c.fork_point_sha.as_deref() == Some(fork_point_sha)
                    && c.timestamp.is_some_and(|ts| ts <= until)
            })
            .cloned()
            .collect())
    }

    fn upsert_commit(&self, commit: &Commit) -> Result<()> {
        let mut commits = write(&self.commits, "commits")?;
        commits.insert(
            (commit.sha.clone(), commit.repository.clone()),
            commit.clone(),
        );
        Ok(())
    }
}

impl ObservationStore for MemoryStore {
    fn upsert_observation(&self, observation: &Observation) -> Result<()> {
        let mut observations = write(&self.observations, "observations")?;
        observations.insert(observation.id.clone(), observation.clone());
        Ok(())
    }

    fn find_observations_for_key(&self, key: &TimeSeriesKey) -> Result<Vec<Observation>> {
        let observations = read(&self.observations, "observations")?;
        let mut found: Vec<Observation> = observations
            .values()
            .filter(|o| {
                o.case_id == key.case_id
                    && o.context_id == key.context_id
                    && o.hardware_fingerprint == key.hardware_fingerprint
                    && o.repository == key.repository
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    fn find_observations_for_run(&self, run_id: &str) -> Result<Vec<Observation>> {
        let observations = read(&self.observations, "observations")?;
        let mut found: Vec<Observation> = observations
            .values()
            .filter(|o| o.run_id == run_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    fn series_keys(&self) -> Result<Vec<TimeSeriesKey>> {
        let observations = read(&self.observations, "observations")?;
        let keys: BTreeSet<TimeSeriesKey> = observations.values().map(Observation::key).collect();
        Ok(keys.into_iter().collect())
    }
}

impl SnapshotStore for MemoryStore {
    fn upsert_snapshot(&self, snapshot: &DistributionSnapshot) -> Result<()> {
        let mut snapshots = write(&self.snapshots, "distribution_snapshots")?;
        snapshots.insert(snapshot.key(), snapshot.clone());
        Ok(())
    }

    fn get_snapshot(&self, key: &SnapshotKey) -> Result<Option<DistributionSnapshot>> {
        let snapshots = read(&self.snapshots, "distribution_snapshots")?;
        Ok(snapshots.get(key).cloned())
    }

    fn clear_snapshots(&self) -> Result<usize> {
        let mut snapshots = write(&self.snapshots, "distribution_snapshots")?;
        let removed = snapshots.len();
        snapshots.clear();
        Ok(removed)
    }
}
