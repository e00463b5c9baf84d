//! Storage seams for commits, observations and distribution snapshots
//!
//! The engine reads and writes plain values through three traits. Any backend
//! with an atomic insert-or-replace can implement them; two ship here:
//!
//! - [`MemoryStore`]: `RwLock`-guarded maps, for tests and embedding
//! - [`SqliteStore`]: a single SQLite file using `INSERT ... ON CONFLICT DO UPDATE`
//!
//! Observations and commits are the source of truth. Snapshots are derived
//! and may be dropped and rebuilt at any time.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::model::{Commit, DistributionSnapshot, Observation, SnapshotKey, TimeSeriesKey, Timestamp};

/// Read/write access to commits
pub trait CommitStore {
    fn find_commit(&self, sha: &str, repository: &str) -> Result<Option<Commit>>;

    /// Default-branch commits (`sha == fork_point_sha`) with a timestamp,
    /// optionally bounded above by `until` (inclusive)
    fn default_branch_commits(
        &self,
        repository: &str,
        until: Option<Timestamp>,
    ) -> Result<Vec<Commit>>;

    /// Commits on `branch` that forked at `fork_point_sha`, with a timestamp
    /// no later than `until`
    fn branch_commits(
        &self,
        repository: &str,
        branch: &str,
        fork_point_sha: &str,
        until: Timestamp,
    ) -> Result<Vec<Commit>>;

    /// Insert or replace by `(sha, repository)`
    fn upsert_commit(&self, commit: &Commit) -> Result<()>;
}

/// Read/write access to benchmark results
pub trait ObservationStore {
    /// Insert or replace by `id`
    fn upsert_observation(&self, observation: &Observation) -> Result<()>;

    fn find_observations_for_key(&self, key: &TimeSeriesKey) -> Result<Vec<Observation>>;

    fn find_observations_for_run(&self, run_id: &str) -> Result<Vec<Observation>>;

    /// Every series with at least one observation
    fn series_keys(&self) -> Result<Vec<TimeSeriesKey>>;
}

/// Read/write access to the materialized distribution cache
pub trait SnapshotStore {
    /// Atomic insert-or-replace keyed by [`SnapshotKey`]
    fn upsert_snapshot(&self, snapshot: &DistributionSnapshot) -> Result<()>;

    fn get_snapshot(&self, key: &SnapshotKey) -> Result<Option<DistributionSnapshot>>;

    /// Drop every snapshot, returning how many were removed
    fn clear_snapshots(&self) -> Result<usize>;
}

/// Everything the recorder needs from a backend
pub trait Store: CommitStore + ObservationStore + SnapshotStore + Send + Sync {}

impl<T> Store for T where T: CommitStore + ObservationStore + SnapshotStore + Send + Sync {}
