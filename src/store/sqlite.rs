//! SQLite-backed store
//!
//! One file holds three tables. Upserts use `INSERT ... ON CONFLICT DO
//! UPDATE`, which SQLite applies atomically, so two writers racing on the
//! same snapshot key leave exactly one row (last writer wins).

use super::{CommitStore, ObservationStore, SnapshotStore};
use crate::error::{Result, TrendError};
use crate::model::{Commit, DistributionSnapshot, Observation, SnapshotKey, TimeSeriesKey, Timestamp};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS commits (
  sha TEXT NOT NULL,
  repository TEXT NOT NULL,
  parent_sha TEXT,
  fork_point_sha TEXT,
  branch TEXT,
  timestamp INTEGER,
  message TEXT,
  author_name TEXT,
  author_login TEXT,
  PRIMARY KEY (sha, repository)
);

CREATE INDEX IF NOT EXISTS idx_commits_lineage
  ON commits (repository, branch, fork_point_sha, timestamp);

CREATE TABLE IF NOT EXISTS observations (
  id TEXT PRIMARY KEY,
  run_id TEXT NOT NULL,
  case_id TEXT NOT NULL,
  context_id TEXT NOT NULL,
  hardware_fingerprint TEXT NOT NULL,
  repository TEXT NOT NULL,
  commit_sha TEXT,
  timestamp INTEGER NOT NULL,
  unit TEXT NOT NULL,
  outcome_json TEXT NOT NULL,
  begins_distribution_change INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_observations_series
  ON observations (case_id, context_id, hardware_fingerprint, repository);

CREATE INDEX IF NOT EXISTS idx_observations_run
  ON observations (run_id);

CREATE TABLE IF NOT EXISTS distribution_snapshots (
  commit_sha TEXT NOT NULL,
  case_id TEXT NOT NULL,
  context_id TEXT NOT NULL,
  hardware_fingerprint TEXT NOT NULL,
  mean_of_means REAL NOT NULL,
  stddev_of_means REAL,
  first_timestamp INTEGER NOT NULL,
  last_timestamp INTEGER NOT NULL,
  observation_count INTEGER NOT NULL,
  window_limit INTEGER NOT NULL,
  PRIMARY KEY (commit_sha, case_id, context_id, hardware_fingerprint)
);
";

const COMMIT_COLUMNS: &str =
    "sha, repository, parent_sha, fork_point_sha, branch, timestamp, message, author_name, author_login";

const OBSERVATION_COLUMNS: &str = "id, run_id, case_id, context_id, hardware_fingerprint, \
     repository, commit_sha, timestamp, unit, outcome_json, begins_distribution_change";

/// Store backed by a single SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists
    ///
    /// Missing parent directories are created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;
        tracing::debug!("opened sqlite store at {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TrendError::LockPoisoned("sqlite connection"))
    }
}

fn parse_commit_row(row: &Row<'_>) -> rusqlite::Result<Commit> {
    Ok(Commit {
        sha: row.get(0)?,
        repository: row.get(1)?,
        parent_sha: row.get(2)?,
        fork_point_sha: row.get(3)?,
        branch: row.get(4)?,
        timestamp: row.get(5)?,
        message: row.get(6)?,
        author_name: row.get(7)?,
        author_login: row.get(8)?,
    })
}

fn parse_observation_row(row: &Row<'_>) -> rusqlite::Result<Observation> {
    let outcome_json: String = row.get(9)?;
    let outcome = serde_json::from_str(&outcome_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;

    Ok(Observation {
        id: row.get(0)?,
        run_id: row.get(1)?,
        case_id: row.get(2)?,
        context_id: row.get(3)?,
        hardware_fingerprint: row.get(4)?,
        repository: row.get(5)?,
        commit_sha: row.get(6)?,
        timestamp: row.get(7)?,
        unit: row.get(8)?,
        outcome,
        begins_distribution_change: row.get(10)?,
    })
}

fn parse_snapshot_row(row: &Row<'_>) -> rusqlite::Result<DistributionSnapshot> {
    let observation_count: i64 = row.get(8)?;
    let window_limit: i64 = row.get(9)?;
    Ok(DistributionSnapshot {
        commit_sha: row.get(0)?,
        case_id: row.get(1)?,
        context_id: row.get(2)?,
        hardware_fingerprint: row.get(3)?,
        mean_of_means: row.get(4)?,
        stddev_of_means: row.get(5)?,
        first_timestamp: row.get(6)?,
        last_timestamp: row.get(7)?,
        observation_count: usize::try_from(observation_count).unwrap_or_default(),
        window_limit: usize::try_from(window_limit).unwrap_or_default(),
    })
}

impl CommitStore for SqliteStore {
    fn find_commit(&self, sha: &str, repository: &str) -> Result<Option<Commit>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {COMMIT_COLUMNS} FROM commits WHERE sha = ?1 AND repository = ?2");
        let commit = conn
            .query_row(&sql, params![sha, repository], parse_commit_row)
            .optional()?;
        Ok(commit)
    }

    fn default_branch_commits(
        &self,
        repository: &str,
        until: Option<Timestamp>,
    ) -> Result<Vec<Commit>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {COMMIT_COLUMNS} FROM commits
             WHERE repository = ?1
               AND sha = fork_point_sha
               AND timestamp IS NOT NULL
               AND (?2 IS NULL OR timestamp <= ?2)
             ORDER BY timestamp, sha"
        );
        let mut stmt = conn.prepare(&sql)?;
        let commits = stmt
            .query_map(params![repository, until], parse_commit_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(commits)
    }

    fn branch_commits(
        &self,
        repository: &str,
        branch: &str,
        fork_point_sha: &str,
        until: Timestamp,
    ) -> Result<Vec<Commit>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {COMMIT_COLUMNS} FROM commits
             WHERE repository = ?1
               AND branch = ?2
               AND fork_point_sha = ?3
               AND timestamp IS NOT NULL
               AND timestamp <= ?4
             ORDER BY timestamp, sha"
        );
        let mut stmt = conn.prepare(&sql)?;
        let commits = stmt
            .query_map(params![repository, branch, fork_point_sha, until], parse_commit_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(commits)
    }

    fn upsert_commit(&self, commit: &Commit) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO commits (sha, repository, parent_sha, fork_point_sha, branch,
                                  timestamp, message, author_name, author_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(sha, repository) DO UPDATE SET
               parent_sha = excluded.parent_sha,
               fork_point_sha = excluded.fork_point_sha,
               branch = excluded.branch,
               timestamp = excluded.timestamp,
               message = excluded.message,
               author_name = excluded.author_name,
               author_login = excluded.author_login",
            params![
                commit.sha,
                commit.repository,
                commit.parent_sha,
                commit.fork_point_sha,
                commit.branch,
                commit.timestamp,
                commit.message,
                commit.author_name,
                commit.author_login,
            ],
        )?;
        Ok(())
    }
}

impl ObservationStore for SqliteStore {
    fn upsert_observation(&self, observation: &Observation) -> Result<()> {
        let outcome_json = serde_json::to_string(&observation.outcome)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO observations (id, run_id, case_id, context_id, hardware_fingerprint,
                                       repository, commit_sha, timestamp, unit, outcome_json,
                                       begins_distribution_change)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
               run_id = excluded.run_id,
               case_id = excluded.case_id,
               context_id = excluded.context_id,
               hardware_fingerprint = excluded.hardware_fingerprint,
               repository = excluded.repository,
               commit_sha = excluded.commit_sha,
               timestamp = excluded.timestamp,
               unit = excluded.unit,
               outcome_json = excluded.outcome_json,
               begins_distribution_change = excluded.begins_distribution_change",
            params![
                observation.id,
                observation.run_id,
                observation.case_id,
                observation.context_id,
                observation.hardware_fingerprint,
                observation.repository,
                observation.commit_sha,
                observation.timestamp,
                observation.unit,
                outcome_json,
                observation.begins_distribution_change,
            ],
        )?;
        Ok(())
    }

    fn find_observations_for_key(&self, key: &TimeSeriesKey) -> Result<Vec<Observation>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations
             WHERE case_id = ?1 AND context_id = ?2 AND hardware_fingerprint = ?3 AND repository = ?4
             ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let observations = stmt
            .query_map(
                params![
                    key.case_id,
                    key.context_id,
                    key.hardware_fingerprint,
                    key.repository
                ],
                parse_observation_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(observations)
    }

    fn find_observations_for_run(&self, run_id: &str) -> Result<Vec<Observation>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {OBSERVATION_COLUMNS} FROM observations WHERE run_id = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let observations = stmt
            .query_map(params![run_id], parse_observation_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(observations)
    }

    fn series_keys(&self) -> Result<Vec<TimeSeriesKey>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT case_id, context_id, hardware_fingerprint, repository
             FROM observations
             ORDER BY case_id, context_id, hardware_fingerprint, repository",
        )?;
        let keys = stmt
            .query_map([], |row| {
                Ok(TimeSeriesKey {
                    case_id: row.get(0)?,
                    context_id: row.get(1)?,
                    hardware_fingerprint: row.get(2)?,
                    repository: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }
}

impl SnapshotStore for SqliteStore {
    fn upsert_snapshot(&self, snapshot: &DistributionSnapshot) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO distribution_snapshots (commit_sha, case_id, context_id,
                                                 hardware_fingerprint, mean_of_means,
                                                 stddev_of_means, first_timestamp,
                                                 last_timestamp, observation_count, window_limit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(commit_sha, case_id, context_id, hardware_fingerprint) DO UPDATE SET
               mean_of_means = excluded.mean_of_means,
               stddev_of_means = excluded.stddev_of_means,
               first_timestamp = excluded.first_timestamp,
               last_timestamp = excluded.last_timestamp,
               observation_count = excluded.observation_count,
               window_limit = excluded.window_limit",
            params![
                snapshot.commit_sha,
                snapshot.case_id,
                snapshot.context_id,
                snapshot.hardware_fingerprint,
                snapshot.mean_of_means,
                snapshot.stddev_of_means,
                snapshot.first_timestamp,
                snapshot.last_timestamp,
                snapshot.observation_count as i64,
                snapshot.window_limit as i64,
            ],
        )?;
        Ok(())
    }

    fn get_snapshot(&self, key: &SnapshotKey) -> Result<Option<DistributionSnapshot>> {
        let conn = self.conn()?;
        let snapshot = conn
            .query_row(
                "SELECT commit_sha, case_id, context_id, hardware_fingerprint, mean_of_means,
                        stddev_of_means, first_timestamp, last_timestamp, observation_count,
                        window_limit
                 FROM distribution_snapshots
                 WHERE commit_sha = ?1 AND case_id = ?2 AND context_id = ?3
                   AND hardware_fingerprint = ?4",
                params![
                    key.commit_sha,
                    key.case_id,
                    key.context_id,
                    key.hardware_fingerprint
                ],
                parse_snapshot_row,
            )
            .optional()?;
        Ok(snapshot)
    }

    fn clear_snapshots(&self) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM distribution_snapshots", [])?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[test]
    fn test_sqlite_commit_contract() {
        contract::check_commits(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_observation_contract() {
        contract::check_observations(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_snapshot_contract() {
        contract::check_snapshots(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .upsert_commit(&contract::commit("a", "a", "main", 10))
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let commit = store.find_commit("a", "repo").unwrap().unwrap();
        assert!(commit.is_on_default_branch());
    }

    #[test]
    fn test_sqlite_store_is_shareable() {
        fn assert_store<S: crate::store::Store>() {}
        assert_store::<SqliteStore>();
    }
}
