//! Linear ancestry of a commit over a fork-point commit graph
//!
//! Commits carry two pieces of lineage metadata: the branch they were pushed
//! to and the default-branch commit that branch forked from (`fork_point_sha`,
//! equal to `sha` for default-branch commits). From that, the ancestry of a
//! commit is:
//!
//! ```text
//!   default branch:  d1 ── d2 ── d3 (fork point) ── d4 ── d5
//!                                 \
//!   feature branch:                f1 ── f2 ── f3 (commit)
//!
//!   ancestry(f2) = [d1, d2, d3, f1, f2]
//!   ancestry(d4) = [d1, d2, d3, d4]
//! ```
//!
//! Ordering uses a typed [`OrderKey`]: every inherited default-branch commit
//! sorts before every branch commit, then by timestamp. Rebases can produce
//! several commits with one authored timestamp; they share an order key and
//! therefore a window rank downstream.

use crate::error::{AncestryGap, Result, TrendError};
use crate::model::{Commit, Timestamp};
use crate::store::CommitStore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Which part of the lineage an ancestor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lineage {
    DefaultBranch = 1,
    Branch = 2,
}

/// Sort key for commits on one lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub lineage: Lineage,
    pub timestamp: Timestamp,
}

impl OrderKey {
    pub fn default_branch(timestamp: Timestamp) -> Self {
        Self {
            lineage: Lineage::DefaultBranch,
            timestamp,
        }
    }

    pub fn branch(timestamp: Timestamp) -> Self {
        Self {
            lineage: Lineage::Branch,
            timestamp,
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.lineage as u8, self.timestamp)
    }
}

/// One commit on a resolved lineage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorEntry {
    pub sha: String,
    pub timestamp: Timestamp,
    pub on_default_branch: bool,
    pub order_key: OrderKey,
}

/// Ancestors of a commit, oldest first, the commit itself last
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestry {
    head: String,
    entries: Vec<AncestorEntry>,
    index: HashMap<String, usize>,
}

impl Ancestry {
    fn from_entries(head: &str, mut entries: Vec<AncestorEntry>) -> Self {
        entries.sort_by(|a, b| {
            a.order_key
                .cmp(&b.order_key)
                .then_with(|| a.sha.cmp(&b.sha))
        });
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.sha.clone(), i))
            .collect();
        Self {
            head: head.to_string(),
            entries,
            index,
        }
    }

    /// The commit this ancestry was resolved for
    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn entries(&self) -> &[AncestorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, sha: &str) -> bool {
        self.index.contains_key(sha)
    }

    pub fn get(&self, sha: &str) -> Option<&AncestorEntry> {
        self.index.get(sha).map(|&i| &self.entries[i])
    }

    pub fn order_key(&self, sha: &str) -> Option<OrderKey> {
        self.get(sha).map(|e| e.order_key)
    }

    /// Order key of the head commit
    pub fn head_order_key(&self) -> Option<OrderKey> {
        self.order_key(&self.head)
    }
}

/// Resolves ancestries against a [`CommitStore`]
pub struct CommitAncestryResolver<'a, S: CommitStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: CommitStore + ?Sized> CommitAncestryResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Look the commit up, then resolve it
    pub fn ancestry_of(&self, sha: &str, repository: &str) -> Result<Ancestry> {
        let commit = self
            .store
            .find_commit(sha, repository)?
            .ok_or_else(|| TrendError::ancestry(sha, AncestryGap::CommitNotFound))?;
        self.ancestry(&commit)
    }

    /// Ancestry of `commit` back to the repository's first commit
    ///
    /// # Errors
    /// `AncestryUnavailable` when branch, timestamp or fork-point data is
    /// missing, or the fork point is unknown or has no timestamp.
    pub fn ancestry(&self, commit: &Commit) -> Result<Ancestry> {
        let gap = |reason| TrendError::ancestry(&commit.sha, reason);

        let branch = commit
            .branch
            .as_deref()
            .ok_or_else(|| gap(AncestryGap::MissingBranch))?;
        let timestamp = commit
            .timestamp
            .ok_or_else(|| gap(AncestryGap::MissingTimestamp))?;
        let fork_point_sha = commit
            .fork_point_sha
            .as_deref()
            .ok_or_else(|| gap(AncestryGap::MissingForkPoint))?;

        let fork_point_timestamp = if fork_point_sha == commit.sha {
            timestamp
        } else {
            let fork_point = self
                .store
                .find_commit(fork_point_sha, &commit.repository)?
                .ok_or_else(|| gap(AncestryGap::ForkPointNotFound(fork_point_sha.to_string())))?;
            fork_point.timestamp.ok_or_else(|| {
                gap(AncestryGap::ForkPointWithoutTimestamp(
                    fork_point_sha.to_string(),
                ))
            })?
        };

        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for c in self
            .store
            .default_branch_commits(&commit.repository, Some(fork_point_timestamp))?
        {
            let Some(ts) = c.timestamp else { continue };
            if seen.insert(c.sha.clone()) {
                entries.push(AncestorEntry {
                    sha: c.sha,
                    timestamp: ts,
                    on_default_branch: true,
                    order_key: OrderKey::default_branch(ts),
                });
            }
        }

        if !commit.is_on_default_branch() {
            for c in self.store.branch_commits(
                &commit.repository,
                branch,
                fork_point_sha,
                timestamp,
            )? {
                let Some(ts) = c.timestamp else { continue };
                if seen.insert(c.sha.clone()) {
                    entries.push(AncestorEntry {
                        sha: c.sha,
                        timestamp: ts,
                        on_default_branch: false,
                        order_key: OrderKey::branch(ts),
                    });
                }
            }
        }

        tracing::debug!(
            "resolved ancestry of {} ({} commits, fork point {})",
            commit.sha,
            entries.len(),
            fork_point_sha
        );

        Ok(Ancestry::from_entries(&commit.sha, entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn commit(sha: &str, fork_point: &str, branch: &str, ts: Timestamp) -> Commit {
        Commit {
            sha: sha.into(),
            repository: "repo".into(),
            parent_sha: None,
            fork_point_sha: Some(fork_point.into()),
            branch: Some(branch.into()),
            timestamp: Some(ts),
            message: None,
            author_name: None,
            author_login: None,
        }
    }

    /// d1 ── d2 ── d3 ── d4 ── d5 on main, feature forks at d3
    fn graph() -> MemoryStore {
        let store = MemoryStore::new();
        for (sha, ts) in [("d1", 100), ("d2", 200), ("d3", 300), ("d4", 400), ("d5", 500)] {
            store.upsert_commit(&commit(sha, sha, "main", ts)).unwrap();
        }
        for (sha, ts) in [("f1", 350), ("f2", 450), ("f3", 550)] {
            store.upsert_commit(&commit(sha, "d3", "feature", ts)).unwrap();
        }
        // Another branch off the same fork point must not leak in
        store.upsert_commit(&commit("g1", "d3", "other", 360)).unwrap();
        store
    }

    fn shas(ancestry: &Ancestry) -> Vec<&str> {
        ancestry.entries().iter().map(|e| e.sha.as_str()).collect()
    }

    #[test]
    fn test_default_branch_ancestry() {
        let store = graph();
        let resolver = CommitAncestryResolver::new(&store);
        let ancestry = resolver.ancestry_of("d4", "repo").unwrap();

        assert_eq!(shas(&ancestry), vec!["d1", "d2", "d3", "d4"]);
        assert!(ancestry.entries().iter().all(|e| e.on_default_branch));
        assert_eq!(ancestry.head(), "d4");
        assert_eq!(ancestry.head_order_key(), Some(OrderKey::default_branch(400)));
    }

    #[test]
    fn test_branch_ancestry_includes_fork_history() {
        let store = graph();
        let resolver = CommitAncestryResolver::new(&store);
        let ancestry = resolver.ancestry_of("f2", "repo").unwrap();

        // d4 (timestamp 400) is newer than the fork point: excluded
        assert_eq!(shas(&ancestry), vec!["d1", "d2", "d3", "f1", "f2"]);
        assert!(!ancestry.contains("d4"));
        assert!(!ancestry.contains("g1"));
        assert!(!ancestry.get("f1").unwrap().on_default_branch);
        assert!(ancestry.get("d3").unwrap().on_default_branch);
    }

    #[test]
    fn test_branch_commits_sort_after_same_timestamp_default_commits() {
        let store = graph();
        // Rebase kept the authored timestamp of the fork point
        store.upsert_commit(&commit("f0", "d3", "feature", 300)).unwrap();
        let resolver = CommitAncestryResolver::new(&store);
        let ancestry = resolver.ancestry_of("f1", "repo").unwrap();

        assert_eq!(shas(&ancestry), vec!["d1", "d2", "d3", "f0", "f1"]);
        assert_eq!(ancestry.order_key("d3").unwrap().to_string(), "1_300");
        assert_eq!(ancestry.order_key("f0").unwrap().to_string(), "2_300");
    }

    #[test]
    fn test_missing_metadata_is_unavailable() {
        let store = graph();
        let resolver = CommitAncestryResolver::new(&store);

        let mut no_branch = commit("z", "d3", "feature", 600);
        no_branch.branch = None;
        let err = resolver.ancestry(&no_branch).unwrap_err();
        assert!(matches!(
            err,
            TrendError::AncestryUnavailable {
                reason: AncestryGap::MissingBranch,
                ..
            }
        ));

        let unknown = Commit::unknown("z", "repo");
        assert!(resolver.ancestry(&unknown).unwrap_err().is_ancestry_unavailable());

        let mut no_fork = commit("z", "d3", "feature", 600);
        no_fork.fork_point_sha = None;
        assert!(resolver.ancestry(&no_fork).unwrap_err().is_ancestry_unavailable());
    }

    #[test]
    fn test_unknown_fork_point_is_unavailable() {
        let store = graph();
        let resolver = CommitAncestryResolver::new(&store);

        let orphan = commit("z", "nope", "feature", 600);
        let err = resolver.ancestry(&orphan).unwrap_err();
        assert!(matches!(
            err,
            TrendError::AncestryUnavailable {
                reason: AncestryGap::ForkPointNotFound(_),
                ..
            }
        ));

        store.upsert_commit(&Commit::unknown("p", "repo")).unwrap();
        let err = resolver.ancestry(&commit("z", "p", "feature", 600)).unwrap_err();
        assert!(matches!(
            err,
            TrendError::AncestryUnavailable {
                reason: AncestryGap::ForkPointWithoutTimestamp(_),
                ..
            }
        ));
    }

    #[test]
    fn test_commit_not_in_store() {
        let store = graph();
        let resolver = CommitAncestryResolver::new(&store);
        let err = resolver.ancestry_of("missing", "repo").unwrap_err();
        assert!(matches!(
            err,
            TrendError::AncestryUnavailable {
                reason: AncestryGap::CommitNotFound,
                ..
            }
        ));
    }

    /// The fork point was also pushed to the feature branch, so both the
    /// default-branch and the branch query return it
    #[test]
    fn test_commit_on_both_lineages_appears_once() {
        let store = graph();
        store.upsert_commit(&commit("d3", "d3", "feature", 300)).unwrap();
        assert_eq!(store.branch_commits("repo", "feature", "d3", 450).unwrap().len(), 3);

        let resolver = CommitAncestryResolver::new(&store);
        let ancestry = resolver.ancestry_of("f2", "repo").unwrap();

        assert_eq!(shas(&ancestry), vec!["d1", "d2", "d3", "f1", "f2"]);
        assert!(ancestry.get("d3").unwrap().on_default_branch);
        assert_eq!(ancestry.order_key("d3"), Some(OrderKey::default_branch(300)));
    }

    #[test]
    fn test_first_commit_is_its_own_ancestry() {
        let store = graph();
        let resolver = CommitAncestryResolver::new(&store);
        let ancestry = resolver.ancestry_of("d1", "repo").unwrap();
        assert_eq!(shas(&ancestry), vec!["d1"]);
    }
}
