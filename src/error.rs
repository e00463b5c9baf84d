//! Error types for lineage resolution, storage and configuration
//!
//! Undefined statistics (too few samples, zero variance) are not errors here:
//! they travel as `Option::None` all the way to the caller.

use thiserror::Error;

/// Why a commit cannot be placed on a lineage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AncestryGap {
    #[error("commit is not in the commit store")]
    CommitNotFound,

    #[error("commit has no branch")]
    MissingBranch,

    #[error("commit has no timestamp")]
    MissingTimestamp,

    #[error("commit has no fork point")]
    MissingForkPoint,

    #[error("fork point {0} is not in the commit store")]
    ForkPointNotFound(String),

    #[error("fork point {0} has no timestamp")]
    ForkPointWithoutTimestamp(String),
}

/// Errors produced by benchtrend
#[derive(Error, Debug)]
pub enum TrendError {
    /// Branch, timestamp or fork-point data is missing. Never fatal to
    /// recording: the result is stored without a z-score.
    #[error("ancestry unavailable for commit {sha}: {reason}")]
    AncestryUnavailable { sha: String, reason: AncestryGap },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrendError {
    pub fn ancestry(sha: impl Into<String>, reason: AncestryGap) -> Self {
        Self::AncestryUnavailable {
            sha: sha.into(),
            reason,
        }
    }

    /// True for the recoverable "no lineage" case
    pub fn is_ancestry_unavailable(&self) -> bool {
        matches!(self, Self::AncestryUnavailable { .. })
    }
}

/// Result type for benchtrend operations
pub type Result<T> = std::result::Result<T, TrendError>;
