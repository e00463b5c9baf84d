//! Assembling rolling-engine input from stored observations
//!
//! Only successful results on commits with a known order key become points.
//! Errored results, results without a commit, and results on commits outside
//! the lineage are skipped.

use crate::ancestry::{Ancestry, OrderKey};
use crate::model::{Commit, Observation};
use crate::regression::SeriesPoint;
use std::collections::HashMap;

fn point(observation: &Observation, commit_sha: &str, order_key: OrderKey) -> Option<SeriesPoint> {
    Some(SeriesPoint {
        id: observation.id.clone(),
        commit_sha: commit_sha.to_string(),
        order_key,
        timestamp: observation.timestamp,
        value: observation.svs()?,
        begins_distribution_change: observation.begins_distribution_change,
    })
}

/// Points for the observations that sit on `ancestry`
pub fn lineage_points(observations: &[Observation], ancestry: &Ancestry) -> Vec<SeriesPoint> {
    observations
        .iter()
        .filter_map(|o| {
            let sha = o.commit_sha.as_deref()?;
            point(o, sha, ancestry.order_key(sha)?)
        })
        .collect()
}

/// Points for the observations on default-branch `commits`
pub fn default_branch_points(observations: &[Observation], commits: &[Commit]) -> Vec<SeriesPoint> {
    let keys: HashMap<&str, OrderKey> = commits
        .iter()
        .filter(|c| c.is_on_default_branch())
        .filter_map(|c| Some((c.sha.as_str(), OrderKey::default_branch(c.timestamp?))))
        .collect();

    observations
        .iter()
        .filter_map(|o| {
            let sha = o.commit_sha.as_deref()?;
            point(o, sha, *keys.get(sha)?)
        })
        .collect()
}
