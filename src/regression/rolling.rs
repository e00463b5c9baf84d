// Rank-based rolling distribution over one benchmark time series
//
// Windows are measured in commit ranks, not positions: a dense rank over the
// lineage order key, so every result on one commit (or on rebased commits
// sharing a timestamp) enters and leaves a window together.
//
//   position   0    1    2    3    4
//   order key  1_10 1_20 1_20 1_30 1_40
//   rank       0    1    1    2    3
//   rank_starts = [0, 1, 3, 4, 5]
//
// Per-rank start offsets turn "the last W ranks before rank r" into the
// position range rank_starts[r - W] .. rank_starts[r]; segment starts clip
// the mean windows at distribution-change markers.
//
// The mean windows never cross a segment boundary. The residual stddev window
// does: the spread of the distribution is assumed not to change much across a
// reset of its mean.

use crate::ancestry::OrderKey;
use crate::model::Timestamp;
use crate::stats::{mean, sample_stddev};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One observation's value on a lineage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Stable tie-breaker (the observation id)
    pub id: String,
    pub commit_sha: String,
    pub order_key: OrderKey,
    /// Observation timestamp, second sort key after `order_key`
    pub timestamp: Timestamp,
    pub value: f64,
    pub begins_distribution_change: bool,
}

/// Rolling columns for one position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingPoint {
    pub rank: usize,
    pub segment_id: u32,
    pub rolling_mean_excl: f64,
    pub rolling_mean_incl: f64,
    pub residual: f64,
    /// `None` with fewer than two residuals in the window
    pub rolling_stddev: Option<f64>,
}

/// Distribution a new value is scored against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// `None` when the segment has no earlier ranks
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
    /// Observations behind `mean`
    pub observation_count: usize,
    /// Residuals behind `stddev`
    pub residual_count: usize,
}

impl Baseline {
    pub fn is_defined(&self) -> bool {
        self.mean.is_some() && self.stddev.is_some_and(|sd| sd > 0.0)
    }
}

/// Computes rolling statistics with a fixed window of commit ranks
#[derive(Debug, Clone, Copy)]
pub struct RollingDistributionEngine {
    window: usize,
}

impl RollingDistributionEngine {
    /// `window` of 0 is treated as 1
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Sort the series and compute every rolling column
    ///
    /// Sorting is by `(order_key, timestamp, id)`, so the output does not
    /// depend on the order `points` arrive in. Non-finite values are dropped.
    pub fn compute(&self, mut points: Vec<SeriesPoint>) -> RollingSeries {
        points.retain(|p| p.value.is_finite());
        points.sort_by(|a, b| {
            a.order_key
                .cmp(&b.order_key)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
                .then_with(|| a.id.cmp(&b.id))
        });

        let n = points.len();
        let w = self.window;

        let mut ranks = Vec::with_capacity(n);
        let mut rank_starts = Vec::new();
        for (i, point) in points.iter().enumerate() {
            if i == 0 || point.order_key != points[i - 1].order_key {
                rank_starts.push(i);
            }
            ranks.push(rank_starts.len() - 1);
        }
        rank_starts.push(n);

        let mut segment_ids = Vec::with_capacity(n);
        let mut segment_starts = Vec::with_capacity(n);
        let mut segment = 0u32;
        for (i, point) in points.iter().enumerate() {
            if point.begins_distribution_change {
                segment += 1;
            }
            segment_ids.push(segment);
            let start = if i > 0 && segment_ids[i - 1] == segment {
                segment_starts[i - 1]
            } else {
                i
            };
            segment_starts.push(start);
        }

        let mut segment_ends = vec![n; n];
        for i in (0..n.saturating_sub(1)).rev() {
            segment_ends[i] = if segment_ids[i + 1] == segment_ids[i] {
                segment_ends[i + 1]
            } else {
                i + 1
            };
        }

        let values: Vec<f64> = points.iter().map(|p| p.value).collect();

        let mut means_excl = Vec::with_capacity(n);
        let mut means_incl = Vec::with_capacity(n);
        let mut residuals = Vec::with_capacity(n);
        for i in 0..n {
            let r = ranks[i];

            let excl_lo = rank_starts[r.saturating_sub(w)].max(segment_starts[i]);
            let excl_hi = rank_starts[r];
            let mean_excl = if excl_lo < excl_hi {
                mean(&values[excl_lo..excl_hi]).unwrap_or(values[i])
            } else {
                values[i]
            };

            let incl_lo = rank_starts[(r + 1).saturating_sub(w)].max(segment_starts[i]);
            let incl_hi = rank_starts[r + 1].min(segment_ends[i]);
            let mean_incl = mean(&values[incl_lo..incl_hi]).unwrap_or(values[i]);

            means_excl.push(mean_excl);
            means_incl.push(mean_incl);
            residuals.push(values[i] - mean_excl);
        }

        let stats = (0..n)
            .map(|i| {
                let r = ranks[i];
                let lo = rank_starts[(r + 1).saturating_sub(w)];
                let hi = rank_starts[r + 1];
                RollingPoint {
                    rank: r,
                    segment_id: segment_ids[i],
                    rolling_mean_excl: means_excl[i],
                    rolling_mean_incl: means_incl[i],
                    residual: residuals[i],
                    rolling_stddev: sample_stddev(&residuals[lo..hi]),
                }
            })
            .collect();

        tracing::debug!(
            "rolling window over {} points, {} ranks, {} segments",
            n,
            rank_starts.len() - 1,
            segment
        );

        RollingSeries {
            window: w,
            points,
            stats,
            values,
            residuals,
            rank_starts,
            segment_starts,
            segment_ends,
        }
    }
}

/// Sorted series with its rolling columns
#[derive(Debug, Clone)]
pub struct RollingSeries {
    window: usize,
    points: Vec<SeriesPoint>,
    stats: Vec<RollingPoint>,
    values: Vec<f64>,
    residuals: Vec<f64>,
    rank_starts: Vec<usize>,
    segment_starts: Vec<usize>,
    segment_ends: Vec<usize>,
}

impl RollingSeries {
    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in window order
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    /// Rolling columns, parallel to [`points`](Self::points)
    pub fn stats(&self) -> &[RollingPoint] {
        &self.stats
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SeriesPoint, &RollingPoint)> {
        self.points.iter().zip(self.stats.iter())
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.points.iter().position(|p| p.id == id)
    }

    /// Positions behind `rolling_mean_incl` at `pos`
    pub fn incl_window(&self, pos: usize) -> Range<usize> {
        let r = self.stats[pos].rank;
        let lo = self.rank_starts[(r + 1).saturating_sub(self.window)].max(self.segment_starts[pos]);
        let hi = self.rank_starts[r + 1].min(self.segment_ends[pos]);
        lo..hi
    }

    /// Baseline for scoring the point at `pos`: earlier ranks only, so a
    /// point is never compared against itself or its commit siblings.
    pub fn baseline_at(&self, pos: usize) -> Baseline {
        let cut = self.rank_starts[self.stats[pos].rank];
        self.baseline_window(cut, self.segment_starts[pos])
    }

    /// Baseline for a hypothetical new point at `order_key`, continuing the
    /// last segment before it
    pub fn baseline_before(&self, order_key: &OrderKey) -> Baseline {
        let cut = self.points.partition_point(|p| p.order_key < *order_key);
        let segment_lo = if cut > 0 {
            self.segment_starts[cut - 1]
        } else {
            0
        };
        self.baseline_window(cut, segment_lo)
    }

    /// `cut` must be a rank boundary
    fn baseline_window(&self, cut: usize, segment_lo: usize) -> Baseline {
        let r_cut = self.rank_starts.partition_point(|&start| start < cut);
        let lo = self.rank_starts[r_cut.saturating_sub(self.window)];

        let mean_lo = lo.max(segment_lo);
        let (mean_value, observation_count) = if mean_lo < cut {
            (mean(&self.values[mean_lo..cut]), cut - mean_lo)
        } else {
            (None, 0)
        };

        let residuals = &self.residuals[lo..cut];
        Baseline {
            mean: mean_value,
            stddev: sample_stddev(residuals),
            observation_count,
            residual_count: residuals.len(),
        }
    }
}
