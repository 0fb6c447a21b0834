//! Shared run statistics types.
//!
//! Both the clustering and locate engines record, per processed frame, how
//! many exact distance computations that frame cost. The histogram over
//! those counts is the primary efficiency artifact of a run: locate's
//! pruning shows up as the histogram mass shifting far below the cluster
//! count.

use serde::Serialize;
use std::collections::BTreeMap;

/// Histogram of exact distance computations per frame.
///
/// Maps `number of computations -> number of frames that cost exactly that
/// many`. Iteration order is ascending by computation count, which is the
/// order the run-log block is written in. Conservation law: the counts sum
/// to the total number of frames processed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DistanceHistogram {
    bins: BTreeMap<usize, u64>,
}

impl DistanceHistogram {
    /// An empty histogram.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame that cost `computations` exact distances.
    pub fn record(&mut self, computations: usize) {
        *self.bins.entry(computations).or_insert(0) += 1;
    }

    /// Frames recorded for exactly `computations` computations.
    #[must_use]
    pub fn count(&self, computations: usize) -> u64 {
        self.bins.get(&computations).copied().unwrap_or(0)
    }

    /// Total frames recorded across all bins.
    #[must_use]
    pub fn total_frames(&self) -> u64 {
        self.bins.values().sum()
    }

    /// Non-empty bins in ascending computation order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.bins.iter().map(|(&k, &v)| (k, v))
    }

    /// Whether no frame has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}
