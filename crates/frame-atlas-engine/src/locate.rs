//! Pruned nearest-cluster search against a frozen cluster map.
//!
//! Locate classifies new vectors against a finished [`ClusterStore`] and its
//! distance matrix. The clustering pass pays O(C) exact distances per frame;
//! locate avoids most of that via the triangle inequality: with `r` a
//! reference anchor whose exact distance `d(v, r)` is known, every candidate
//! `c` satisfies `d(v, c) >= |d(v, r) - dcc[c][r]|`. Candidates are walked in
//! ascending lower-bound order, and the walk stops at the first candidate
//! whose bound exceeds the current k-th best distance, since everything
//! after it is provably farther.
//!
//! Pruning never approximates: the result is identical to the brute-force
//! k-nearest list, ties included, because both modes order neighbors
//! lexicographically by `(distance, cluster id)`.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BinaryHeap;
use tracing::{debug, info};

use frame_atlas_core::error::{AtlasError, ConfigError, CoreResult};
use frame_atlas_core::{
    ClusterId, ClusterStore, DistanceMatrix, Metric, Neighbor, NeighborList, VectorSource,
};

use crate::stats::DistanceHistogram;

/// Default number of reference anchors used for lower bounds.
pub const DEFAULT_NUM_REFS: usize = 3;

// ---------------------------------------------------------------------------
// LocateConfig
// ---------------------------------------------------------------------------

/// Search strategy for a locate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocateMode {
    /// Triangle-inequality pruning over reference-anchor bounds. The default.
    #[default]
    Pruned,
    /// Exact distance to every cluster. The oracle pruning is checked
    /// against, and the fallback when bounds are known to be loose.
    BruteForce,
}

/// Configuration for a locate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocateConfig {
    /// Number of nearest clusters to report per query. Clamped to the
    /// cluster count at query time; must be >= 1.
    pub k: usize,

    /// Number of reference anchors for pruning bounds (the first ids in the
    /// store). Ignored in brute-force mode.
    pub num_refs: usize,

    /// Search strategy.
    pub mode: LocateMode,

    /// Distance metric; must match the metric the map was built with.
    pub metric: Metric,
}

impl Default for LocateConfig {
    fn default() -> Self {
        LocateConfig {
            k: 1,
            num_refs: DEFAULT_NUM_REFS,
            mode: LocateMode::default(),
            metric: Metric::default(),
        }
    }
}

impl LocateConfig {
    /// A config reporting `k` neighbors, defaults elsewhere.
    #[must_use]
    pub fn new(k: usize) -> Self {
        LocateConfig {
            k,
            ..Self::default()
        }
    }

    /// Set the search strategy.
    #[must_use]
    pub fn with_mode(mut self, mode: LocateMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the reference-anchor count.
    #[must_use]
    pub fn with_num_refs(mut self, num_refs: usize) -> Self {
        self.num_refs = num_refs;
        self
    }

    /// Set the distance metric.
    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Validate all fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k == 0 {
            return Err(ConfigError::invalid_value("k", "must be >= 1"));
        }
        if self.num_refs == 0 {
            return Err(ConfigError::invalid_value("num_refs", "must be >= 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LocateStatistics
// ---------------------------------------------------------------------------

/// Counters accumulated over a locate run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocateStatistics {
    /// Query frames processed.
    pub total_frames: u64,
    /// Exact distance computations performed.
    pub distance_computations: u64,
    /// Candidate clusters skipped on a proven lower bound.
    pub pruned_candidates: u64,
    /// Per-frame exact-computation histogram.
    pub dist_hist: DistanceHistogram,
}

impl LocateStatistics {
    /// Mean exact distance computations per query frame.
    #[must_use]
    pub fn avg_computations_per_frame(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.distance_computations as f64 / self.total_frames as f64
    }
}

// ---------------------------------------------------------------------------
// LocateEngine
// ---------------------------------------------------------------------------

/// k-nearest-cluster search over a frozen cluster map.
///
/// Holds the store and matrix by shared reference: locate never mutates the
/// map, and independent engines over the same map may run on separate
/// threads without synchronization.
#[derive(Debug)]
pub struct LocateEngine<'a> {
    store: &'a ClusterStore,
    dcc: &'a DistanceMatrix,
    config: LocateConfig,
    refs: Vec<ClusterId>,
    effective_k: usize,
    stats: LocateStatistics,
}

impl<'a> LocateEngine<'a> {
    /// Create an engine over a validated store/matrix pair.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyClusterMap`] if the store has no clusters.
    /// - [`ConsistencyError`](frame_atlas_core::ConsistencyError) if the
    ///   matrix does not describe the store.
    /// - [`ConfigError::InvalidValue`] for bad `k` or `num_refs`.
    pub fn new(
        store: &'a ClusterStore,
        dcc: &'a DistanceMatrix,
        config: LocateConfig,
    ) -> CoreResult<Self> {
        config.validate()?;
        if store.is_empty() {
            return Err(ConfigError::EmptyClusterMap.into());
        }
        dcc.check_store(store)?;

        // References are the first ids; with few clusters, all of them.
        let refs: Vec<ClusterId> = (0..config.num_refs.min(store.len())).collect();
        let effective_k = config.k.min(store.len());
        if effective_k < config.k {
            debug!(k = config.k, clusters = store.len(), "k clamped to cluster count");
        }
        Ok(LocateEngine {
            store,
            dcc,
            config,
            refs,
            effective_k,
            stats: LocateStatistics::default(),
        })
    }

    /// Locate the k nearest clusters for one query vector.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DimensionMismatch`] if `v` does not match the
    /// map's vector space.
    pub fn locate_one(&mut self, v: &Array1<f64>) -> CoreResult<NeighborList> {
        let dim = self.store.dim().unwrap_or(0);
        if v.len() != dim {
            return Err(ConfigError::dimension_mismatch(dim, v.len()).into());
        }

        let (neighbors, computations, pruned) = match self.config.mode {
            LocateMode::Pruned => self.search_pruned(v),
            LocateMode::BruteForce => self.search_brute(v),
        };

        self.stats.total_frames += 1;
        self.stats.distance_computations += computations as u64;
        self.stats.pruned_candidates += pruned as u64;
        self.stats.dist_hist.record(computations);
        Ok(neighbors)
    }

    /// Locate every vector in `source`, in order.
    ///
    /// Callers that need per-frame results to survive a mid-stream failure
    /// should drive [`LocateEngine::locate_one`] themselves and emit each
    /// result as it arrives; this convenience loop drops the collected list
    /// on error, though the statistics still count every frame located.
    ///
    /// # Errors
    ///
    /// Source failures come back as [`AtlasError::InputAfter`] carrying the
    /// number of frames located before the failure.
    pub fn run(&mut self, source: &mut dyn VectorSource) -> CoreResult<Vec<NeighborList>> {
        let mut results = Vec::new();
        loop {
            match source.next_vector() {
                Ok(Some(v)) => results.push(self.locate_one(&v)?),
                Ok(None) => break,
                Err(AtlasError::Input(e)) => {
                    return Err(AtlasError::input_after(self.stats.total_frames, e));
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            frames = self.stats.total_frames,
            avg_computations = self.stats.avg_computations_per_frame(),
            "locate pass complete"
        );
        Ok(results)
    }

    /// Run counters so far.
    #[must_use]
    pub fn statistics(&self) -> &LocateStatistics {
        &self.stats
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &LocateConfig {
        &self.config
    }

    fn search_brute(&self, v: &Array1<f64>) -> (NeighborList, usize, usize) {
        let mut all: NeighborList = self
            .store
            .iter()
            .map(|c| Neighbor {
                cluster: c.id,
                distance: self.config.metric.distance(v, &c.anchor),
            })
            .collect();
        all.sort_unstable();
        all.truncate(self.effective_k);
        (all, self.store.len(), 0)
    }

    fn search_pruned(&self, v: &Array1<f64>) -> (NeighborList, usize, usize) {
        let anchors: Vec<&Array1<f64>> = self.store.iter().map(|c| &c.anchor).collect();

        // Exact distances to the references, computed once and reused when a
        // reference shows up as a candidate.
        let ref_dists: Vec<f64> = self
            .refs
            .iter()
            .map(|&r| self.config.metric.distance(v, anchors[r]))
            .collect();
        let mut computations = ref_dists.len();

        // Lower bound per candidate: the tightest triangle bound over all
        // references. For a reference itself the bound is its exact distance.
        let mut candidates: Vec<(f64, ClusterId)> = (0..self.store.len())
            .map(|c| {
                let bound = self
                    .refs
                    .iter()
                    .zip(&ref_dists)
                    .map(|(&r, &d_vr)| (d_vr - self.dcc.get(c, r)).abs())
                    .fold(0.0f64, f64::max);
                (bound, c)
            })
            .collect();
        candidates.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        // Max-heap keyed by (distance, id): the root is the current k-th
        // best, i.e. the pruning cutoff.
        let mut best: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(self.effective_k + 1);
        let mut pruned = 0usize;

        for (walked, &(bound, c)) in candidates.iter().enumerate() {
            let cutoff = if best.len() == self.effective_k {
                best.peek().copied()
            } else {
                None
            };
            if let Some(worst) = cutoff {
                if bound > worst.distance {
                    // Sorted by bound: everything from here on is provably
                    // farther than the current k-th best.
                    pruned = candidates.len() - walked;
                    break;
                }
                let distance = if c < self.refs.len() {
                    ref_dists[c]
                } else {
                    computations += 1;
                    self.config.metric.distance(v, anchors[c])
                };
                let candidate = Neighbor { cluster: c, distance };
                if candidate < worst {
                    best.pop();
                    best.push(candidate);
                }
            } else {
                let distance = if c < self.refs.len() {
                    ref_dists[c]
                } else {
                    computations += 1;
                    self.config.metric.distance(v, anchors[c])
                };
                best.push(Neighbor { cluster: c, distance });
            }
        }

        (best.into_sorted_vec(), computations, pruned)
    }
}
