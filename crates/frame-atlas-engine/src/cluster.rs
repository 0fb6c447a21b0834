//! Online radius-limited clustering.
//!
//! The clustering engine makes a single pass over a vector stream. Each
//! frame is compared against every existing cluster anchor; it is absorbed
//! by the nearest cluster within `rlim`, founds a new cluster otherwise,
//! or, once the cluster cap is reached, falls back to the globally nearest
//! cluster regardless of `rlim`. The pass is online and order-dependent by
//! design: feeding the same frames in a different order is a different run.
//!
//! Every processed frame receives exactly one assignment. The engine is the
//! only writer of its [`ClusterStore`]; once the pass finishes, the store is
//! frozen and handed to the locate and embedding engines read-only.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use frame_atlas_core::error::{AtlasError, ConfigError, CoreResult};
use frame_atlas_core::{
    AnchorPolicy, ClusterId, ClusterStore, Metric, Resettable, VectorSource,
    DEFAULT_MAX_CLUSTERS, DEFAULT_MAX_FRAMES,
};

use crate::stats::DistanceHistogram;

// ---------------------------------------------------------------------------
// ClusterConfig
// ---------------------------------------------------------------------------

/// Configuration for a clustering run.
///
/// `rlim` is the one parameter every run must think about: the absorption
/// radius around each anchor. The caps default to the traditional limits
/// (1000 clusters, 100 000 frames) and can be lifted with `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Absorption radius. A frame within `rlim` of the nearest anchor joins
    /// that cluster. Must be finite and > 0.
    pub rlim: f64,

    /// Cap on the number of clusters; `None` means unbounded. When the cap
    /// is reached, new frames fall back to the nearest existing cluster.
    pub max_clusters: Option<usize>,

    /// Cap on the number of frames consumed; `None` means drain the source.
    pub max_frames: Option<u64>,

    /// How anchors evolve as members are absorbed.
    pub anchor_policy: AnchorPolicy,

    /// Distance metric for the whole run.
    pub metric: Metric,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            rlim: 1.0,
            max_clusters: Some(DEFAULT_MAX_CLUSTERS),
            max_frames: Some(DEFAULT_MAX_FRAMES),
            anchor_policy: AnchorPolicy::default(),
            metric: Metric::default(),
        }
    }
}

impl ClusterConfig {
    /// A config with the given absorption radius and defaults elsewhere.
    #[must_use]
    pub fn new(rlim: f64) -> Self {
        ClusterConfig {
            rlim,
            ..Self::default()
        }
    }

    /// Set the cluster cap (`None` lifts it).
    #[must_use]
    pub fn with_max_clusters(mut self, cap: Option<usize>) -> Self {
        self.max_clusters = cap;
        self
    }

    /// Set the frame cap (`None` lifts it).
    #[must_use]
    pub fn with_max_frames(mut self, cap: Option<u64>) -> Self {
        self.max_frames = cap;
        self
    }

    /// Set the anchor policy.
    #[must_use]
    pub fn with_anchor_policy(mut self, policy: AnchorPolicy) -> Self {
        self.anchor_policy = policy;
        self
    }

    /// Set the distance metric.
    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Validate all fields, returning the first problem found.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rlim.is_finite() || self.rlim <= 0.0 {
            return Err(ConfigError::invalid_value(
                "rlim",
                format!("must be finite and > 0, got {}", self.rlim),
            ));
        }
        if self.max_clusters == Some(0) {
            return Err(ConfigError::invalid_value("max_clusters", "must be >= 1"));
        }
        if self.max_frames == Some(0) {
            return Err(ConfigError::invalid_value("max_frames", "must be >= 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ClusteringStatistics
// ---------------------------------------------------------------------------

/// Counters accumulated over a clustering run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusteringStatistics {
    /// Frames fully assigned.
    pub total_frames: u64,
    /// Clusters created.
    pub clusters_created: usize,
    /// Exact distance computations performed.
    pub distance_computations: u64,
    /// Frames assigned to the nearest cluster despite exceeding `rlim`,
    /// because the cluster cap was exhausted. This is the ResourceExhaustion
    /// signal: a budget event, not an error.
    pub fallback_assignments: u64,
    /// Per-frame exact-computation histogram.
    pub dist_hist: DistanceHistogram,
}

impl ClusteringStatistics {
    /// Mean exact distance computations per frame.
    #[must_use]
    pub fn avg_computations_per_frame(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.distance_computations as f64 / self.total_frames as f64
    }
}

// ---------------------------------------------------------------------------
// ClusterEngine
// ---------------------------------------------------------------------------

/// Everything a finished clustering run hands to its consumers.
#[derive(Debug)]
pub struct ClusterOutcome {
    /// The frozen cluster map.
    pub store: ClusterStore,
    /// Per-frame cluster assignment, indexed by frame.
    pub assignments: Vec<ClusterId>,
    /// Run counters.
    pub statistics: ClusteringStatistics,
}

/// The single-pass online clustering engine.
pub struct ClusterEngine {
    config: ClusterConfig,
    store: ClusterStore,
    assignments: Vec<ClusterId>,
    stats: ClusteringStatistics,
}

impl ClusterEngine {
    /// Create an engine with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn new(config: ClusterConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(ClusterEngine {
            config,
            store: ClusterStore::new(),
            assignments: Vec::new(),
            stats: ClusteringStatistics::default(),
        })
    }

    /// Assign one frame and return its cluster id.
    ///
    /// This is the complete per-frame logic; [`ClusterEngine::run`] is just
    /// this in a pull loop. Streaming callers may drive `process` directly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DimensionMismatch`] if `v` does not match the
    /// run's vector space.
    pub fn process(&mut self, v: Array1<f64>) -> CoreResult<ClusterId> {
        if let Some(dim) = self.store.dim() {
            if v.len() != dim {
                return Err(ConfigError::dimension_mismatch(dim, v.len()).into());
            }
        }

        // Exhaustive scan over anchors. Strict `<` with ascending ids makes
        // equal-distance ties resolve to the lowest id.
        let mut nearest: Option<(f64, ClusterId)> = None;
        for cluster in self.store.iter() {
            let d = self.config.metric.distance(&v, &cluster.anchor);
            if nearest.map_or(true, |(best, _)| d < best) {
                nearest = Some((d, cluster.id));
            }
        }
        let computations = self.store.len();
        self.stats.distance_computations += computations as u64;
        self.stats.dist_hist.record(computations);

        let assigned = match nearest {
            Some((d, id)) if d <= self.config.rlim => {
                self.store.absorb(id, &v, self.config.anchor_policy)?;
                id
            }
            Some((d, id)) if !self.has_cluster_budget() => {
                // Cap exhausted: degrade gracefully to the nearest cluster
                // and account for it.
                self.store.absorb(id, &v, self.config.anchor_policy)?;
                self.stats.fallback_assignments += 1;
                debug!(cluster = id, distance = d, "fallback assignment beyond rlim");
                id
            }
            _ => {
                let id = self.store.create(v)?;
                self.stats.clusters_created += 1;
                debug!(cluster = id, "created new cluster");
                id
            }
        };

        self.assignments.push(assigned);
        self.stats.total_frames += 1;
        Ok(assigned)
    }

    fn has_cluster_budget(&self) -> bool {
        self.config
            .max_clusters
            .map_or(true, |cap| self.store.len() < cap)
    }

    /// Drain `source` until end of stream or the frame cap.
    ///
    /// # Errors
    ///
    /// Source failures come back as [`AtlasError::InputAfter`] carrying the
    /// number of frames fully assigned before the failure; the engine
    /// retains those assignments for partial flushing.
    pub fn run(&mut self, source: &mut dyn VectorSource) -> CoreResult<u64> {
        static NEVER: AtomicBool = AtomicBool::new(false);
        self.run_with_stop(source, &NEVER)
    }

    /// Like [`ClusterEngine::run`], but halts cleanly when `stop` becomes
    /// true. The flag is checked between frames only: an in-flight frame
    /// always completes its assignment, so the store stays consistent.
    pub fn run_with_stop(
        &mut self,
        source: &mut dyn VectorSource,
        stop: &AtomicBool,
    ) -> CoreResult<u64> {
        let start_frames = self.stats.total_frames;
        loop {
            if stop.load(Ordering::Relaxed) {
                info!(
                    frames = self.stats.total_frames,
                    "stop requested; halting after in-flight frame"
                );
                break;
            }
            if let Some(cap) = self.config.max_frames {
                if self.stats.total_frames >= cap {
                    info!(cap, "frame cap reached");
                    break;
                }
            }
            match source.next_vector() {
                Ok(Some(v)) => {
                    self.process(v)?;
                }
                Ok(None) => break,
                Err(AtlasError::Input(e)) => {
                    return Err(AtlasError::input_after(self.stats.total_frames, e));
                }
                Err(e) => return Err(e),
            }
        }
        let consumed = self.stats.total_frames - start_frames;
        info!(
            frames = consumed,
            clusters = self.store.len(),
            fallbacks = self.stats.fallback_assignments,
            "clustering pass complete"
        );
        Ok(consumed)
    }

    /// The cluster map built so far.
    #[must_use]
    pub fn store(&self) -> &ClusterStore {
        &self.store
    }

    /// Per-frame assignments so far, indexed by frame.
    #[must_use]
    pub fn assignments(&self) -> &[ClusterId] {
        &self.assignments
    }

    /// Run counters so far.
    #[must_use]
    pub fn statistics(&self) -> &ClusteringStatistics {
        &self.stats
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Consume the engine, freezing its outputs.
    #[must_use]
    pub fn finish(self) -> ClusterOutcome {
        ClusterOutcome {
            store: self.store,
            assignments: self.assignments,
            statistics: self.stats,
        }
    }
}

impl Resettable for ClusterEngine {
    fn reset(&mut self) {
        self.store = ClusterStore::new();
        self.assignments.clear();
        self.stats = ClusteringStatistics::default();
    }
}
