//! Low-dimensional embedding of the cluster map by simulated annealing.
//!
//! The cluster distance matrix lives in the frames' native space, which is
//! too wide to look at. This engine projects the C clusters into a small
//! target space (2-D by default) by minimizing the stress
//!
//! ```text
//! E = sum over i < j of (||x_i - x_j|| - dcc[i][j])^2
//! ```
//!
//! with Metropolis annealing: perturb one cluster's coordinates, accept
//! downhill moves always and uphill moves with probability `exp(-dE / T)`,
//! and cool `T` geometrically. Only the stress terms touching the perturbed
//! cluster change, so each step costs O(C) rather than O(C^2).
//!
//! The result is a layout, not a metric-preserving map: with a fixed seed it
//! is reproducible, and across seeds only the stress level is comparable.

use ndarray::{Array2, ArrayView1};
use rand::prelude::*;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use frame_atlas_core::error::{ConfigError, CoreResult};
use frame_atlas_core::DistanceMatrix;

// ---------------------------------------------------------------------------
// EmbeddingConfig
// ---------------------------------------------------------------------------

/// Configuration for an annealing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Dimension of the embedded space; must be >= 1.
    pub target_dim: usize,

    /// Starting temperature; must be > 0.
    pub initial_temperature: f64,

    /// Geometric cooling factor per iteration; must lie in (0, 1).
    pub cooling_rate: f64,

    /// Iteration budget; must be >= 1.
    pub iterations: u64,

    /// Temperature below which the run stops early; must be > 0.
    pub temperature_floor: f64,

    /// Random seed for reproducibility. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            target_dim: 2,
            initial_temperature: 1.0,
            cooling_rate: 0.995,
            iterations: 10_000,
            temperature_floor: 1e-9,
            seed: None,
        }
    }
}

impl EmbeddingConfig {
    /// Set the embedded dimension.
    #[must_use]
    pub fn with_target_dim(mut self, target_dim: usize) -> Self {
        self.target_dim = target_dim;
        self
    }

    /// Set the starting temperature.
    #[must_use]
    pub fn with_initial_temperature(mut self, t: f64) -> Self {
        self.initial_temperature = t;
        self
    }

    /// Set the geometric cooling factor.
    #[must_use]
    pub fn with_cooling_rate(mut self, rate: f64) -> Self {
        self.cooling_rate = rate;
        self
    }

    /// Set the iteration budget.
    #[must_use]
    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate all fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_dim == 0 {
            return Err(ConfigError::invalid_value("target_dim", "must be >= 1"));
        }
        if !self.initial_temperature.is_finite() || self.initial_temperature <= 0.0 {
            return Err(ConfigError::invalid_value(
                "initial_temperature",
                "must be finite and > 0",
            ));
        }
        if !self.cooling_rate.is_finite() || self.cooling_rate <= 0.0 || self.cooling_rate >= 1.0 {
            return Err(ConfigError::invalid_value(
                "cooling_rate",
                "must lie in (0, 1)",
            ));
        }
        if self.iterations == 0 {
            return Err(ConfigError::invalid_value("iterations", "must be >= 1"));
        }
        if !self.temperature_floor.is_finite() || self.temperature_floor <= 0.0 {
            return Err(ConfigError::invalid_value(
                "temperature_floor",
                "must be finite and > 0",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Counters accumulated over an annealing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnealingStatistics {
    /// Iterations executed (may be under budget if the floor was reached).
    pub iterations_run: u64,
    /// Proposals accepted.
    pub accepted: u64,
    /// Accepted proposals that increased stress.
    pub accepted_uphill: u64,
    /// Temperature at the final iteration.
    pub final_temperature: f64,
}

impl AnnealingStatistics {
    /// Fraction of proposals accepted.
    #[must_use]
    pub fn acceptance_rate(&self) -> f64 {
        if self.iterations_run == 0 {
            return 0.0;
        }
        self.accepted as f64 / self.iterations_run as f64
    }
}

/// Result of an annealing run.
#[derive(Debug, Clone)]
pub struct EmbeddingOutcome {
    /// Embedded coordinates, one row per cluster id.
    pub coordinates: Array2<f64>,
    /// Final stress, recomputed in full over the returned coordinates.
    pub stress: f64,
    /// Run counters.
    pub statistics: AnnealingStatistics,
}

// ---------------------------------------------------------------------------
// EmbeddingEngine
// ---------------------------------------------------------------------------

/// Projects a cluster distance matrix into a low-dimensional layout.
#[derive(Debug, Clone)]
pub struct EmbeddingEngine {
    config: EmbeddingConfig,
}

impl EmbeddingEngine {
    /// Create an engine with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for out-of-range fields.
    pub fn new(config: EmbeddingConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(EmbeddingEngine { config })
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Anneal a layout for `dcc`.
    ///
    /// Fewer than two clusters have nothing to arrange: the layout is the
    /// origin (or empty) with zero stress.
    pub fn embed(&self, dcc: &DistanceMatrix) -> EmbeddingOutcome {
        let n = dcc.dim();
        let dim = self.config.target_dim;
        if n < 2 {
            return EmbeddingOutcome {
                coordinates: Array2::zeros((n, dim)),
                stress: 0.0,
                statistics: AnnealingStatistics::default(),
            };
        }

        let mut rng = match self.config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        // Spread the initial layout on the scale of the distances being
        // reproduced, so early moves explore rather than escape.
        let scale = mean_nonzero(dcc).unwrap_or(1.0);
        let mut coords = Array2::from_shape_fn((n, dim), |_| {
            let g: f64 = rng.sample(StandardNormal);
            g * scale
        });

        let mut stats = AnnealingStatistics::default();
        let mut temperature = self.config.initial_temperature;
        let mut proposal = vec![0.0f64; dim];

        for _ in 0..self.config.iterations {
            if temperature < self.config.temperature_floor {
                debug!(
                    iterations = stats.iterations_run,
                    "temperature floor reached, stopping early"
                );
                break;
            }
            stats.iterations_run += 1;

            let i = rng.gen_range(0..n);
            for (d, slot) in proposal.iter_mut().enumerate() {
                let g: f64 = rng.sample(StandardNormal);
                *slot = coords[[i, d]] + g * temperature;
            }

            let delta = stress_delta(&coords, dcc, i, &proposal);
            let accept = delta <= 0.0 || rng.gen::<f64>() < (-delta / temperature).exp();
            if accept {
                for (d, &value) in proposal.iter().enumerate() {
                    coords[[i, d]] = value;
                }
                stats.accepted += 1;
                if delta > 0.0 {
                    stats.accepted_uphill += 1;
                }
            }

            temperature *= self.config.cooling_rate;
        }
        stats.final_temperature = temperature;

        let stress = stress(&coords, dcc);
        info!(
            clusters = n,
            target_dim = dim,
            iterations = stats.iterations_run,
            accepted = stats.accepted,
            stress,
            "annealing complete"
        );
        EmbeddingOutcome {
            coordinates: coords,
            stress,
            statistics: stats,
        }
    }
}

/// Full stress of a layout against a distance matrix.
#[must_use]
pub fn stress(coords: &Array2<f64>, dcc: &DistanceMatrix) -> f64 {
    let n = dcc.dim();
    let mut total = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let d = row_distance(coords.row(i), coords.row(j));
            let residual = d - dcc.get(i, j);
            total += residual * residual;
        }
    }
    total
}

/// Change in stress if cluster `i` moved to `proposal`, touching only the
/// terms that involve `i`.
fn stress_delta(coords: &Array2<f64>, dcc: &DistanceMatrix, i: usize, proposal: &[f64]) -> f64 {
    let n = dcc.dim();
    let current = coords.row(i);
    let mut delta = 0.0;
    for j in 0..n {
        if j == i {
            continue;
        }
        let other = coords.row(j);
        let target = dcc.get(i, j);

        let old = row_distance(current, other) - target;
        let new_dist: f64 = proposal
            .iter()
            .zip(other.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        let new = new_dist - target;
        delta += new * new - old * old;
    }
    delta
}

fn row_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

fn mean_nonzero(dcc: &DistanceMatrix) -> Option<f64> {
    let n = dcc.dim();
    let mut total = 0.0;
    let mut count = 0u64;
    for i in 0..n {
        for j in (i + 1)..n {
            let d = dcc.get(i, j);
            if d > 0.0 {
                total += d;
                count += 1;
            }
        }
    }
    (count > 0).then(|| total / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::DistanceMatrixBuilder;
    use approx::assert_relative_eq;
    use frame_atlas_core::ClusterStore;
    use ndarray::{array, Array1};

    fn matrix_for(rows: &[Vec<f64>]) -> DistanceMatrix {
        let mut store = ClusterStore::new();
        for row in rows {
            store.create(Array1::from_vec(row.clone())).unwrap();
        }
        DistanceMatrixBuilder::default().build(&store).unwrap()
    }

    #[test]
    fn annealing_reduces_stress_from_the_initial_layout() {
        // Four well-separated anchors in 5-D, embedded down to 2-D.
        let dcc = matrix_for(&[
            vec![0.0, 0.0, 0.0, 0.0, 0.0],
            vec![10.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 10.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 10.0, 0.0, 0.0],
        ]);
        let engine = EmbeddingEngine::new(EmbeddingConfig::default().with_seed(7)).unwrap();

        // Initial stress with the same seed's starting layout is what the
        // run has to beat; a fresh random layout is a fair stand-in.
        let mut rng = StdRng::seed_from_u64(7);
        let scale = mean_nonzero(&dcc).unwrap();
        let initial = Array2::from_shape_fn((4, 2), |_| {
            let g: f64 = rng.sample(StandardNormal);
            g * scale
        });
        let initial_stress = stress(&initial, &dcc);

        let outcome = engine.embed(&dcc);
        assert!(outcome.stress < initial_stress);
        assert!(outcome.statistics.accepted > 0);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let dcc = matrix_for(&[vec![0.0, 0.0], vec![5.0, 0.0], vec![0.0, 5.0]]);
        let config = EmbeddingConfig::default().with_seed(42).with_iterations(500);

        let a = EmbeddingEngine::new(config.clone()).unwrap().embed(&dcc);
        let b = EmbeddingEngine::new(config).unwrap().embed(&dcc);
        assert_eq!(a.coordinates, b.coordinates);
        assert_relative_eq!(a.stress, b.stress);
    }

    #[test]
    fn two_exact_points_embed_almost_exactly() {
        // A single pairwise distance is always realizable in 1-D or more,
        // so annealing should get close to zero stress.
        let dcc = matrix_for(&[vec![0.0], vec![4.0]]);
        let config = EmbeddingConfig::default()
            .with_seed(3)
            .with_iterations(20_000);
        let outcome = EmbeddingEngine::new(config).unwrap().embed(&dcc);

        assert!(outcome.stress < 0.1, "stress {} too high", outcome.stress);
        let d = row_distance(outcome.coordinates.row(0), outcome.coordinates.row(1));
        assert_relative_eq!(d, 4.0, epsilon = 0.25);
    }

    #[test]
    fn degenerate_maps_embed_trivially() {
        let empty = EmbeddingEngine::new(EmbeddingConfig::default())
            .unwrap()
            .embed(&DistanceMatrix::empty());
        assert_eq!(empty.coordinates.nrows(), 0);
        assert_relative_eq!(empty.stress, 0.0);

        let single = matrix_for(&[vec![1.0, 2.0]]);
        let one = EmbeddingEngine::new(EmbeddingConfig::default())
            .unwrap()
            .embed(&single);
        assert_eq!(one.coordinates.nrows(), 1);
        assert_eq!(one.coordinates, array![[0.0, 0.0]]);
        assert_relative_eq!(one.stress, 0.0);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(EmbeddingEngine::new(EmbeddingConfig::default().with_target_dim(0)).is_err());
        assert!(EmbeddingEngine::new(EmbeddingConfig::default().with_cooling_rate(1.0)).is_err());
        assert!(
            EmbeddingEngine::new(EmbeddingConfig::default().with_initial_temperature(0.0)).is_err()
        );
        assert!(EmbeddingEngine::new(EmbeddingConfig::default().with_iterations(0)).is_err());
    }

    #[test]
    fn floor_stops_the_run_early() {
        let dcc = matrix_for(&[vec![0.0], vec![1.0]]);
        let config = EmbeddingConfig::default()
            .with_seed(1)
            .with_iterations(1_000_000)
            .with_initial_temperature(1.0)
            .with_cooling_rate(0.5);
        let outcome = EmbeddingEngine::new(config).unwrap().embed(&dcc);

        assert!(outcome.statistics.iterations_run < 1_000_000);
        assert!(outcome.statistics.final_temperature < 1e-9);
    }
}
