//! Synthetic frame streams for exercising the pipeline.
//!
//! Real capture streams are awkward test inputs: long, wide, and hard to
//! reason about. The generator produces small structured streams whose
//! correct clustering is known by construction. A pattern lays down `count`
//! base points, the stream replays them `repeat` times with fresh jitter per
//! emission, and an optional shuffle destroys the arrival order. Replaying
//! the same base points is deliberate: it gives clusters revisits, which is
//! what the membership and transition outputs need to show anything.

use ndarray::Array1;
use rand::prelude::*;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use frame_atlas_core::error::{ConfigError, CoreResult};

use crate::source::InMemorySource;

/// Step scale of the random-walk pattern.
const WALK_STEP: f64 = 0.1;
/// Full turns traced by the spiral pattern.
const SPIRAL_TURNS: f64 = 5.0;

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

/// Base point layouts the generator knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pattern {
    /// Uniform noise in the unit square. No cluster structure at all.
    #[default]
    Random2d,
    /// Gaussian random walk from the origin. Clusters follow the path.
    Walk2d,
    /// Archimedean spiral, radius growing over the stream.
    Spiral2d,
    /// Evenly spaced points on a circle. `count` well-separated clusters.
    Circle2d,
    /// Gaussian points normalized onto the unit sphere.
    Sphere3d,
}

impl Pattern {
    /// Dimension of the vectors this pattern emits.
    #[must_use]
    pub fn dim(&self) -> usize {
        match self {
            Pattern::Random2d | Pattern::Walk2d | Pattern::Spiral2d | Pattern::Circle2d => 2,
            Pattern::Sphere3d => 3,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pattern::Random2d => "random2d",
            Pattern::Walk2d => "walk2d",
            Pattern::Spiral2d => "spiral2d",
            Pattern::Circle2d => "circle2d",
            Pattern::Sphere3d => "sphere3d",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Pattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random2d" => Ok(Pattern::Random2d),
            "walk2d" => Ok(Pattern::Walk2d),
            "spiral2d" => Ok(Pattern::Spiral2d),
            "circle2d" => Ok(Pattern::Circle2d),
            "sphere3d" => Ok(Pattern::Sphere3d),
            other => Err(ConfigError::invalid_value(
                "pattern",
                format!("unknown pattern {other:?}"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// GeneratorConfig
// ---------------------------------------------------------------------------

/// Configuration for one synthetic stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Base point layout.
    pub pattern: Pattern,

    /// Base points per cycle; must be >= 1.
    pub count: usize,

    /// Times the base layout is replayed; must be >= 1.
    pub repeat: usize,

    /// Per-component uniform jitter amplitude, applied per emission.
    pub noise: f64,

    /// Coordinate scale applied to the base layout.
    pub scale: f64,

    /// Shuffle the final stream order.
    pub shuffle: bool,

    /// Random seed. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            pattern: Pattern::default(),
            count: 100,
            repeat: 1,
            noise: 0.0,
            scale: 1.0,
            shuffle: false,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// A config for `pattern` with `count` base points.
    #[must_use]
    pub fn new(pattern: Pattern, count: usize) -> Self {
        GeneratorConfig {
            pattern,
            count,
            ..Self::default()
        }
    }

    /// Set the replay count.
    #[must_use]
    pub fn with_repeat(mut self, repeat: usize) -> Self {
        self.repeat = repeat;
        self
    }

    /// Set the jitter amplitude.
    #[must_use]
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Set the coordinate scale.
    #[must_use]
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Enable or disable the final shuffle.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
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
        if self.count == 0 {
            return Err(ConfigError::invalid_value("count", "must be >= 1"));
        }
        if self.repeat == 0 {
            return Err(ConfigError::invalid_value("repeat", "must be >= 1"));
        }
        if !self.noise.is_finite() || self.noise < 0.0 {
            return Err(ConfigError::invalid_value(
                "noise",
                "must be finite and >= 0",
            ));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ConfigError::invalid_value(
                "scale",
                "must be finite and > 0",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StreamGenerator
// ---------------------------------------------------------------------------

/// Produces synthetic frame streams from a [`GeneratorConfig`].
#[derive(Debug, Clone)]
pub struct StreamGenerator {
    config: GeneratorConfig,
}

impl StreamGenerator {
    /// Create a generator with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for out-of-range fields.
    pub fn new(config: GeneratorConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(StreamGenerator { config })
    }

    /// The generator's configuration.
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate the full stream: `count * repeat` vectors.
    #[must_use]
    pub fn generate(&self) -> Vec<Array1<f64>> {
        let mut rng = match self.config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let base = self.base_points(&mut rng);
        let mut stream = Vec::with_capacity(base.len() * self.config.repeat);
        for _ in 0..self.config.repeat {
            for point in &base {
                let mut emitted = point.clone();
                if self.config.noise > 0.0 {
                    for component in emitted.iter_mut() {
                        let jitter = (rng.gen::<f64>() * 2.0 - 1.0) * self.config.noise;
                        *component += jitter;
                    }
                }
                stream.push(emitted);
            }
        }
        if self.config.shuffle {
            stream.shuffle(&mut rng);
        }
        debug!(
            pattern = %self.config.pattern,
            frames = stream.len(),
            "generated synthetic stream"
        );
        stream
    }

    /// Generate the stream wrapped as a [`VectorSource`](frame_atlas_core::VectorSource).
    #[must_use]
    pub fn generate_source(&self) -> InMemorySource {
        InMemorySource::new(self.generate())
    }

    fn base_points(&self, rng: &mut StdRng) -> Vec<Array1<f64>> {
        let n = self.config.count;
        let s = self.config.scale;
        match self.config.pattern {
            Pattern::Random2d => (0..n)
                .map(|_| Array1::from_vec(vec![rng.gen::<f64>() * s, rng.gen::<f64>() * s]))
                .collect(),
            Pattern::Walk2d => {
                let mut x = 0.0f64;
                let mut y = 0.0f64;
                (0..n)
                    .map(|_| {
                        let dx: f64 = rng.sample(StandardNormal);
                        let dy: f64 = rng.sample(StandardNormal);
                        x += dx * WALK_STEP * s;
                        y += dy * WALK_STEP * s;
                        Array1::from_vec(vec![x, y])
                    })
                    .collect()
            }
            Pattern::Spiral2d => (0..n)
                .map(|i| {
                    let t = i as f64 / n as f64;
                    let angle = t * SPIRAL_TURNS * TAU;
                    let radius = t * s;
                    Array1::from_vec(vec![radius * angle.cos(), radius * angle.sin()])
                })
                .collect(),
            Pattern::Circle2d => (0..n)
                .map(|i| {
                    let angle = i as f64 / n as f64 * TAU;
                    Array1::from_vec(vec![s * angle.cos(), s * angle.sin()])
                })
                .collect(),
            Pattern::Sphere3d => (0..n)
                .map(|_| {
                    // Rejection keeps the direction uniform; a zero draw is
                    // all but impossible but cannot be normalized.
                    let mut v = [0.0f64; 3];
                    loop {
                        for slot in &mut v {
                            *slot = rng.sample(StandardNormal);
                        }
                        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
                        if norm > f64::EPSILON {
                            break Array1::from_vec(v.iter().map(|x| x / norm * s).collect());
                        }
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn norms(stream: &[Array1<f64>]) -> Vec<f64> {
        stream
            .iter()
            .map(|v| v.iter().map(|x| x * x).sum::<f64>().sqrt())
            .collect()
    }

    fn sorted_rows(stream: &[Array1<f64>]) -> Vec<Vec<f64>> {
        let mut rows: Vec<Vec<f64>> = stream.iter().map(|v| v.to_vec()).collect();
        rows.sort_by(|a, b| {
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let config = GeneratorConfig::new(Pattern::Walk2d, 50)
            .with_noise(0.05)
            .with_seed(9);
        let a = StreamGenerator::new(config.clone()).unwrap().generate();
        let b = StreamGenerator::new(config).unwrap().generate();
        assert_eq!(a, b);
    }

    #[test]
    fn repeat_multiplies_the_stream_length() {
        let config = GeneratorConfig::new(Pattern::Circle2d, 8)
            .with_repeat(3)
            .with_seed(1);
        let stream = StreamGenerator::new(config).unwrap().generate();
        assert_eq!(stream.len(), 24);
        // Without noise every replay is exact.
        assert_eq!(stream[0], stream[8]);
        assert_eq!(stream[0], stream[16]);
    }

    #[test]
    fn circle_points_sit_on_the_circle() {
        let config = GeneratorConfig::new(Pattern::Circle2d, 12).with_scale(2.5);
        let stream = StreamGenerator::new(config).unwrap().generate();
        for n in norms(&stream) {
            assert_relative_eq!(n, 2.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn sphere_points_sit_on_the_sphere() {
        let config = GeneratorConfig::new(Pattern::Sphere3d, 40).with_seed(2);
        let stream = StreamGenerator::new(config).unwrap().generate();
        assert_eq!(stream[0].len(), 3);
        for n in norms(&stream) {
            assert_relative_eq!(n, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn spiral_radius_grows_along_the_stream() {
        let config = GeneratorConfig::new(Pattern::Spiral2d, 100);
        let stream = StreamGenerator::new(config).unwrap().generate();
        let n = norms(&stream);
        assert!(n[0] < n[99]);
        assert_relative_eq!(n[0], 0.0);
    }

    #[test]
    fn noise_stays_within_its_amplitude() {
        let clean = StreamGenerator::new(GeneratorConfig::new(Pattern::Circle2d, 16))
            .unwrap()
            .generate();
        let noisy = StreamGenerator::new(
            GeneratorConfig::new(Pattern::Circle2d, 16)
                .with_noise(0.01)
                .with_seed(5),
        )
        .unwrap()
        .generate();

        for (c, n) in clean.iter().zip(&noisy) {
            for (a, b) in c.iter().zip(n.iter()) {
                assert!((a - b).abs() <= 0.01 + 1e-12);
            }
        }
    }

    #[test]
    fn shuffle_permutes_without_losing_frames() {
        let base = GeneratorConfig::new(Pattern::Circle2d, 32).with_seed(11);
        let ordered = StreamGenerator::new(base.clone()).unwrap().generate();
        let shuffled = StreamGenerator::new(base.with_shuffle(true))
            .unwrap()
            .generate();

        assert_ne!(ordered, shuffled);
        assert_eq!(sorted_rows(&ordered), sorted_rows(&shuffled));
    }

    #[test]
    fn pattern_names_round_trip() {
        for pattern in [
            Pattern::Random2d,
            Pattern::Walk2d,
            Pattern::Spiral2d,
            Pattern::Circle2d,
            Pattern::Sphere3d,
        ] {
            assert_eq!(pattern.to_string().parse::<Pattern>().unwrap(), pattern);
        }
        assert!("hexagon".parse::<Pattern>().is_err());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(StreamGenerator::new(GeneratorConfig::new(Pattern::Random2d, 0)).is_err());
        assert!(
            StreamGenerator::new(GeneratorConfig::default().with_noise(-0.5)).is_err()
        );
        assert!(StreamGenerator::new(GeneratorConfig::default().with_scale(0.0)).is_err());
    }
}
