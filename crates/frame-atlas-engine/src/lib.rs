//! # frame-atlas Engine
//!
//! The three processing engines of the frame-atlas system, plus the I/O
//! around them:
//!
//! - **Clustering** ([`cluster`]): single-pass online clustering of a vector
//!   stream. Order-dependent by design: each frame joins the nearest
//!   existing cluster within `rlim` or founds a new one.
//!
//! - **Locate** ([`locate`]): k-nearest-cluster search for new frames
//!   against a frozen cluster map, with triangle-inequality pruning that is
//!   exactly equivalent to brute force.
//!
//! - **Embedding** ([`embed`]): simulated-annealing projection of the
//!   cluster distance matrix into a low-dimensional layout.
//!
//! Around the engines: vector [`source`]s, the [`matrix`] builder,
//! on-disk [`artifacts`], the pre-run distance [`scan`], the synthetic
//! stream [`gen`]erator, and the JSON run [`config`].
//!
//! ## Example
//!
//! ```rust
//! use frame_atlas_engine::cluster::{ClusterConfig, ClusterEngine};
//! use frame_atlas_engine::matrix::DistanceMatrixBuilder;
//! use frame_atlas_engine::source::InMemorySource;
//!
//! let mut source = InMemorySource::from_rows(vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.0],
//!     vec![5.0, 5.0],
//! ]);
//! let mut engine = ClusterEngine::new(ClusterConfig::new(0.5)).unwrap();
//! engine.run(&mut source).unwrap();
//!
//! let outcome = engine.finish();
//! assert_eq!(outcome.store.len(), 2);
//! assert_eq!(outcome.assignments, vec![0, 0, 1]);
//!
//! let dcc = DistanceMatrixBuilder::default().build(&outcome.store).unwrap();
//! assert_eq!(dcc.dim(), 2);
//! ```

#![forbid(unsafe_code)]

pub mod artifacts;
pub mod cluster;
pub mod config;
pub mod embed;
pub mod gen;
pub mod locate;
pub mod matrix;
pub mod scan;
pub mod source;
pub mod stats;

// Re-export the main engine surfaces at the crate root
pub use artifacts::ArtifactConfig;
pub use cluster::{ClusterConfig, ClusterEngine, ClusterOutcome, ClusteringStatistics};
pub use config::RunConfig;
pub use embed::{EmbeddingConfig, EmbeddingEngine, EmbeddingOutcome};
pub use gen::{GeneratorConfig, Pattern, StreamGenerator};
pub use locate::{LocateConfig, LocateEngine, LocateMode, LocateStatistics};
pub use matrix::DistanceMatrixBuilder;
pub use scan::{DistanceScan, DistanceScanReport};
pub use source::{ChannelSource, InMemorySource, TextVectorSource};
pub use stats::DistanceHistogram;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
