//! # frame-atlas Core
//!
//! Core types, traits, and utilities for the frame-atlas clustering system.
//!
//! This crate provides the foundational building blocks shared by the three
//! engines (clustering, locate, embedding), including:
//!
//! - **Core Data Types**: [`Cluster`], [`ClusterStore`], [`DistanceMatrix`],
//!   and [`Neighbor`] for representing a cluster map and the results computed
//!   against it.
//!
//! - **Error Types**: the run-level error taxonomy via the [`error`] module:
//!   configuration, input, and consistency failures, with partial-result
//!   semantics attached.
//!
//! - **Traits**: the [`VectorSource`] pull seam that decouples the engines
//!   from frame I/O.
//!
//! - **Utilities**: distance kernels and small numeric helpers.
//!
//! ## Example
//!
//! ```rust
//! use frame_atlas_core::{AnchorPolicy, ClusterStore, Metric};
//! use ndarray::array;
//!
//! let mut store = ClusterStore::new();
//! let id = store.create(array![0.0, 0.0]).unwrap();
//! store.absorb(id, &array![0.2, 0.0], AnchorPolicy::RunningMean).unwrap();
//!
//! let anchor = &store.get(id).unwrap().anchor;
//! assert!(Metric::Euclidean.distance(anchor, &array![0.1, 0.0]) < 1e-9);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types at the crate root
pub use error::{AtlasError, ConfigError, ConsistencyError, CoreResult, InputError};
pub use traits::{Resettable, VectorSource};
pub use types::{
    AnchorPolicy, Cluster, ClusterId, ClusterStore, DistanceMatrix, FrameIndex, Metric, Neighbor,
    NeighborList,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default cap on the number of clusters a run may create.
pub const DEFAULT_MAX_CLUSTERS: usize = 1000;

/// Default cap on the number of frames a run will consume.
pub const DEFAULT_MAX_FRAMES: u64 = 100_000;

/// Prelude module for convenient imports.
///
/// ```rust
/// use frame_atlas_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{AtlasError, ConfigError, ConsistencyError, CoreResult, InputError};
    pub use crate::traits::{Resettable, VectorSource};
    pub use crate::types::{
        AnchorPolicy, Cluster, ClusterId, ClusterStore, DistanceMatrix, FrameIndex, Metric,
        Neighbor, NeighborList,
    };
}
