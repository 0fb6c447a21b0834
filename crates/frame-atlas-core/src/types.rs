//! Core data types for the frame-atlas clustering system.
//!
//! These types carry the state shared between the three engines: the live
//! cluster map built by clustering, the frozen inter-cluster distance matrix
//! consumed by locate and embedding, and the per-frame results both produce.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{ConfigError, ConsistencyError, CoreResult};

/// Cluster identifier: dense, assigned in creation order starting at 0,
/// never reused within a run.
pub type ClusterId = usize;

/// 0-based input frame index, in insertion order.
pub type FrameIndex = u64;

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// Distance metric shared by every engine in a run.
///
/// Both variants satisfy the triangle inequality, which the locate engine's
/// pruning depends on. A cluster map must be located and embedded with the
/// same metric it was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    /// Euclidean (L2) distance. The default.
    #[default]
    Euclidean,
    /// Manhattan (L1) distance.
    Manhattan,
}

impl Metric {
    /// Distance between two vectors of equal dimension.
    ///
    /// # Panics
    ///
    /// Panics if the vectors differ in length; callers validate dimensions
    /// before distances are ever taken.
    #[must_use]
    pub fn distance(&self, a: &Array1<f64>, b: &Array1<f64>) -> f64 {
        match self {
            Metric::Euclidean => crate::utils::euclidean_distance(a, b),
            Metric::Manhattan => crate::utils::manhattan_distance(a, b),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Euclidean => write!(f, "euclidean"),
            Metric::Manhattan => write!(f, "manhattan"),
        }
    }
}

// ---------------------------------------------------------------------------
// AnchorPolicy
// ---------------------------------------------------------------------------

/// How a cluster's anchor evolves as members are absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorPolicy {
    /// The anchor tracks the running mean of all members. The default.
    #[default]
    RunningMean,
    /// The anchor stays fixed at the first member forever.
    FirstMember,
}

impl fmt::Display for AnchorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorPolicy::RunningMean => write!(f, "running-mean"),
            AnchorPolicy::FirstMember => write!(f, "first-member"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

/// One cluster: an anchor vector plus running membership statistics.
///
/// `member_count >= 1` always holds; a cluster is born with its first member.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Dense id in creation order.
    pub id: ClusterId,
    /// Representative vector used for all distance tests against this
    /// cluster. Evolves or stays fixed per [`AnchorPolicy`].
    pub anchor: Array1<f64>,
    /// Component-wise sum of every absorbed member.
    pub running_sum: Array1<f64>,
    /// Number of members absorbed, including the founding vector.
    pub member_count: u64,
}

impl Cluster {
    /// Create a cluster from its founding member.
    #[must_use]
    pub fn new(id: ClusterId, anchor: Array1<f64>) -> Self {
        let running_sum = anchor.clone();
        Cluster {
            id,
            anchor,
            running_sum,
            member_count: 1,
        }
    }

    /// Absorb a new member, updating the running sum and, under
    /// [`AnchorPolicy::RunningMean`], the anchor itself.
    pub fn absorb(&mut self, v: &Array1<f64>, policy: AnchorPolicy) {
        self.running_sum += v;
        self.member_count += 1;
        if policy == AnchorPolicy::RunningMean {
            self.anchor = self.mean();
        }
    }

    /// The running mean (`running_sum / member_count`).
    #[must_use]
    pub fn mean(&self) -> Array1<f64> {
        &self.running_sum / self.member_count as f64
    }

    /// Dimension of this cluster's vector space.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.anchor.len()
    }
}

// ---------------------------------------------------------------------------
// ClusterStore
// ---------------------------------------------------------------------------

/// The ordered, append-only set of clusters built by a clustering run.
///
/// Indexed by [`ClusterId`]; clusters are never deleted or merged once
/// created. The first cluster fixes the dimension D for the whole store.
/// After clustering the store is handed to locate and embedding by read-only
/// reference and never mutated again.
#[derive(Debug, Clone, Default)]
pub struct ClusterStore {
    clusters: Vec<Cluster>,
    dim: Option<usize>,
}

impl ClusterStore {
    /// An empty store whose dimension is fixed by the first cluster created.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store committed to dimension `dim` up front.
    #[must_use]
    pub fn with_dim(dim: usize) -> Self {
        ClusterStore {
            clusters: Vec::new(),
            dim: Some(dim),
        }
    }

    /// Create a new cluster founded on `anchor` and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DimensionMismatch`] if the anchor does not
    /// match the store's dimension.
    pub fn create(&mut self, anchor: Array1<f64>) -> CoreResult<ClusterId> {
        self.check_dim(anchor.len())?;
        let id = self.clusters.len();
        self.clusters.push(Cluster::new(id, anchor));
        Ok(id)
    }

    /// Absorb `v` into cluster `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DimensionMismatch`] if `v` has the wrong
    /// dimension.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not returned by [`ClusterStore::create`] on this
    /// store.
    pub fn absorb(&mut self, id: ClusterId, v: &Array1<f64>, policy: AnchorPolicy) -> CoreResult<()> {
        self.check_dim(v.len())?;
        self.clusters[id].absorb(v, policy);
        Ok(())
    }

    fn check_dim(&mut self, got: usize) -> Result<(), ConfigError> {
        match self.dim {
            Some(expected) if expected != got => Err(ConfigError::dimension_mismatch(expected, got)),
            Some(_) => Ok(()),
            None => {
                self.dim = Some(got);
                Ok(())
            }
        }
    }

    /// The cluster with this id, if it exists.
    #[must_use]
    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id)
    }

    /// Number of clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether the store holds no clusters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Dimension of the vector space, once fixed.
    #[must_use]
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    /// Iterate clusters in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    /// Iterate anchors in id order.
    pub fn anchors(&self) -> impl Iterator<Item = &Array1<f64>> {
        self.clusters.iter().map(|c| &c.anchor)
    }
}

// ---------------------------------------------------------------------------
// DistanceMatrix
// ---------------------------------------------------------------------------

/// Tolerance for symmetry / diagonal validation on loaded matrices.
const MATRIX_TOLERANCE: f64 = 1e-9;

/// The symmetric inter-cluster distance matrix (`dcc`).
///
/// Built once from a finished [`ClusterStore`] and immutable afterwards.
/// `dcc[i][i] == 0` and `dcc[i][j] == dcc[j][i]` for all pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    values: Array2<f64>,
}

impl DistanceMatrix {
    /// Wrap a dense matrix, validating shape, symmetry, completeness, and
    /// the zero diagonal.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsistencyError`] describing the first violation found.
    pub fn from_values(values: Array2<f64>) -> CoreResult<Self> {
        let (rows, cols) = values.dim();
        if rows != cols {
            return Err(ConsistencyError::mismatch(rows, cols).into());
        }
        for i in 0..rows {
            let diag = values[(i, i)];
            if diag.abs() > MATRIX_TOLERANCE {
                return Err(ConsistencyError::NonzeroDiagonal { id: i, value: diag }.into());
            }
            for j in (i + 1)..cols {
                let forward = values[(i, j)];
                let reverse = values[(j, i)];
                if forward.is_nan() || reverse.is_nan() {
                    return Err(ConsistencyError::MissingPair { i, j }.into());
                }
                if (forward - reverse).abs() > MATRIX_TOLERANCE {
                    return Err(ConsistencyError::AsymmetricMatrix {
                        i,
                        j,
                        forward,
                        reverse,
                    }
                    .into());
                }
            }
        }
        Ok(DistanceMatrix { values })
    }

    /// The 0x0 matrix of an empty cluster map.
    #[must_use]
    pub fn empty() -> Self {
        DistanceMatrix {
            values: Array2::zeros((0, 0)),
        }
    }

    /// Distance between clusters `i` and `j`.
    ///
    /// # Panics
    ///
    /// Panics if either id is out of range.
    #[must_use]
    pub fn get(&self, i: ClusterId, j: ClusterId) -> f64 {
        self.values[(i, j)]
    }

    /// Number of clusters this matrix describes.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.values.nrows()
    }

    /// Whether the matrix describes zero clusters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dim() == 0
    }

    /// The dense values, row-major.
    #[must_use]
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Verify that this matrix and `store` describe the same cluster map.
    ///
    /// # Errors
    ///
    /// Returns [`ConsistencyError::StoreMatrixMismatch`] when the counts
    /// disagree.
    pub fn check_store(&self, store: &ClusterStore) -> Result<(), ConsistencyError> {
        if self.dim() != store.len() {
            return Err(ConsistencyError::mismatch(store.len(), self.dim()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Neighbor
// ---------------------------------------------------------------------------

/// One locate result: a cluster and the exact distance to its anchor.
///
/// Orders lexicographically by `(distance, cluster)`, which is the tie-break
/// rule everywhere in the system: equal distances resolve to the lowest id.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    /// The cluster found.
    pub cluster: ClusterId,
    /// Exact distance from the query vector to the cluster's anchor.
    pub distance: f64,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.cluster.cmp(&other.cluster))
    }
}

/// The k nearest clusters for one query frame, ascending by
/// `(distance, cluster)`.
pub type NeighborList = Vec<Neighbor>;
