//! Inter-cluster distance matrix construction.
//!
//! Once clustering finishes, the pairwise anchor distances (`dcc`) are
//! computed exactly once and frozen. The locate engine's pruning bounds and
//! the embedding engine's stress target both read from this matrix, so it
//! must be built with the same metric the cluster map was built with.

use ndarray::Array2;
use tracing::debug;

use frame_atlas_core::error::CoreResult;
use frame_atlas_core::{ClusterStore, DistanceMatrix, Metric};

/// Builds the symmetric O(C²) inter-cluster distance matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceMatrixBuilder {
    metric: Metric,
}

impl DistanceMatrixBuilder {
    /// A builder using the given metric.
    #[must_use]
    pub fn new(metric: Metric) -> Self {
        DistanceMatrixBuilder { metric }
    }

    /// Compute the full matrix from a finished store.
    ///
    /// Deterministic and idempotent: the same store always produces the
    /// bit-identical matrix. An empty store produces the empty matrix.
    ///
    /// # Errors
    ///
    /// Propagates validation failures from matrix construction; these cannot
    /// occur for distances computed here (symmetry holds by construction).
    pub fn build(&self, store: &ClusterStore) -> CoreResult<DistanceMatrix> {
        let n = store.len();
        if n == 0 {
            return Ok(DistanceMatrix::empty());
        }

        let anchors: Vec<_> = store.anchors().collect();
        let mut values = Array2::zeros((n, n));
        for i in 0..n {
            for j in (i + 1)..n {
                let d = self.metric.distance(anchors[i], anchors[j]);
                values[(i, j)] = d;
                values[(j, i)] = d;
            }
        }
        debug!(clusters = n, "distance matrix built");
        DistanceMatrix::from_values(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use frame_atlas_core::ClusterStore;
    use ndarray::array;

    fn three_cluster_store() -> ClusterStore {
        let mut store = ClusterStore::new();
        store.create(array![0.0, 0.0]).unwrap();
        store.create(array![3.0, 4.0]).unwrap();
        store.create(array![0.0, 1.0]).unwrap();
        store
    }

    #[test]
    fn computes_pairwise_distances() {
        let dcc = DistanceMatrixBuilder::default()
            .build(&three_cluster_store())
            .unwrap();

        assert_eq!(dcc.dim(), 3);
        assert_relative_eq!(dcc.get(0, 1), 5.0);
        assert_relative_eq!(dcc.get(0, 2), 1.0);
        assert_relative_eq!(dcc.get(1, 2), (9.0f64 + 9.0).sqrt());
    }

    #[test]
    fn matrix_is_symmetric_with_zero_diagonal() {
        let dcc = DistanceMatrixBuilder::default()
            .build(&three_cluster_store())
            .unwrap();

        for i in 0..3 {
            assert_relative_eq!(dcc.get(i, i), 0.0);
            for j in 0..3 {
                assert_relative_eq!(dcc.get(i, j), dcc.get(j, i));
            }
        }
    }

    #[test]
    fn rebuild_is_bit_identical() {
        let store = three_cluster_store();
        let builder = DistanceMatrixBuilder::default();

        let a = builder.build(&store).unwrap();
        let b = builder.build(&store).unwrap();
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn empty_store_builds_empty_matrix() {
        let dcc = DistanceMatrixBuilder::default()
            .build(&ClusterStore::new())
            .unwrap();
        assert!(dcc.is_empty());
    }

    #[test]
    fn manhattan_metric_is_respected() {
        let dcc = DistanceMatrixBuilder::new(Metric::Manhattan)
            .build(&three_cluster_store())
            .unwrap();
        assert_relative_eq!(dcc.get(0, 1), 7.0);
    }
}
