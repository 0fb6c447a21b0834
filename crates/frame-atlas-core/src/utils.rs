//! Numeric helper functions shared across the workspace.

use ndarray::Array1;

/// Euclidean (L2) distance between two vectors.
///
/// # Panics
///
/// Panics if the vectors differ in length.
#[must_use]
pub fn euclidean_distance(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    squared_euclidean_distance(a, b).sqrt()
}

/// Squared Euclidean distance, for callers comparing distances without
/// needing the root.
///
/// # Panics
///
/// Panics if the vectors differ in length.
#[must_use]
pub fn squared_euclidean_distance(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    assert_eq!(a.len(), b.len(), "vector dimensions must match");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Manhattan (L1) distance between two vectors.
///
/// # Panics
///
/// Panics if the vectors differ in length.
#[must_use]
pub fn manhattan_distance(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    assert_eq!(a.len(), b.len(), "vector dimensions must match");
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// The `p`-th percentile of `sorted` (ascending), by linear interpolation
/// between the two nearest ranks.
///
/// Returns `None` for an empty slice. `p` is clamped to `[0, 100]`.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_euclidean_distance() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_relative_eq!(euclidean_distance(&a, &b), 5.0);
        assert_relative_eq!(squared_euclidean_distance(&a, &b), 25.0);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let a = array![1.5, -2.5, 3.5];
        assert_relative_eq!(euclidean_distance(&a, &a), 0.0);
        assert_relative_eq!(manhattan_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_manhattan_distance() {
        let a = array![1.0, 1.0];
        let b = array![-1.0, 2.0];
        assert_relative_eq!(manhattan_distance(&a, &b), 3.0);
    }

    #[test]
    #[should_panic(expected = "dimensions must match")]
    fn test_mismatched_dimensions_panic() {
        let a = array![1.0];
        let b = array![1.0, 2.0];
        let _ = euclidean_distance(&a, &b);
    }

    #[test]
    fn test_percentile() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile(&data, 0.0).unwrap(), 1.0);
        assert_relative_eq!(percentile(&data, 50.0).unwrap(), 3.0);
        assert_relative_eq!(percentile(&data, 100.0).unwrap(), 5.0);
        assert_relative_eq!(percentile(&data, 25.0).unwrap(), 2.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let data = [0.0, 10.0];
        assert_relative_eq!(percentile(&data, 20.0).unwrap(), 2.0);
        assert_relative_eq!(percentile(&data, 80.0).unwrap(), 8.0);
    }

    #[test]
    fn test_percentile_empty() {
        assert!(percentile(&[], 50.0).is_none());
    }
}
