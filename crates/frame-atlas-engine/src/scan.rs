//! Pre-clustering distance scan.
//!
//! Picking `rlim` blind is the usual way a first clustering run goes wrong:
//! too small and every frame becomes its own cluster, too large and the map
//! collapses to one. The scan walks the stream once, measures the distance
//! between each consecutive frame pair, and summarizes the distribution.
//! The 20th percentile is a workable starting radius: small enough to keep
//! genuinely distinct frames apart, large enough to absorb frame-to-frame
//! jitter.

use ndarray::Array1;
use serde::Serialize;
use tracing::info;

use frame_atlas_core::error::{AtlasError, ConfigError, CoreResult};
use frame_atlas_core::utils::percentile;
use frame_atlas_core::{Metric, VectorSource};

/// Distribution summary of consecutive-frame distances.
///
/// With fewer than two frames there are no pairs and every summary field is
/// zero; [`suggested_rlim`](Self::suggested_rlim) reports `None` in that
/// case so callers cannot mistake the zeros for a measurement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DistanceScanReport {
    /// Frames consumed from the source.
    pub frames: u64,
    /// Consecutive pairs measured (`frames - 1`, or zero).
    pub pairs: u64,
    /// Smallest pair distance.
    pub min: f64,
    /// Largest pair distance.
    pub max: f64,
    /// Mean pair distance.
    pub mean: f64,
    /// Median pair distance.
    pub median: f64,
    /// 20th percentile.
    pub p20: f64,
    /// 80th percentile.
    pub p80: f64,
}

impl DistanceScanReport {
    /// Starting radius suggested by the scan: the 20th percentile.
    #[must_use]
    pub fn suggested_rlim(&self) -> Option<f64> {
        (self.pairs > 0).then_some(self.p20)
    }
}

/// One-pass consecutive-distance scanner.
#[derive(Debug, Clone, Default)]
pub struct DistanceScan {
    metric: Metric,
}

impl DistanceScan {
    /// A scanner measuring with `metric`.
    #[must_use]
    pub fn new(metric: Metric) -> Self {
        DistanceScan { metric }
    }

    /// Consume `source` and summarize consecutive-frame distances.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DimensionMismatch`] if a frame's dimension differs
    ///   from the first frame's.
    /// - [`AtlasError::InputAfter`] if the source fails mid-stream.
    pub fn scan(&self, source: &mut dyn VectorSource) -> CoreResult<DistanceScanReport> {
        let mut previous: Option<Array1<f64>> = None;
        let mut distances = Vec::new();
        let mut frames = 0u64;

        loop {
            let v = match source.next_vector() {
                Ok(Some(v)) => v,
                Ok(None) => break,
                Err(AtlasError::Input(e)) => return Err(AtlasError::input_after(frames, e)),
                Err(e) => return Err(e),
            };
            if let Some(prev) = &previous {
                if v.len() != prev.len() {
                    return Err(ConfigError::dimension_mismatch(prev.len(), v.len()).into());
                }
                distances.push(self.metric.distance(prev, &v));
            }
            previous = Some(v);
            frames += 1;
        }

        let mut report = DistanceScanReport {
            frames,
            pairs: distances.len() as u64,
            ..DistanceScanReport::default()
        };
        if !distances.is_empty() {
            let mut sorted = distances;
            sorted.sort_unstable_by(f64::total_cmp);
            report.min = sorted[0];
            report.max = sorted[sorted.len() - 1];
            report.mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
            report.median = percentile(&sorted, 50.0).unwrap_or(0.0);
            report.p20 = percentile(&sorted, 20.0).unwrap_or(0.0);
            report.p80 = percentile(&sorted, 80.0).unwrap_or(0.0);
        }
        info!(
            frames = report.frames,
            pairs = report.pairs,
            p20 = report.p20,
            "distance scan complete"
        );
        Ok(report)
    }
}
