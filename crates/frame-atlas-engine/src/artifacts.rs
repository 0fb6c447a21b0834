//! On-disk artifacts of a clustering run.
//!
//! A run writes its results into one output directory (by default
//! `<input>.clusterdat`). Every file is line-oriented plain text so that the
//! downstream tooling (plotting scripts, `grep`, a later locate run) can
//! consume it without this crate. The formats are fixed contracts:
//!
//! | file                    | line format                                |
//! |-------------------------|--------------------------------------------|
//! | `anchors.txt`           | `<id> <c1> ... <cD>` (6-decimal)           |
//! | `dcc.txt`               | `<i> <j> <dist>` full square, 6-decimal    |
//! | `frame_membership.txt`  | `<frame> <cluster>`                        |
//! | `cluster_counts.txt`    | `Cluster <id>: <n> frames`                 |
//! | `transition_matrix.txt` | `<from> <to> <count>`, nonzero only        |
//! | `embedding.txt`         | `<id> <x1> ... <xD'>` (6-decimal)          |
//! | `cluster_run.log`       | fixed-prefix `KEY: value` lines            |
//! | `locate_run.log`        | stats plus the computation histogram       |
//!
//! Readers for `anchors.txt` and `dcc.txt` reverse the writers exactly: a
//! locate run rebuilds the cluster map from those two files alone. Both
//! readers skip blank lines and `#` comments.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use frame_atlas_core::error::{CoreResult, InputError};
use frame_atlas_core::{ClusterId, ClusterStore, DistanceMatrix, FrameIndex, Neighbor};

use crate::cluster::{ClusterConfig, ClusteringStatistics};
use crate::locate::LocateStatistics;
use crate::stats::DistanceHistogram;

/// Clustering run log.
pub const RUN_LOG_FILE: &str = "cluster_run.log";
/// Locate run log.
pub const LOCATE_LOG_FILE: &str = "locate_run.log";
/// Anchor vectors.
pub const ANCHORS_FILE: &str = "anchors.txt";
/// Inter-cluster distance matrix.
pub const DCC_FILE: &str = "dcc.txt";
/// Frame-to-cluster assignments.
pub const MEMBERSHIP_FILE: &str = "frame_membership.txt";
/// Per-cluster member totals.
pub const COUNTS_FILE: &str = "cluster_counts.txt";
/// Consecutive-frame transition counts.
pub const TRANSITIONS_FILE: &str = "transition_matrix.txt";
/// Annealed low-dimensional layout.
pub const EMBEDDING_FILE: &str = "embedding.txt";

// ---------------------------------------------------------------------------
// ArtifactConfig
// ---------------------------------------------------------------------------

/// Which optional artifacts a clustering run writes.
///
/// Membership is the one output most runs want, so it alone defaults on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Write `anchors.txt`.
    pub anchors: bool,
    /// Write `dcc.txt`.
    pub dcc: bool,
    /// Write `frame_membership.txt`. On by default.
    pub membership: bool,
    /// Write `cluster_counts.txt`.
    pub counts: bool,
    /// Write `transition_matrix.txt`.
    pub transitions: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        ArtifactConfig {
            anchors: false,
            dcc: false,
            membership: true,
            counts: false,
            transitions: false,
        }
    }
}

impl ArtifactConfig {
    /// Everything on, for runs feeding a later locate or embed.
    #[must_use]
    pub fn all() -> Self {
        ArtifactConfig {
            anchors: true,
            dcc: true,
            membership: true,
            counts: true,
            transitions: true,
        }
    }
}

/// The output directory a run derives from its input path: the input's base
/// name, `.txt` extension dropped, with `.clusterdat` appended.
#[must_use]
pub fn default_output_dir(input: &Path) -> PathBuf {
    let base = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stream".to_string());
    let stem = base.strip_suffix(".txt").unwrap_or(&base);
    PathBuf::from(format!("{stem}.clusterdat"))
}

/// Create the output directory if it does not exist yet.
///
/// # Errors
///
/// Returns the underlying I/O error on failure.
pub fn ensure_output_dir(dir: &Path) -> CoreResult<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Write `anchors.txt`: one cluster per line, id first, then the anchor
/// components at six decimals.
///
/// # Errors
///
/// Returns the underlying I/O error on failure.
pub fn write_anchors(dir: &Path, store: &ClusterStore) -> CoreResult<PathBuf> {
    let path = dir.join(ANCHORS_FILE);
    let mut w = BufWriter::new(File::create(&path)?);
    for cluster in store.iter() {
        write!(w, "{}", cluster.id)?;
        for component in cluster.anchor.iter() {
            write!(w, " {component:.6}")?;
        }
        writeln!(w)?;
    }
    w.flush()?;
    debug!(path = %path.display(), clusters = store.len(), "wrote anchors");
    Ok(path)
}

/// Write `dcc.txt`: the full square including the zero diagonal, six-decimal
/// distances.
///
/// # Errors
///
/// Returns the underlying I/O error on failure.
pub fn write_dcc(dir: &Path, dcc: &DistanceMatrix) -> CoreResult<PathBuf> {
    let path = dir.join(DCC_FILE);
    let mut w = BufWriter::new(File::create(&path)?);
    let n = dcc.dim();
    for i in 0..n {
        for j in 0..n {
            writeln!(w, "{i} {j} {:.6}", dcc.get(i, j))?;
        }
    }
    w.flush()?;
    debug!(path = %path.display(), dim = n, "wrote distance matrix");
    Ok(path)
}

/// Write `frame_membership.txt`: `<frame> <cluster>` in stream order.
///
/// # Errors
///
/// Returns the underlying I/O error on failure.
pub fn write_membership(dir: &Path, assignments: &[ClusterId]) -> CoreResult<PathBuf> {
    let path = dir.join(MEMBERSHIP_FILE);
    let mut w = BufWriter::new(File::create(&path)?);
    for (frame, cluster) in assignments.iter().enumerate() {
        writeln!(w, "{frame} {cluster}")?;
    }
    w.flush()?;
    Ok(path)
}

/// Write `cluster_counts.txt`: `Cluster <id>: <n> frames` per cluster.
///
/// # Errors
///
/// Returns the underlying I/O error on failure.
pub fn write_counts(dir: &Path, store: &ClusterStore) -> CoreResult<PathBuf> {
    let path = dir.join(COUNTS_FILE);
    let mut w = BufWriter::new(File::create(&path)?);
    for cluster in store.iter() {
        writeln!(w, "Cluster {}: {} frames", cluster.id, cluster.member_count)?;
    }
    w.flush()?;
    Ok(path)
}

/// Count consecutive-frame cluster transitions, self-transitions included.
#[must_use]
pub fn transition_counts(assignments: &[ClusterId]) -> BTreeMap<(ClusterId, ClusterId), u64> {
    let mut counts = BTreeMap::new();
    for pair in assignments.windows(2) {
        *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    counts
}

/// Write `transition_matrix.txt`: `<from> <to> <count>`, nonzero entries in
/// `(from, to)` order.
///
/// # Errors
///
/// Returns the underlying I/O error on failure.
pub fn write_transitions(dir: &Path, assignments: &[ClusterId]) -> CoreResult<PathBuf> {
    let path = dir.join(TRANSITIONS_FILE);
    let mut w = BufWriter::new(File::create(&path)?);
    for ((from, to), count) in transition_counts(assignments) {
        writeln!(w, "{from} {to} {count}")?;
    }
    w.flush()?;
    Ok(path)
}

/// Write `embedding.txt`: one cluster per line, id first, then the embedded
/// coordinates at six decimals.
///
/// # Errors
///
/// Returns the underlying I/O error on failure.
pub fn write_embedding(dir: &Path, coordinates: &Array2<f64>) -> CoreResult<PathBuf> {
    let path = dir.join(EMBEDDING_FILE);
    let mut w = BufWriter::new(File::create(&path)?);
    for (id, row) in coordinates.rows().into_iter().enumerate() {
        write!(w, "{id}")?;
        for component in row.iter() {
            write!(w, " {component:.6}")?;
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(path)
}

/// One locate result line: `<frame>: <id> (<dist>) ...`, distances at four
/// decimals, ascending.
#[must_use]
pub fn format_locate_line(frame: FrameIndex, neighbors: &[Neighbor]) -> String {
    let mut line = format!("{frame}:");
    for n in neighbors {
        line.push_str(&format!(" {} ({:.4})", n.cluster, n.distance));
    }
    line
}

fn write_histogram(w: &mut impl Write, hist: &DistanceHistogram) -> std::io::Result<()> {
    writeln!(w, "STATS_DIST_HIST_START")?;
    for (computations, frames) in hist.iter() {
        writeln!(w, "{computations} {frames}")?;
    }
    writeln!(w, "STATS_DIST_HIST_END")
}

// ---------------------------------------------------------------------------
// Run logs
// ---------------------------------------------------------------------------

/// Everything `cluster_run.log` records about a finished run.
///
/// The log is `KEY: value` lines with fixed prefixes; scripts find a value
/// by prefix, so prefixes never change meaning between versions. Caps that
/// were configured off are logged as `-1`.
#[derive(Debug)]
pub struct RunLog<'a> {
    /// The command line as invoked.
    pub cmd: &'a str,
    /// Wall-clock start, `YYYY-MM-DD HH:MM:SS.nnnnnnnnn`.
    pub start_time: &'a str,
    /// Clustering phase duration in milliseconds.
    pub clustering_ms: f64,
    /// Output phase duration in milliseconds.
    pub output_ms: f64,
    /// Directory the artifacts were written to.
    pub output_dir: &'a Path,
    /// The run's engine configuration.
    pub config: &'a ClusterConfig,
    /// Artifact files written, in write order.
    pub files: &'a [PathBuf],
    /// Final engine counters.
    pub statistics: &'a ClusteringStatistics,
}

impl RunLog<'_> {
    /// Write `cluster_run.log` into the output directory.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error on failure.
    pub fn write(&self) -> CoreResult<PathBuf> {
        let path = self.output_dir.join(RUN_LOG_FILE);
        let mut w = BufWriter::new(File::create(&path)?);

        writeln!(w, "CMD: {}", self.cmd)?;
        writeln!(w, "START_TIME: {}", self.start_time)?;
        writeln!(w, "TIME_CLUSTERING_MS: {:.3}", self.clustering_ms)?;
        writeln!(w, "TIME_OUTPUT_MS: {:.3}", self.output_ms)?;
        writeln!(w, "OUTPUT_DIR: {}", self.output_dir.display())?;
        writeln!(w, "PARAM_RLIM: {:.6}", self.config.rlim)?;
        writeln!(
            w,
            "PARAM_MAXCL: {}",
            self.config.max_clusters.map_or(-1, |v| v as i64)
        )?;
        writeln!(
            w,
            "PARAM_MAXIM: {}",
            self.config.max_frames.map_or(-1, |v| v as i64)
        )?;
        writeln!(w, "PARAM_METRIC: {}", self.config.metric)?;
        writeln!(w, "PARAM_ANCHOR_POLICY: {}", self.config.anchor_policy)?;
        for file in self.files {
            writeln!(w, "OUTPUT_FILE: {}", file.display())?;
        }
        writeln!(w, "STATS_CLUSTERS: {}", self.statistics.clusters_created)?;
        writeln!(w, "STATS_FRAMES: {}", self.statistics.total_frames)?;
        writeln!(w, "STATS_DISTS: {}", self.statistics.distance_computations)?;
        writeln!(w, "STATS_FALLBACK: {}", self.statistics.fallback_assignments)?;
        write_histogram(&mut w, &self.statistics.dist_hist)?;

        w.flush()?;
        info!(path = %path.display(), "run log written");
        Ok(path)
    }
}

/// Write `locate_run.log`: the processed-frame total plus the computation
/// histogram.
///
/// # Errors
///
/// Returns the underlying I/O error on failure.
pub fn write_locate_log(dir: &Path, stats: &LocateStatistics) -> CoreResult<PathBuf> {
    let path = dir.join(LOCATE_LOG_FILE);
    let mut w = BufWriter::new(File::create(&path)?);
    writeln!(w, "STATS_TOTAL_FRAMES_PROCESSED: {}", stats.total_frames)?;
    write_histogram(&mut w, &stats.dist_hist)?;
    w.flush()?;
    info!(path = %path.display(), "locate log written");
    Ok(path)
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

fn data_lines(path: &Path) -> CoreResult<Vec<(u64, String)>> {
    let file = File::open(path).map_err(|e| InputError::read(path, e))?;
    let mut lines = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| InputError::read(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push((index as u64 + 1, trimmed.to_string()));
    }
    Ok(lines)
}

/// Read `anchors.txt` back into a [`ClusterStore`].
///
/// Ids must be dense and ascending from zero; every row must carry the same
/// component count. Member counts are not part of the file, so every loaded
/// cluster reports one member.
///
/// # Errors
///
/// Returns [`InputError`] variants describing the first bad record.
pub fn read_anchors(path: &Path) -> CoreResult<ClusterStore> {
    let mut store = ClusterStore::new();
    let mut expected_dim: Option<usize> = None;

    for (line_no, line) in data_lines(path)? {
        let mut tokens = line.split_whitespace();
        let id_token = tokens.next().unwrap_or("");
        let id: ClusterId = id_token.parse().map_err(|_| {
            InputError::malformed(path, line_no, format!("not a cluster id: {id_token:?}"))
        })?;
        if id != store.len() {
            return Err(InputError::malformed(
                path,
                line_no,
                format!(
                    "cluster ids must be dense and ascending, expected {} got {id}",
                    store.len()
                ),
            )
            .into());
        }

        let mut components = Vec::new();
        for token in tokens {
            let value: f64 = token.parse().map_err(|_| {
                InputError::malformed(path, line_no, format!("not a number: {token:?}"))
            })?;
            components.push(value);
        }
        if components.is_empty() {
            return Err(InputError::malformed(path, line_no, "anchor has no components").into());
        }
        match expected_dim {
            Some(expected) if components.len() != expected => {
                return Err(
                    InputError::truncated(path, line_no, expected, components.len()).into(),
                );
            }
            Some(_) => {}
            None => expected_dim = Some(components.len()),
        }
        store.create(components.into())?;
    }
    debug!(path = %path.display(), clusters = store.len(), "read anchors");
    Ok(store)
}

/// Read `dcc.txt` back into a [`DistanceMatrix`].
///
/// Accepts the full square or either triangle; absent mirror entries are
/// filled by symmetry and the diagonal is implied zero. Completeness,
/// symmetry, and the diagonal are then validated.
///
/// # Errors
///
/// Returns [`InputError`] variants for unparsable records and
/// [`ConsistencyError`](frame_atlas_core::ConsistencyError) variants for a
/// matrix that parses but does not describe a cluster map.
pub fn read_dcc(path: &Path) -> CoreResult<DistanceMatrix> {
    let lines = data_lines(path)?;
    let mut triples = Vec::with_capacity(lines.len());
    let mut n = 0usize;

    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(InputError::truncated(path, line_no, 3, fields.len()).into());
        }
        let i: usize = fields[0].parse().map_err(|_| {
            InputError::malformed(path, line_no, format!("not a cluster id: {:?}", fields[0]))
        })?;
        let j: usize = fields[1].parse().map_err(|_| {
            InputError::malformed(path, line_no, format!("not a cluster id: {:?}", fields[1]))
        })?;
        let d: f64 = fields[2].parse().map_err(|_| {
            InputError::malformed(path, line_no, format!("not a distance: {:?}", fields[2]))
        })?;
        n = n.max(i + 1).max(j + 1);
        triples.push((i, j, d));
    }

    if n == 0 {
        return Ok(DistanceMatrix::empty());
    }

    let mut values = Array2::from_elem((n, n), f64::NAN);
    for i in 0..n {
        values[(i, i)] = 0.0;
    }
    for (i, j, d) in triples {
        values[(i, j)] = d;
        if values[(j, i)].is_nan() {
            values[(j, i)] = d;
        }
    }
    let matrix = DistanceMatrix::from_values(values)?;
    debug!(path = %path.display(), dim = matrix.dim(), "read distance matrix");
    Ok(matrix)
}
