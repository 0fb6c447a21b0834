//! Error types for the frame-atlas clustering system.
//!
//! This module is the single source of truth for all error types in the
//! workspace. Every crate that produces an error imports its error type from
//! here rather than defining it inline, keeping the hierarchy centralised.
//!
//! ## Hierarchy
//!
//! ```text
//! AtlasError (top-level)
//! ├── ConfigError       (invalid parameters, dimension mismatch, config files)
//! ├── InputError        (malformed records, unreadable sources)
//! └── ConsistencyError  (cluster store / distance matrix disagreement)
//! ```
//!
//! Cluster-cap exhaustion is deliberately **not** an error: the clustering
//! engine falls back to the nearest existing cluster and counts the event in
//! its statistics. Only the three categories above abort a run.
//!
//! Propagation policy: configuration and consistency errors abort with no
//! partial artifacts; input errors abort but the engines retain everything
//! computed so far, and [`AtlasError::preserves_partial_results`] tells a
//! caller whether flushing those partials is appropriate.

use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CoreResult
// ---------------------------------------------------------------------------

/// Convenient `Result` alias used throughout the workspace.
pub type CoreResult<T> = Result<T, AtlasError>;

// ---------------------------------------------------------------------------
// AtlasError, the top-level aggregator
// ---------------------------------------------------------------------------

/// Top-level error type for the frame-atlas system.
///
/// Engine entry points return `CoreResult<T>`. Lower-level code returns the
/// module-specific error types below, which coerce into `AtlasError` via
/// [`From`].
#[derive(Debug, Error)]
pub enum AtlasError {
    /// A configuration validation or loading error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An input record or source error.
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// An input error raised mid-run, annotated with how far the run got.
    ///
    /// The originating engine still holds the state for those frames, so a
    /// caller can flush partial artifacts before surfacing the failure.
    #[error("Input failed after {frames_processed} frames: {source}")]
    InputAfter {
        /// Frames fully assigned before the failure.
        frames_processed: u64,
        /// The underlying input error.
        #[source]
        source: InputError,
    },

    /// A cluster store and distance matrix that do not describe the same
    /// cluster map.
    #[error("Consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    /// A raw I/O failure with no path context (artifact writes).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AtlasError {
    /// Wrap an [`InputError`] with the number of frames that were fully
    /// processed before it occurred.
    pub fn input_after(frames_processed: u64, source: InputError) -> Self {
        AtlasError::InputAfter {
            frames_processed,
            source,
        }
    }

    /// Whether results computed before this error are still valid and worth
    /// flushing.
    ///
    /// True only for input errors; configuration and consistency errors mean
    /// the run was invalid from the start.
    #[must_use]
    pub fn preserves_partial_results(&self) -> bool {
        matches!(self, AtlasError::Input(_) | AtlasError::InputAfter { .. })
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced when validating engine configuration or loading a run
/// configuration file.
///
/// These are surfaced before any frame is processed (or, for a dimension
/// mismatch, at the exact frame that violates the vector space) and never
/// leave partial artifacts behind.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A vector does not match the dimension of the run's vector space.
    #[error("Dimension mismatch: vector has {got} components, vector space has {expected}")]
    DimensionMismatch {
        /// Dimension the run is committed to.
        expected: usize,
        /// Dimension actually seen.
        got: usize,
    },

    /// Locate or embedding was invoked against an empty cluster map.
    #[error("Cluster map is empty: nothing to locate against")]
    EmptyClusterMap,

    /// A configuration file could not be read from disk.
    #[error("Cannot read config file `{path}`: {source}")]
    FileRead {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file contains malformed JSON.
    #[error("Cannot parse config file `{path}`: {source}")]
    FileParse {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying JSON parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// Construct a [`ConfigError::DimensionMismatch`].
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        ConfigError::DimensionMismatch { expected, got }
    }
}

// ---------------------------------------------------------------------------
// InputError
// ---------------------------------------------------------------------------

/// Errors produced while pulling vectors from a source or parsing persisted
/// artifacts back in.
///
/// Input errors are fatal for the run, but everything assigned before the
/// failing record remains valid and is reported by the engine that was
/// consuming the source.
#[derive(Debug, Error)]
pub enum InputError {
    /// A record could not be parsed at all.
    #[error("Malformed record in `{path}` at line {line}: {message}")]
    MalformedRecord {
        /// File the record came from.
        path: PathBuf,
        /// 1-based line number.
        line: u64,
        /// Description of the problem.
        message: String,
    },

    /// A record parsed but has the wrong number of components.
    #[error("Truncated record in `{path}` at line {line}: expected {expected} components, got {got}")]
    TruncatedRecord {
        /// File the record came from.
        path: PathBuf,
        /// 1-based line number.
        line: u64,
        /// Component count fixed by the first record.
        expected: usize,
        /// Component count actually present.
        got: usize,
    },

    /// The source itself could not be read.
    #[error("Cannot read `{path}`: {source}")]
    Read {
        /// Path being read when the error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl InputError {
    /// Construct an [`InputError::MalformedRecord`].
    pub fn malformed<S: Into<String>>(path: impl Into<PathBuf>, line: u64, msg: S) -> Self {
        InputError::MalformedRecord {
            path: path.into(),
            line,
            message: msg.into(),
        }
    }

    /// Construct an [`InputError::TruncatedRecord`].
    pub fn truncated(path: impl Into<PathBuf>, line: u64, expected: usize, got: usize) -> Self {
        InputError::TruncatedRecord {
            path: path.into(),
            line,
            expected,
            got,
        }
    }

    /// Construct an [`InputError::Read`].
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InputError::Read {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// ConsistencyError
// ---------------------------------------------------------------------------

/// Errors raised when a cluster store and a distance matrix do not describe
/// the same cluster map.
///
/// Pruning correctness in the locate engine depends on every matrix entry
/// being the true inter-anchor distance, so these are always fatal.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    /// Cluster count and matrix dimension disagree.
    #[error("Cluster store has {clusters} clusters but distance matrix is {matrix_dim}x{matrix_dim}")]
    StoreMatrixMismatch {
        /// Clusters in the store.
        clusters: usize,
        /// Rows (= columns) in the matrix.
        matrix_dim: usize,
    },

    /// A loaded matrix has `d(i,j) != d(j,i)` beyond tolerance.
    #[error("Distance matrix is asymmetric at ({i},{j}): {forward} vs {reverse}")]
    AsymmetricMatrix {
        /// Row index.
        i: usize,
        /// Column index.
        j: usize,
        /// Stored `d(i,j)`.
        forward: f64,
        /// Stored `d(j,i)`.
        reverse: f64,
    },

    /// A loaded matrix has a nonzero self-distance.
    #[error("Distance matrix has nonzero diagonal at {id}: {value}")]
    NonzeroDiagonal {
        /// Cluster id on the diagonal.
        id: usize,
        /// The offending value.
        value: f64,
    },

    /// A loaded matrix is missing an unordered pair entirely.
    #[error("Distance matrix has no entry for pair ({i},{j})")]
    MissingPair {
        /// Lower cluster id of the pair.
        i: usize,
        /// Higher cluster id of the pair.
        j: usize,
    },
}

impl ConsistencyError {
    /// Construct a [`ConsistencyError::StoreMatrixMismatch`].
    pub fn mismatch(clusters: usize, matrix_dim: usize) -> Self {
        ConsistencyError::StoreMatrixMismatch {
            clusters,
            matrix_dim,
        }
    }
}
