//! Vector sources: the supply side of every engine run.
//!
//! Three implementations cover the pipeline's needs:
//!
//! - [`InMemorySource`]: a pre-built list, used by tests and callers that
//!   already hold their vectors.
//! - [`TextVectorSource`]: streaming parser for the whitespace-separated
//!   text format, one frame per line.
//! - [`ChannelSource`]: live feed over an `mpsc` channel, for callers that
//!   produce frames on another thread.

use ndarray::Array1;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use frame_atlas_core::error::{CoreResult, InputError};
use frame_atlas_core::{Resettable, VectorSource};

/// Write vectors in the text format [`TextVectorSource`] reads: one frame
/// per line, six-decimal components separated by spaces.
///
/// # Errors
///
/// Returns the underlying I/O error on failure.
pub fn write_vectors(path: &Path, vectors: &[Array1<f64>]) -> CoreResult<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for v in vectors {
        let mut first = true;
        for component in v.iter() {
            if first {
                write!(w, "{component:.6}")?;
                first = false;
            } else {
                write!(w, " {component:.6}")?;
            }
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// InMemorySource
// ---------------------------------------------------------------------------

/// A [`VectorSource`] over a pre-built vector list.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    vectors: Vec<Array1<f64>>,
    cursor: usize,
}

impl InMemorySource {
    /// Wrap an existing vector list.
    #[must_use]
    pub fn new(vectors: Vec<Array1<f64>>) -> Self {
        InMemorySource { vectors, cursor: 0 }
    }

    /// Build a source from plain `Vec<f64>` rows.
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self::new(rows.into_iter().map(Array1::from_vec).collect())
    }

    /// Number of vectors in the source, consumed or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the source holds no vectors at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl VectorSource for InMemorySource {
    fn next_vector(&mut self) -> CoreResult<Option<Array1<f64>>> {
        let next = self.vectors.get(self.cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        Ok(next)
    }

    fn dim_hint(&self) -> Option<usize> {
        self.vectors.first().map(Array1::len)
    }
}

impl Resettable for InMemorySource {
    fn reset(&mut self) {
        self.cursor = 0;
    }
}

// ---------------------------------------------------------------------------
// TextVectorSource
// ---------------------------------------------------------------------------

/// Streaming parser for the one-frame-per-line text format.
///
/// Each non-empty line holds one vector as whitespace-separated decimal
/// components. Blank lines and lines starting with `#` are skipped. The
/// first data line fixes the component count; later lines with a different
/// count fail with [`InputError::TruncatedRecord`].
#[derive(Debug)]
pub struct TextVectorSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: u64,
    expected_dim: Option<usize>,
}

impl TextVectorSource {
    /// Open `path` for streaming.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Read`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| InputError::read(&path, e))?;
        Ok(TextVectorSource {
            path,
            lines: BufReader::new(file).lines(),
            line_no: 0,
            expected_dim: None,
        })
    }

    /// The file this source reads from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_line(&mut self, line: &str) -> CoreResult<Array1<f64>> {
        let mut components = Vec::new();
        for token in line.split_whitespace() {
            let value: f64 = token.parse().map_err(|_| {
                InputError::malformed(
                    &self.path,
                    self.line_no,
                    format!("not a number: {token:?}"),
                )
            })?;
            components.push(value);
        }
        match self.expected_dim {
            Some(expected) if components.len() != expected => Err(InputError::truncated(
                &self.path,
                self.line_no,
                expected,
                components.len(),
            )
            .into()),
            Some(_) => Ok(Array1::from_vec(components)),
            None => {
                self.expected_dim = Some(components.len());
                Ok(Array1::from_vec(components))
            }
        }
    }
}

impl VectorSource for TextVectorSource {
    fn next_vector(&mut self) -> CoreResult<Option<Array1<f64>>> {
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Err(InputError::read(&self.path, e).into()),
                None => return Ok(None),
            };
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return self.parse_line(trimmed).map(Some);
        }
    }

    fn dim_hint(&self) -> Option<usize> {
        self.expected_dim
    }
}

// ---------------------------------------------------------------------------
// ChannelSource
// ---------------------------------------------------------------------------

/// A [`VectorSource`] fed by another thread over an `mpsc` channel.
///
/// `next_vector` blocks until a frame arrives. Dropping every sender ends
/// the stream cleanly with `Ok(None)`, so a producer shutting down looks
/// like end of input rather than an error.
pub struct ChannelSource {
    receiver: Receiver<Array1<f64>>,
}

impl ChannelSource {
    /// Wrap the receiving half of a channel.
    #[must_use]
    pub fn new(receiver: Receiver<Array1<f64>>) -> Self {
        ChannelSource { receiver }
    }
}

impl VectorSource for ChannelSource {
    fn next_vector(&mut self) -> CoreResult<Option<Array1<f64>>> {
        match self.receiver.recv() {
            Ok(v) => Ok(Some(v)),
            Err(_) => Ok(None),
        }
    }
}
