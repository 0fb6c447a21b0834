//! Core trait definitions for the frame-atlas system.
//!
//! # Traits
//!
//! - [`VectorSource`]: pull-based supplier of fixed-dimension vectors, the
//!   seam between the engines and whatever produces frames (a file, an
//!   in-memory list, a live channel).
//! - [`Resettable`]: rewindable state, for engines and sources that can be
//!   reused across runs.
//!
//! # Design Philosophy
//!
//! The engines never reach into I/O themselves. Clustering *pulls* vectors
//! one at a time; `next_vector` is allowed to block, and that call is the
//! only suspension point in the whole pipeline. A source signals end of
//! stream with `Ok(None)` and a broken stream with an error; it never
//! silently drops a frame.

use ndarray::Array1;

use crate::error::CoreResult;

/// A pull-based sequence of fixed-dimension `f64` vectors.
///
/// The first vector a source yields fixes the dimension for the rest of the
/// stream. Sources backed by parsers must surface malformed data as
/// [`InputError`](crate::error::InputError) values carrying enough context
/// (path, line) for the caller to report the failing record.
///
/// # Example
///
/// ```ignore
/// use frame_atlas_core::VectorSource;
///
/// fn drain(source: &mut impl VectorSource) -> frame_atlas_core::CoreResult<u64> {
///     let mut n = 0;
///     while let Some(v) = source.next_vector()? {
///         let _ = v;
///         n += 1;
///     }
///     Ok(n)
/// }
/// ```
pub trait VectorSource {
    /// Pull the next vector, blocking if none is available yet.
    ///
    /// Returns `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source is unreadable or yields a
    /// malformed record.
    fn next_vector(&mut self) -> CoreResult<Option<Array1<f64>>>;

    /// The vector dimension, when the source knows it before yielding.
    ///
    /// Sources that discover the dimension from their first record return
    /// `None` until then.
    fn dim_hint(&self) -> Option<usize> {
        None
    }
}

/// State that can be rewound to its initial configuration.
pub trait Resettable {
    /// Reset to the state immediately after construction.
    fn reset(&mut self);
}
