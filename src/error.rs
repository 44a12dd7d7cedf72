//! Error taxonomy for the normalization core.
//!
//! Every fallible library call returns [`Result<T>`].  Non-finite values
//! produced by a degenerate PSD are *not* reported here automatically; see
//! [`crate::normalizer::ensure_finite`].
use thiserror::Error;

/// Errors raised by the spectral estimator, barycenter tracker, filter
/// builder and normalizer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TmaError {
    /// Malformed segment length, overlap, window kind, momentum or axis, or a
    /// filter size incompatible with the input time length.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Batch / channel / frequency axes disagree with what was expected.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// Shape the operation expected.
        expected: Vec<usize>,
        /// Shape it was given.
        found: Vec<usize>,
    },

    /// Non-finite values found by an explicit finiteness check.
    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    /// Window index past the end of a dataset.
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of windows in the dataset.
        len: usize,
    },
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, TmaError>;

impl TmaError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        TmaError::InvalidConfiguration(msg.into())
    }

    pub(crate) fn shape(expected: &[usize], found: &[usize]) -> Self {
        TmaError::ShapeMismatch {
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}
