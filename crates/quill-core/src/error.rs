//! Error type shared by every Quill crate.

use thiserror::Error;

/// Errors raised by tensor operations, model construction and persistence.
#[derive(Error, Debug)]
pub enum QuillError {
    /// Dimensions of an input, parameter or loaded array disagree.
    #[error("shape mismatch in {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// A token id (or other index) fell outside `[0, bound)`.
    #[error("index {index} out of range (bound {bound})")]
    IndexOutOfRange { index: usize, bound: usize },

    /// Caller supplied a value the operation cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A persisted model or tensor file is malformed or incomplete.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Serializing or writing model data failed.
    #[error("storage error: {0}")]
    StorageError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuillError {
    /// Shorthand for building a `ShapeMismatch`.
    pub fn shape(what: impl Into<String>, expected: &[usize], got: &[usize]) -> Self {
        QuillError::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}
