//! Tensor operations: arithmetic, manipulation, normalization.
//!
//! All operations return new tensors (functional style) and fail with
//! `QuillError::ShapeMismatch` when operand shapes disagree.

pub mod arithmetic;
pub mod manipulation;
pub mod norm;
