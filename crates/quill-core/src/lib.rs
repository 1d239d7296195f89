//! # quill-core
//!
//! Dense tensor type and numeric primitives for the Quill transformer.
//!
//! Provides:
//! - `Tensor`: row-major f32 array with a small-vector `Shape`
//! - Matrix arithmetic (matmul, elementwise add, bias broadcast, ReLU)
//! - Numerically stable `softmax` and epsilon-guarded `layer_norm`
//! - `QuillError`, the error type shared by every Quill crate

pub mod error;
pub mod ops;
pub mod shape;
pub mod tensor;

pub use error::QuillError;
pub use ops::norm::LAYER_NORM_EPS;
pub use shape::Shape;
pub use tensor::Tensor;

pub type Result<T> = std::result::Result<T, QuillError>;
