//! # quill-attention
//!
//! Attention primitives for Quill.
//!
//! Provides:
//! - Causal (strictly upper-triangular) boolean masks
//! - Scaled dot-product attention that also exposes its weights

pub mod mask;
pub mod scaled_dot;

pub use mask::{causal_mask, CausalMask, MASK_FILL};
pub use scaled_dot::{scaled_dot_product_attention, AttentionOutput};
