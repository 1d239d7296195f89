//! Learnable layer normalization.

use quill_core::{Result, Tensor, LAYER_NORM_EPS};

/// Layer normalization over the last dimension with scale `gamma` and shift `beta`.
pub struct LayerNorm {
    /// [d_model], initialised to ones
    pub(crate) gamma: Tensor,
    /// [d_model], initialised to zeros
    pub(crate) beta: Tensor,
    pub(crate) eps: f32,
}

impl LayerNorm {
    pub fn new(d_model: usize) -> Self {
        Self {
            gamma: Tensor::ones(&[d_model]),
            beta: Tensor::zeros(&[d_model]),
            eps: LAYER_NORM_EPS,
        }
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        x.layer_norm(&self.gamma, &self.beta, self.eps)
    }
}
