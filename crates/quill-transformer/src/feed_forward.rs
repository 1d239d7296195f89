//! Position-wise feed-forward network.
//!
//! FFN(x) = ReLU(x @ W1 + b1) @ W2 + b2, hidden width 4 × d_model.

use quill_core::{Result, Tensor};
use rand::Rng;

use crate::config::{FFN_EXPANSION, INIT_STD};

/// Two-layer ReLU MLP applied independently to every row.
pub struct FeedForward {
    /// Up projection: [d_model, d_ff]
    pub(crate) w1: Tensor,
    /// [d_ff]
    pub(crate) b1: Tensor,
    /// Down projection: [d_ff, d_model]
    pub(crate) w2: Tensor,
    /// [d_model]
    pub(crate) b2: Tensor,
}

impl FeedForward {
    pub fn new<R: Rng + ?Sized>(d_model: usize, rng: &mut R) -> Self {
        let d_ff = d_model * FFN_EXPANSION;
        Self {
            w1: Tensor::randn(&[d_model, d_ff], INIT_STD, rng),
            b1: Tensor::zeros(&[d_ff]),
            w2: Tensor::randn(&[d_ff, d_model], INIT_STD, rng),
            b2: Tensor::zeros(&[d_model]),
        }
    }

    /// Forward pass: x is [seq_len, d_model] → [seq_len, d_model]
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let hidden = x.matmul(&self.w1)?.add_bias(&self.b1)?.relu();
        hidden.matmul(&self.w2)?.add_bias(&self.b2)
    }
}
