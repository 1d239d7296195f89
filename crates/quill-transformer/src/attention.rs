//! Single-head causal self-attention.
//!
//! Q = xWq, K = xWk, V = xWv → softmax(mask(QKᵀ/√D)) V → ·Wo
//!
//! One head, no multi-head splitting.

use quill_attention::{scaled_dot_product_attention, AttentionOutput, CausalMask};
use quill_core::{Result, Tensor};
use rand::Rng;

use crate::config::INIT_STD;

/// Self-attention projections. All four matrices are [d_model, d_model].
pub struct SelfAttention {
    pub(crate) wq: Tensor,
    pub(crate) wk: Tensor,
    pub(crate) wv: Tensor,
    pub(crate) wo: Tensor,
}

impl SelfAttention {
    pub fn new<R: Rng + ?Sized>(d_model: usize, rng: &mut R) -> Self {
        let dims = [d_model, d_model];
        Self {
            wq: Tensor::randn(&dims, INIT_STD, rng),
            wk: Tensor::randn(&dims, INIT_STD, rng),
            wv: Tensor::randn(&dims, INIT_STD, rng),
            wo: Tensor::randn(&dims, INIT_STD, rng),
        }
    }

    /// `x`: [seq_len, d_model] → [seq_len, d_model]
    pub fn forward(&self, x: &Tensor, mask: Option<&CausalMask>) -> Result<Tensor> {
        Ok(self.forward_with_weights(x, mask)?.output)
    }

    /// Forward pass that also returns the [seq_len, seq_len] attention weights.
    ///
    /// `output` already has the Wo projection applied.
    pub fn forward_with_weights(&self, x: &Tensor, mask: Option<&CausalMask>) -> Result<AttentionOutput> {
        let q = x.matmul(&self.wq)?;
        let k = x.matmul(&self.wk)?;
        let v = x.matmul(&self.wv)?;

        let attn = scaled_dot_product_attention(&q, &k, &v, mask)?;
        let output = attn.output.matmul(&self.wo)?;

        Ok(AttentionOutput { output, weights: attn.weights })
    }
}
