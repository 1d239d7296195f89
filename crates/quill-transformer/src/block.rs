//! Transformer layer with post-norm residuals.
//!
//! h   = LayerNorm1(x + SelfAttention(x))
//! out = LayerNorm2(h + FFN(h))

use quill_attention::CausalMask;
use quill_core::{Result, Tensor};
use rand::Rng;

use crate::attention::SelfAttention;
use crate::feed_forward::FeedForward;
use crate::layer_norm::LayerNorm;

/// The model's single transformer layer.
pub struct TransformerBlock {
    pub(crate) attn: SelfAttention,
    pub(crate) norm1: LayerNorm,
    pub(crate) ffn: FeedForward,
    pub(crate) norm2: LayerNorm,
}

impl TransformerBlock {
    pub fn new<R: Rng + ?Sized>(d_model: usize, rng: &mut R) -> Self {
        Self {
            attn: SelfAttention::new(d_model, rng),
            norm1: LayerNorm::new(d_model),
            ffn: FeedForward::new(d_model, rng),
            norm2: LayerNorm::new(d_model),
        }
    }

    /// Forward pass.
    ///
    /// `x`: [seq_len, d_model]
    /// `mask`: causal mask, or `None` for bidirectional attention
    ///
    /// Returns: [seq_len, d_model]
    pub fn forward(&self, x: &Tensor, mask: Option<&CausalMask>) -> Result<Tensor> {
        // Residual first, then normalize
        let attn_out = self.attn.forward(x, mask)?;
        let h = self.norm1.forward(&x.add(&attn_out)?)?;

        let ffn_out = self.ffn.forward(&h)?;
        self.norm2.forward(&h.add(&ffn_out)?)
    }
}
