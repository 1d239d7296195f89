//! Output projection from the final hidden state to vocabulary logits.

use quill_core::{Result, Tensor};
use rand::Rng;

use crate::config::INIT_STD;

/// logits = hidden[-1] · W + b
pub struct OutputHead {
    /// [d_model, vocab_size]
    pub(crate) weight: Tensor,
    /// [vocab_size]
    pub(crate) bias: Tensor,
}

impl OutputHead {
    pub fn new<R: Rng + ?Sized>(d_model: usize, vocab_size: usize, rng: &mut R) -> Self {
        Self {
            weight: Tensor::randn(&[d_model, vocab_size], INIT_STD, rng),
            bias: Tensor::zeros(&[vocab_size]),
        }
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Project the last row of `hidden` ([seq_len, d_model]) to [vocab_size] logits.
    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        let last = hidden.last_row()?;
        last.matmul(&self.weight)?.add_bias(&self.bias)
    }
}
