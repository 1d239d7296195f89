//! Model hyperparameters.

use std::path::Path;

use quill_core::{QuillError, Result};
use serde::{Deserialize, Serialize};

/// Standard deviation of the Gaussian used for every randomly initialised weight.
pub const INIT_STD: f32 = 0.02;

/// Width multiplier of the feed-forward hidden layer.
pub const FFN_EXPANSION: usize = 4;

/// Configuration for a transformer model.
///
/// All four values are fixed for the lifetime of a model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformerConfig {
    /// Vocabulary size V.
    pub vocab_size: usize,
    /// Embedding dimension D.
    pub embedding_dim: usize,
    /// Maximum sequence length L seen by attention.
    pub max_seq_len: usize,
    /// Step size used by `train_step_output_head`. Persisted with the model.
    pub learning_rate: f32,
}

impl TransformerConfig {
    pub fn new(vocab_size: usize, embedding_dim: usize, max_seq_len: usize, learning_rate: f32) -> Self {
        Self { vocab_size, embedding_dim, max_seq_len, learning_rate }
    }

    /// A tiny config for testing.
    pub fn tiny() -> Self {
        Self::new(5, 8, 4, 0.01)
    }

    /// A small config (~100K params).
    pub fn small() -> Self {
        Self::new(256, 64, 128, 1e-3)
    }

    /// Hidden width of the feed-forward block (4 × D).
    pub fn ffn_dim(&self) -> usize {
        self.embedding_dim * FFN_EXPANSION
    }

    /// Reject configurations no model can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 {
            return Err(QuillError::InvalidArgument("vocab_size must be positive".into()));
        }
        if self.embedding_dim == 0 {
            return Err(QuillError::InvalidArgument("embedding_dim must be positive".into()));
        }
        if self.max_seq_len == 0 {
            return Err(QuillError::InvalidArgument("max_seq_len must be positive".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(QuillError::InvalidArgument(format!(
                "learning_rate must be finite and non-negative, got {}",
                self.learning_rate
            )));
        }
        if self.checked_param_bytes().is_none() {
            return Err(QuillError::InvalidArgument(format!(
                "model size overflows usize (vocab_size={}, embedding_dim={}, max_seq_len={})",
                self.vocab_size, self.embedding_dim, self.max_seq_len
            )));
        }
        Ok(())
    }

    /// Name and shape of every parameter array, in persistence order.
    ///
    /// Call only on a validated config; `ffn_dim` is unchecked.
    pub fn parameter_shapes(&self) -> Vec<(&'static str, Vec<usize>)> {
        let (v, d, l, ff) = (self.vocab_size, self.embedding_dim, self.max_seq_len, self.ffn_dim());
        vec![
            ("embedding.token", vec![v, d]),
            ("embedding.position", vec![l, d]),
            ("attention.wq", vec![d, d]),
            ("attention.wk", vec![d, d]),
            ("attention.wv", vec![d, d]),
            ("attention.wo", vec![d, d]),
            ("norm1.gamma", vec![d]),
            ("norm1.beta", vec![d]),
            ("ffn.w1", vec![d, ff]),
            ("ffn.b1", vec![ff]),
            ("ffn.w2", vec![ff, d]),
            ("ffn.b2", vec![d]),
            ("norm2.gamma", vec![d]),
            ("norm2.beta", vec![d]),
            ("head.weight", vec![d, v]),
            ("head.bias", vec![v]),
        ]
    }

    /// Total f32 storage of all parameters in bytes, or `None` on overflow.
    fn checked_param_bytes(&self) -> Option<usize> {
        self.embedding_dim.checked_mul(FFN_EXPANSION)?;
        let elements = self.parameter_shapes().iter().try_fold(0usize, |acc, (_, dims)| {
            let n = dims.iter().try_fold(1usize, |n, &d| n.checked_mul(d))?;
            acc.checked_add(n)
        })?;
        elements.checked_mul(std::mem::size_of::<f32>())
    }

    /// Load and validate a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: TransformerConfig = serde_json::from_str(&data)
            .map_err(|e| QuillError::ParseError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }
}
