//! Token embedding lookup plus fixed sinusoidal positional encoding.

use quill_core::{QuillError, Result, Tensor};
use rand::Rng;

use crate::config::INIT_STD;

/// Token embedding table + sinusoidal positional encoding.
///
/// Dimensions are read from the arrays.
pub struct Embedding {
    /// Learned weight matrix: [vocab_size, d_model]
    pub(crate) weight: Tensor,
    /// Positional encoding: [max_seq_len, d_model]. Deterministic, never trained.
    pub(crate) pos_encoding: Tensor,
}

impl Embedding {
    /// Create a new embedding layer with Gaussian token weights.
    pub fn new<R: Rng + ?Sized>(vocab_size: usize, d_model: usize, max_seq_len: usize, rng: &mut R) -> Self {
        Self {
            weight: Tensor::randn(&[vocab_size, d_model], INIT_STD, rng),
            pos_encoding: sinusoidal_encoding(max_seq_len, d_model),
        }
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn pos_encoding(&self) -> &Tensor {
        &self.pos_encoding
    }

    pub fn vocab_size(&self) -> usize {
        self.weight.dims()[0]
    }

    pub fn d_model(&self) -> usize {
        self.weight.dims()[1]
    }

    pub fn max_seq_len(&self) -> usize {
        self.pos_encoding.dims()[0]
    }

    /// Gather token rows: ids of length n → [n, d_model].
    pub fn token_embed(&self, token_ids: &[usize]) -> Result<Tensor> {
        let (vocab_size, d) = (self.vocab_size(), self.d_model());
        let w = self.weight.as_f32_slice();

        let mut out = vec![0.0f32; token_ids.len() * d];
        for (i, &tid) in token_ids.iter().enumerate() {
            if tid >= vocab_size {
                return Err(QuillError::IndexOutOfRange { index: tid, bound: vocab_size });
            }
            out[i * d..(i + 1) * d].copy_from_slice(&w[tid * d..(tid + 1) * d]);
        }
        Tensor::from_vec(out, &[token_ids.len(), d])
    }

    /// Token embeddings plus the first n rows of the positional encoding.
    pub fn forward(&self, token_ids: &[usize]) -> Result<Tensor> {
        let seq_len = token_ids.len();
        if seq_len == 0 {
            return Err(QuillError::InvalidArgument("empty token sequence".into()));
        }
        let max_seq_len = self.max_seq_len();
        if seq_len > max_seq_len {
            return Err(QuillError::InvalidArgument(format!(
                "sequence length {} exceeds max_seq_len {}",
                seq_len, max_seq_len
            )));
        }
        let tokens = self.token_embed(token_ids)?;
        tokens.add(&self.pos_encoding.slice_rows(0, seq_len)?)
    }

    /// Replace the token table wholesale.
    ///
    /// Anything but exactly [vocab_size, d_model] is rejected and the current
    /// table is left untouched.
    pub fn load_weight(&mut self, weight: Tensor) -> Result<()> {
        let expected = [self.vocab_size(), self.d_model()];
        if weight.dims() != expected {
            tracing::warn!(
                "rejecting token embeddings of shape {:?}, expected {:?}",
                weight.dims(),
                expected
            );
            return Err(QuillError::shape("token embeddings", &expected, weight.dims()));
        }
        self.weight = weight;
        Ok(())
    }
}

/// PE(pos, 2i) = sin(pos / 10000^(2i/D)), PE(pos, 2i+1) = cos(pos / 10000^(2i/D)).
///
/// With odd D the final column is a sine column with no cosine partner.
pub fn sinusoidal_encoding(max_len: usize, d_model: usize) -> Tensor {
    let data: Vec<f32> = (0..max_len * d_model)
        .map(|idx| {
            let pos = (idx / d_model) as f64;
            let dim = idx % d_model;
            let two_i = (dim - dim % 2) as f64;
            let angle = pos / 10000f64.powf(two_i / d_model as f64);
            if dim % 2 == 0 {
                angle.sin() as f32
            } else {
                angle.cos() as f32
            }
        })
        .collect();
    Tensor::from_f32(&data, &[max_len, d_model])
}
