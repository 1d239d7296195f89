//! Causal attention masks.

use quill_core::{QuillError, Result, Tensor};

/// Score written into masked positions before softmax.
///
/// Large enough to drive the weight to zero after max-subtraction, finite so
/// a fully-masked row can never produce NaN.
pub const MASK_FILL: f32 = -1e9;

/// Boolean [n, n] mask where `true` marks a position that may NOT be attended.
///
/// Entry (i, j) is `true` exactly when j > i, i.e. the mask is strictly
/// upper-triangular.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CausalMask {
    size: usize,
    masked: Vec<bool>,
}

/// Create the causal mask for a sequence of length `seq_len`.
pub fn causal_mask(seq_len: usize) -> CausalMask {
    let mut masked = vec![false; seq_len * seq_len];
    for i in 0..seq_len {
        for j in (i + 1)..seq_len {
            masked[i * seq_len + j] = true;
        }
    }
    CausalMask { size: seq_len, masked }
}

impl CausalMask {
    /// Sequence length the mask was built for.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// True if query position `i` must not see key position `j`.
    pub fn is_masked(&self, i: usize, j: usize) -> bool {
        self.masked[i * self.size + j]
    }

    /// Row-major boolean entries.
    pub fn as_slice(&self) -> &[bool] {
        &self.masked
    }

    /// Overwrite masked entries of an [n, n] score matrix with [`MASK_FILL`].
    pub fn apply(&self, scores: &Tensor) -> Result<Tensor> {
        if scores.dims() != [self.size, self.size] {
            return Err(QuillError::shape(
                "causal mask",
                &[self.size, self.size],
                scores.dims(),
            ));
        }
        let mut out = scores.clone();
        for (v, &m) in out.as_f32_slice_mut().iter_mut().zip(&self.masked) {
            if m {
                *v = MASK_FILL;
            }
        }
        Ok(out)
    }
}
