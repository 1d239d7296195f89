//! Standard scaled dot-product attention.
//!
//! Attention(Q, K, V) = softmax(mask(Q @ K^T / sqrt(d_k))) @ V

use quill_core::{QuillError, Result, Tensor};

use crate::mask::CausalMask;

/// Result of an attention call: the mixed values and the weights that mixed them.
#[derive(Clone, Debug)]
pub struct AttentionOutput {
    /// [seq_q, d_v]
    pub output: Tensor,
    /// Post-softmax weights, [seq_q, seq_k]
    pub weights: Tensor,
}

/// Scaled dot-product attention over single-head 2-D inputs.
///
/// # Arguments
/// * `query` - [seq, d_k]
/// * `key`   - [seq, d_k]
/// * `value` - [seq, d_v]
/// * `mask`  - optional causal mask of size `seq`
pub fn scaled_dot_product_attention(
    query: &Tensor,
    key: &Tensor,
    value: &Tensor,
    mask: Option<&CausalMask>,
) -> Result<AttentionOutput> {
    let (seq_q, d_k) = query.dims2("attention query")?;
    let (seq_k, d_k2) = key.dims2("attention key")?;
    let (seq_v, _) = value.dims2("attention value")?;

    if d_k != d_k2 {
        return Err(QuillError::shape("attention key", &[seq_k, d_k], key.dims()));
    }
    if seq_k != seq_v {
        return Err(QuillError::shape("attention value", &[seq_k], &[seq_v]));
    }
    if d_k == 0 {
        return Err(QuillError::InvalidArgument("attention: zero head dimension".into()));
    }

    let scale = 1.0 / (d_k as f32).sqrt();
    let mut scores = query.matmul(&key.transpose()?)?.mul_scalar(scale);

    if let Some(m) = mask {
        if m.len() != seq_q || seq_q != seq_k {
            return Err(QuillError::shape("causal mask", &[seq_q, seq_k], &[m.len(), m.len()]));
        }
        scores = m.apply(&scores)?;
    }

    let weights = scores.softmax(-1)?;
    let output = weights.matmul(value)?;

    Ok(AttentionOutput { output, weights })
}
