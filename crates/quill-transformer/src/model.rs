//! Full single-layer transformer model.
//!
//! Transformer = Embedding(+positions) → TransformerBlock → OutputHead(last position)

use std::ops::ControlFlow;

use quill_attention::causal_mask;
use quill_core::{QuillError, Result, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::block::TransformerBlock;
use crate::config::TransformerConfig;
use crate::embedding::Embedding;
use crate::head::OutputHead;
use crate::sampler;

/// Output of one forward pass.
#[derive(Clone, Debug)]
pub struct ForwardOutput {
    /// Logits for the token following the last position: [vocab_size]
    pub logits: Tensor,
    /// Final hidden states, exposed for introspection: [seq_len, embedding_dim]
    pub hidden: Tensor,
}

/// Single-head, single-layer causal transformer.
///
/// The model exclusively owns every parameter array. Only `load`,
/// `load_embeddings` and `train_step_output_head` replace weights;
/// `train_step` only appends to the training history.
pub struct Transformer {
    pub(crate) config: TransformerConfig,
    pub(crate) embedding: Embedding,
    pub(crate) block: TransformerBlock,
    pub(crate) head: OutputHead,
    pub(crate) history: Vec<f32>,
}

impl Transformer {
    /// Build a new transformer with random weights drawn from `rng`.
    pub fn new<R: Rng + ?Sized>(config: TransformerConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let d = config.embedding_dim;

        let embedding = Embedding::new(config.vocab_size, d, config.max_seq_len, rng);
        let block = TransformerBlock::new(d, rng);
        let head = OutputHead::new(d, config.vocab_size, rng);

        Ok(Self { config, embedding, block, head, history: Vec::new() })
    }

    /// Build a new transformer whose weights come from a seeded `StdRng`.
    pub fn with_seed(config: TransformerConfig, seed: u64) -> Result<Self> {
        Self::new(config, &mut StdRng::seed_from_u64(seed))
    }

    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }

    pub fn block(&self) -> &TransformerBlock {
        &self.block
    }

    pub fn head(&self) -> &OutputHead {
        &self.head
    }

    /// Losses recorded by every training step, oldest first.
    pub fn training_history(&self) -> &[f32] {
        &self.history
    }

    /// Forward pass: token ids → (logits for the next token, hidden states).
    ///
    /// `token_ids` must be non-empty, no longer than `max_seq_len`, and every
    /// id must lie in `[0, vocab_size)`.
    pub fn forward(&self, token_ids: &[usize], causal: bool) -> Result<ForwardOutput> {
        let x = self.embedding.forward(token_ids)?;
        tracing::debug!("embed → shape {:?}", x.dims());

        let mask = causal.then(|| causal_mask(token_ids.len()));
        let hidden = self.block.forward(&x, mask.as_ref())?;
        let logits = self.head.forward(&hidden)?;

        Ok(ForwardOutput { logits, hidden })
    }

    /// Attention weights of the single head: [seq_len, seq_len].
    ///
    /// `causal` selects the same masking as [`forward`](Self::forward).
    pub fn attention_weights(&self, token_ids: &[usize], causal: bool) -> Result<Tensor> {
        let x = self.embedding.forward(token_ids)?;
        let mask = causal.then(|| causal_mask(token_ids.len()));
        Ok(self.block.attn.forward_with_weights(&x, mask.as_ref())?.weights)
    }

    /// Sample the token that follows `token_ids`.
    ///
    /// Logits are divided by `temperature` (which must be > 0), turned into a
    /// distribution with softmax and sampled categorically from `rng`.
    pub fn predict_next_token<R: Rng + ?Sized>(
        &self,
        token_ids: &[usize],
        temperature: f32,
        rng: &mut R,
    ) -> Result<usize> {
        let out = self.forward(token_ids, true)?;
        sampler::sample(&out.logits, temperature, rng)
    }

    /// Generate exactly `max_new_tokens` tokens autoregressively.
    ///
    /// Before each step the context is cut to its last `max_seq_len` tokens,
    /// so older tokens silently leave the attention window.
    ///
    /// Returns: prompt followed by the generated tokens.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        prompt: &[usize],
        max_new_tokens: usize,
        temperature: f32,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        self.generate_with(prompt, max_new_tokens, temperature, rng, |_, _| ControlFlow::Continue(()))
    }

    /// [`generate`](Self::generate) with a per-token callback.
    ///
    /// `on_token(step, token)` runs after each sampled token. Returning
    /// `ControlFlow::Break(())` stops generation before the next step; the
    /// tokens produced so far are returned. Cancellation never interrupts a
    /// forward pass.
    pub fn generate_with<R, F>(
        &self,
        prompt: &[usize],
        max_new_tokens: usize,
        temperature: f32,
        rng: &mut R,
        mut on_token: F,
    ) -> Result<Vec<usize>>
    where
        R: Rng + ?Sized,
        F: FnMut(usize, usize) -> ControlFlow<()>,
    {
        if prompt.is_empty() {
            return Err(QuillError::InvalidArgument("prompt must not be empty".into()));
        }
        if max_new_tokens == 0 {
            return Err(QuillError::InvalidArgument("max_new_tokens must be positive".into()));
        }
        let v = self.config.vocab_size;
        if let Some(&bad) = prompt.iter().find(|&&t| t >= v) {
            return Err(QuillError::IndexOutOfRange { index: bad, bound: v });
        }

        let window = self.config.max_seq_len;
        let mut tokens = Vec::with_capacity(prompt.len() + max_new_tokens);
        tokens.extend_from_slice(prompt);

        for step in 0..max_new_tokens {
            let start = tokens.len().saturating_sub(window);
            let next = self.predict_next_token(&tokens[start..], temperature, rng)?;
            tokens.push(next);
            tracing::trace!("step {} → token {}", step, next);

            if on_token(step, next).is_break() {
                tracing::debug!("generation stopped by caller after {} tokens", step + 1);
                break;
            }
        }

        Ok(tokens)
    }

    /// Replace the token embedding table with a pre-trained [vocab_size, embedding_dim] matrix.
    ///
    /// On a shape mismatch a warning is logged, `ShapeMismatch` is returned
    /// and the existing embeddings are kept.
    pub fn load_embeddings(&mut self, weight: Tensor) -> Result<()> {
        self.embedding.load_weight(weight)
    }

    /// Named views of every parameter array, in persistence order.
    pub fn parameters(&self) -> Vec<(&'static str, &Tensor)> {
        vec![
            ("embedding.token", &self.embedding.weight),
            ("embedding.position", &self.embedding.pos_encoding),
            ("attention.wq", &self.block.attn.wq),
            ("attention.wk", &self.block.attn.wk),
            ("attention.wv", &self.block.attn.wv),
            ("attention.wo", &self.block.attn.wo),
            ("norm1.gamma", &self.block.norm1.gamma),
            ("norm1.beta", &self.block.norm1.beta),
            ("ffn.w1", &self.block.ffn.w1),
            ("ffn.b1", &self.block.ffn.b1),
            ("ffn.w2", &self.block.ffn.w2),
            ("ffn.b2", &self.block.ffn.b2),
            ("norm2.gamma", &self.block.norm2.gamma),
            ("norm2.beta", &self.block.norm2.beta),
            ("head.weight", &self.head.weight),
            ("head.bias", &self.head.bias),
        ]
    }

    pub(crate) fn parameters_mut(&mut self) -> Vec<(&'static str, &mut Tensor)> {
        vec![
            ("embedding.token", &mut self.embedding.weight),
            ("embedding.position", &mut self.embedding.pos_encoding),
            ("attention.wq", &mut self.block.attn.wq),
            ("attention.wk", &mut self.block.attn.wk),
            ("attention.wv", &mut self.block.attn.wv),
            ("attention.wo", &mut self.block.attn.wo),
            ("norm1.gamma", &mut self.block.norm1.gamma),
            ("norm1.beta", &mut self.block.norm1.beta),
            ("ffn.w1", &mut self.block.ffn.w1),
            ("ffn.b1", &mut self.block.ffn.b1),
            ("ffn.w2", &mut self.block.ffn.w2),
            ("ffn.b2", &mut self.block.ffn.b2),
            ("norm2.gamma", &mut self.block.norm2.gamma),
            ("norm2.beta", &mut self.block.norm2.beta),
            ("head.weight", &mut self.head.weight),
            ("head.bias", &mut self.head.bias),
        ]
    }

    /// Count total parameters, positional encoding included.
    pub fn param_count(&self) -> usize {
        self.parameters().iter().map(|(_, t)| t.numel()).sum()
    }
}
