//! Thread-safe handle around a single model.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use quill_core::{Result, Tensor};
use rand::Rng;

use crate::model::{ForwardOutput, Transformer};

/// Cloneable handle that serializes access to one `Transformer`.
///
/// Every call holds the lock for its whole duration, so a `train_step`
/// never observes a half-replaced set of weights.
#[derive(Clone)]
pub struct SharedTransformer {
    inner: Arc<Mutex<Transformer>>,
}

impl SharedTransformer {
    pub fn new(model: Transformer) -> Self {
        Self { inner: Arc::new(Mutex::new(model)) }
    }

    pub fn forward(&self, token_ids: &[usize], causal: bool) -> Result<ForwardOutput> {
        self.inner.lock().forward(token_ids, causal)
    }

    pub fn predict_next_token<R: Rng + ?Sized>(
        &self,
        token_ids: &[usize],
        temperature: f32,
        rng: &mut R,
    ) -> Result<usize> {
        self.inner.lock().predict_next_token(token_ids, temperature, rng)
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        prompt: &[usize],
        max_new_tokens: usize,
        temperature: f32,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        self.inner.lock().generate(prompt, max_new_tokens, temperature, rng)
    }

    pub fn train_step(&self, token_ids: &[usize], target_id: usize) -> Result<f32> {
        self.inner.lock().train_step(token_ids, target_id)
    }

    pub fn load_embeddings(&self, weight: Tensor) -> Result<()> {
        self.inner.lock().load_embeddings(weight)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        self.inner.lock().save(dir)
    }

    /// Run `f` with exclusive access to the model.
    pub fn with_model<T>(&self, f: impl FnOnce(&mut Transformer) -> T) -> T {
        f(&mut self.inner.lock())
    }
}
