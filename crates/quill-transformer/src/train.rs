//! Training step: cross-entropy loss and the output-layer gradient.
//!
//! `train_step` computes the loss and the gradient of the loss with respect to
//! the logits but applies nothing; it only records the loss. Updating weights
//! is a separate, explicitly named operation (`train_step_output_head`) that
//! touches the output head alone. Neither backpropagates into attention, the
//! feed-forward block or the embeddings.

use quill_core::{QuillError, Result, Tensor};

use crate::model::Transformer;

/// Epsilon added to the target probability before taking the log.
pub const LOG_EPS: f32 = 1e-10;

/// What a training step did.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum TrainOutcome {
    /// Loss and output gradient computed; no parameter was modified.
    LossOnly { loss: f32, output_grad: Tensor },
    /// Loss computed and one SGD step applied to the output head.
    OutputHeadUpdated {
        loss: f32,
        output_grad: Tensor,
        learning_rate: f32,
    },
}

impl TrainOutcome {
    pub fn loss(&self) -> f32 {
        match self {
            TrainOutcome::LossOnly { loss, .. } | TrainOutcome::OutputHeadUpdated { loss, .. } => *loss,
        }
    }

    /// dL/dlogits = probs − one_hot(target), shape [vocab_size].
    pub fn output_grad(&self) -> &Tensor {
        match self {
            TrainOutcome::LossOnly { output_grad, .. }
            | TrainOutcome::OutputHeadUpdated { output_grad, .. } => output_grad,
        }
    }

    /// True if any weight changed.
    pub fn applied_update(&self) -> bool {
        matches!(self, TrainOutcome::OutputHeadUpdated { .. })
    }
}

/// −log(probs[target] + ε)
pub fn cross_entropy(probs: &Tensor, target: usize) -> Result<f32> {
    let p = probs.as_f32_slice();
    let pt = p
        .get(target)
        .ok_or(QuillError::IndexOutOfRange { index: target, bound: p.len() })?;
    Ok(-(pt + LOG_EPS).ln())
}

/// probs − one_hot(target)
pub fn output_gradient(probs: &Tensor, target: usize) -> Result<Tensor> {
    let mut grad = probs.clone();
    let bound = grad.numel();
    let slot = grad
        .as_f32_slice_mut()
        .get_mut(target)
        .ok_or(QuillError::IndexOutOfRange { index: target, bound })?;
    *slot -= 1.0;
    Ok(grad)
}

/// Everything one step needs before deciding whether to update.
struct StepState {
    loss: f32,
    grad: Tensor,
    last_hidden: Tensor,
}

impl Transformer {
    fn step_state(&self, token_ids: &[usize], target_id: usize) -> Result<StepState> {
        let v = self.config.vocab_size;
        if target_id >= v {
            return Err(QuillError::IndexOutOfRange { index: target_id, bound: v });
        }
        let out = self.forward(token_ids, true)?;
        let probs = out.logits.softmax(-1)?;

        Ok(StepState {
            loss: cross_entropy(&probs, target_id)?,
            grad: output_gradient(&probs, target_id)?,
            last_hidden: out.hidden.last_row()?,
        })
    }

    /// Loss and output gradient for predicting `target_id` after `token_ids`,
    /// without recording or changing anything.
    pub fn evaluate_step(&self, token_ids: &[usize], target_id: usize) -> Result<TrainOutcome> {
        let state = self.step_state(token_ids, target_id)?;
        Ok(TrainOutcome::LossOnly { loss: state.loss, output_grad: state.grad })
    }

    /// One training step: forward, cross-entropy loss, output-layer gradient.
    ///
    /// The gradient is computed but not applied; weights are unchanged, so
    /// repeating the call with the same inputs returns the same loss. The
    /// loss is appended to the training history and returned.
    pub fn train_step(&mut self, token_ids: &[usize], target_id: usize) -> Result<f32> {
        let outcome = self.evaluate_step(token_ids, target_id)?;
        let loss = outcome.loss();
        self.history.push(loss);
        tracing::debug!("train_step loss={:.6} (no update applied)", loss);
        Ok(loss)
    }

    /// Training step that also applies one SGD update, scaled by
    /// `config.learning_rate`, to the output head:
    ///
    /// W ← W − lr · h_lastᵀ ⊗ g,  b ← b − lr · g
    ///
    /// The reported loss is the one measured before the update.
    pub fn train_step_output_head(&mut self, token_ids: &[usize], target_id: usize) -> Result<TrainOutcome> {
        let state = self.step_state(token_ids, target_id)?;
        let lr = self.config.learning_rate;
        let v = self.config.vocab_size;

        let g = state.grad.as_f32_slice();
        let h = state.last_hidden.as_f32_slice();
        let w = self.head.weight.as_f32_slice_mut();
        for (k, &hk) in h.iter().enumerate() {
            for (j, &gj) in g.iter().enumerate() {
                w[k * v + j] -= lr * hk * gj;
            }
        }
        for (b, &gj) in self.head.bias.as_f32_slice_mut().iter_mut().zip(g) {
            *b -= lr * gj;
        }

        self.history.push(state.loss);
        tracing::debug!("train_step_output_head loss={:.6} lr={}", state.loss, lr);

        Ok(TrainOutcome::OutputHeadUpdated {
            loss: state.loss,
            output_grad: state.grad,
            learning_rate: lr,
        })
    }
}
