//! # quill-transformer
//!
//! A minimal single-layer, single-head causal transformer:
//! - `Embedding`: token lookup plus fixed sinusoidal positional encoding
//! - `SelfAttention`: single-head scaled dot-product self-attention
//! - `FeedForward`: two-layer ReLU MLP with 4x expansion
//! - `TransformerBlock`: attention and FFN sublayers (post-norm)
//! - `OutputHead`: vocabulary projection of the last position
//! - `Transformer`: forward pass, sampling, generation, train step, save/load

pub mod attention;
pub mod block;
pub mod config;
pub mod embedding;
pub mod feed_forward;
pub mod head;
pub mod layer_norm;
pub mod model;
pub mod sampler;
pub mod serialization;
pub mod shared;
pub mod train;
pub mod vocab;

pub use attention::SelfAttention;
pub use block::TransformerBlock;
pub use config::TransformerConfig;
pub use embedding::Embedding;
pub use feed_forward::FeedForward;
pub use head::OutputHead;
pub use layer_norm::LayerNorm;
pub use model::{ForwardOutput, Transformer};
pub use serialization::{load_tensor, load_tensors, save_tensors};
pub use shared::SharedTransformer;
pub use train::TrainOutcome;
pub use vocab::Vocabulary;
