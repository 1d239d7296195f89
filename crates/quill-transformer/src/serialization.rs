//! Model save/load.
//!
//! A saved model is a directory holding:
//! - `config.json`: format version, hyperparameters, training history
//! - `weights.safetensors`: every parameter array as little-endian f32
//!
//! Round-tripping through this format is bit-exact.

use std::collections::HashMap;
use std::path::Path;

use quill_core::{QuillError, Result, Tensor};
use safetensors::tensor::{serialize, TensorView};
use safetensors::SafeTensors;
use serde::{Deserialize, Serialize};

use crate::config::TransformerConfig;
use crate::model::Transformer;

pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_FILE: &str = "weights.safetensors";
pub const FORMAT_VERSION: u32 = 1;

/// Contents of `config.json`.
#[derive(Serialize, Deserialize, Debug)]
struct Manifest {
    format_version: u32,
    config: TransformerConfig,
    training_history: Vec<f32>,
}

impl Transformer {
    /// Save the model into directory `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            config: self.config.clone(),
            training_history: self.history.clone(),
        };
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| QuillError::StorageError(format!("config serialize error: {}", e)))?;
        std::fs::write(dir.join(CONFIG_FILE), json)?;

        save_tensors(&self.parameters(), &dir.join(WEIGHTS_FILE))?;

        tracing::info!(
            "saved model ({} params, {} history entries) to {}",
            self.param_count(),
            self.history.len(),
            dir.display()
        );
        Ok(())
    }

    /// Load a model previously written by [`save`](Self::save).
    ///
    /// Fails with `ParseError` on a malformed config or a missing tensor and
    /// with `ShapeMismatch` if any tensor disagrees with the stored
    /// hyperparameters. Shapes are checked before any model memory is
    /// allocated.
    pub fn load(dir: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(dir.join(CONFIG_FILE))?;
        let manifest: Manifest = serde_json::from_str(&json)
            .map_err(|e| QuillError::ParseError(format!("{}: {}", CONFIG_FILE, e)))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(QuillError::ParseError(format!(
                "unsupported format version {} (expected {})",
                manifest.format_version, FORMAT_VERSION
            )));
        }
        manifest
            .config
            .validate()
            .map_err(|e| QuillError::ParseError(format!("{}: {}", CONFIG_FILE, e)))?;

        let tensors = load_tensors(&dir.join(WEIGHTS_FILE))?;
        check_state(&manifest.config, &tensors)?;

        // Placeholder weights, every array is replaced below.
        let mut model = Transformer::with_seed(manifest.config, 0)?;
        model.load_state_dict(tensors)?;
        model.history = manifest.training_history;

        tracing::info!(
            "loaded model vocab={} dim={} max_seq_len={} from {}",
            model.config.vocab_size,
            model.config.embedding_dim,
            model.config.max_seq_len,
            dir.display()
        );
        Ok(model)
    }

    /// Replace every parameter from `state`.
    ///
    /// All names and shapes are checked before anything is written, so a
    /// failed call leaves the model untouched.
    pub fn load_state_dict(&mut self, mut state: HashMap<String, Tensor>) -> Result<()> {
        check_state(&self.config, &state)?;
        for (name, slot) in self.parameters_mut() {
            if let Some(t) = state.remove(name) {
                *slot = t;
            }
        }
        for extra in state.keys() {
            tracing::warn!("ignoring unknown tensor {}", extra);
        }
        Ok(())
    }
}

/// Every parameter `config` declares must be present with its exact shape.
fn check_state(config: &TransformerConfig, state: &HashMap<String, Tensor>) -> Result<()> {
    for (name, dims) in config.parameter_shapes() {
        let loaded = state
            .get(name)
            .ok_or_else(|| QuillError::ParseError(format!("missing tensor {}", name)))?;
        loaded.expect_shape(name, &dims)?;
    }
    Ok(())
}

/// Write named tensors to a safetensors file as F32.
pub fn save_tensors(tensors: &[(&str, &Tensor)], path: &Path) -> Result<()> {
    let buffers: Vec<Vec<u8>> = tensors
        .iter()
        .map(|(_, t)| t.as_f32_slice().iter().flat_map(|f| f.to_le_bytes()).collect())
        .collect();

    let mut views = Vec::with_capacity(tensors.len());
    for ((name, tensor), bytes) in tensors.iter().zip(&buffers) {
        let view = TensorView::new(safetensors::Dtype::F32, tensor.dims().to_vec(), bytes)
            .map_err(|e| QuillError::StorageError(format!("safetensors view error: {}", e)))?;
        views.push((*name, view));
    }

    let metadata: HashMap<String, String> =
        HashMap::from([("format".to_string(), "quill".to_string())]);
    let serialized = serialize(views, &Some(metadata))
        .map_err(|e| QuillError::StorageError(format!("safetensors serialize error: {}", e)))?;

    std::fs::write(path, serialized)?;
    Ok(())
}

/// Read every tensor in a safetensors file, converting to f32.
pub fn load_tensors(path: &Path) -> Result<HashMap<String, Tensor>> {
    let data = std::fs::read(path)?;
    let st = SafeTensors::deserialize(&data)
        .map_err(|e| QuillError::ParseError(format!("{}: {}", path.display(), e)))?;

    let mut tensors = HashMap::new();
    for (name, view) in st.tensors() {
        let tensor = view_to_tensor(&view)?;
        tensors.insert(name, tensor);
    }
    Ok(tensors)
}

/// Read a single named tensor, e.g. a pre-trained embedding matrix.
pub fn load_tensor(path: &Path, name: &str) -> Result<Tensor> {
    let data = std::fs::read(path)?;
    let st = SafeTensors::deserialize(&data)
        .map_err(|e| QuillError::ParseError(format!("{}: {}", path.display(), e)))?;
    let view = st
        .tensor(name)
        .map_err(|_| QuillError::ParseError(format!("tensor {} not found in {}", name, path.display())))?;
    view_to_tensor(&view)
}

/// Convert a safetensors TensorView to a quill Tensor (f32).
fn view_to_tensor(view: &TensorView<'_>) -> Result<Tensor> {
    let shape: Vec<usize> = view.shape().to_vec();
    let data = view.data();

    let f32_data: Vec<f32> = match view.dtype() {
        safetensors::Dtype::F32 => data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        safetensors::Dtype::F16 => data
            .chunks_exact(2)
            .map(|b| half::f16::from_bits(u16::from_le_bytes([b[0], b[1]])).to_f32())
            .collect(),
        safetensors::Dtype::BF16 => data
            .chunks_exact(2)
            .map(|b| half::bf16::from_bits(u16::from_le_bytes([b[0], b[1]])).to_f32())
            .collect(),
        other => {
            return Err(QuillError::ParseError(format!(
                "unsupported safetensors dtype: {:?}",
                other
            )));
        }
    };

    Tensor::from_vec(f32_data, &shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("quill_ser_{}_{}", tag, std::process::id()))
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut model = Transformer::with_seed(TransformerConfig::tiny(), 5).unwrap();
        model.train_step(&[0, 1], 2).unwrap();
        model.train_step(&[3], 4).unwrap();

        let dir = temp_dir("roundtrip");
        model.save(&dir).unwrap();
        assert!(dir.join(CONFIG_FILE).exists());
        assert!(dir.join(WEIGHTS_FILE).exists());

        let loaded = Transformer::load(&dir).unwrap();
        assert_eq!(loaded.config, model.config);
        assert_eq!(loaded.training_history(), model.training_history());
        for ((na, a), (nb, b)) in model.parameters().into_iter().zip(loaded.parameters()) {
            assert_eq!(na, nb);
            assert_eq!(a, b, "parameter {} differs", na);
        }
        assert_eq!(
            model.forward(&[1, 2, 3], true).unwrap().logits,
            loaded.forward(&[1, 2, 3], true).unwrap().logits
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_field_is_parse_error() {
        let model = Transformer::with_seed(TransformerConfig::tiny(), 0).unwrap();
        let dir = temp_dir("missing_field");
        model.save(&dir).unwrap();
        std::fs::write(
            dir.join(CONFIG_FILE),
            r#"{"format_version": 1, "config": {"vocab_size": 5}, "training_history": []}"#,
        )
        .unwrap();
        assert!(matches!(Transformer::load(&dir), Err(QuillError::ParseError(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_shape_mismatch() {
        let model = Transformer::with_seed(TransformerConfig::tiny(), 0).unwrap();
        let dir = temp_dir("shape");
        model.save(&dir).unwrap();

        // Declare a wider embedding than the stored weights have.
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            config: TransformerConfig::new(5, 10, 4, 0.01),
            training_history: vec![],
        };
        std::fs::write(dir.join(CONFIG_FILE), serde_json::to_string(&manifest).unwrap()).unwrap();
        assert!(matches!(Transformer::load(&dir), Err(QuillError::ShapeMismatch { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_overflowing_config_is_parse_error() {
        let model = Transformer::with_seed(TransformerConfig::tiny(), 0).unwrap();
        let dir = temp_dir("overflow");
        model.save(&dir).unwrap();
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            config: TransformerConfig::new(usize::MAX / 4, 8, 4, 0.01),
            training_history: vec![],
        };
        std::fs::write(dir.join(CONFIG_FILE), serde_json::to_string(&manifest).unwrap()).unwrap();
        assert!(matches!(Transformer::load(&dir), Err(QuillError::ParseError(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_huge_config_rejected_by_shape_check() {
        // Fits in usize but would need terabytes of placeholder weights.
        let model = Transformer::with_seed(TransformerConfig::tiny(), 0).unwrap();
        let dir = temp_dir("huge");
        model.save(&dir).unwrap();
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            config: TransformerConfig::new(1 << 40, 8, 4, 0.01),
            training_history: vec![],
        };
        std::fs::write(dir.join(CONFIG_FILE), serde_json::to_string(&manifest).unwrap()).unwrap();
        assert!(matches!(Transformer::load(&dir), Err(QuillError::ShapeMismatch { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_tensor() {
        let model = Transformer::with_seed(TransformerConfig::tiny(), 0).unwrap();
        let dir = temp_dir("missing_tensor");
        model.save(&dir).unwrap();
        let partial: Vec<(&str, &Tensor)> =
            model.parameters().into_iter().filter(|(n, _)| *n != "head.bias").collect();
        save_tensors(&partial, &dir.join(WEIGHTS_FILE)).unwrap();
        assert!(matches!(Transformer::load(&dir), Err(QuillError::ParseError(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_state_dict_is_atomic() {
        let mut model = Transformer::with_seed(TransformerConfig::tiny(), 0).unwrap();
        let before = model.block.ffn.w1.clone();
        let mut state: HashMap<String, Tensor> = model
            .parameters()
            .into_iter()
            .map(|(n, t)| (n.to_string(), Tensor::zeros(t.dims())))
            .collect();
        state.insert("head.bias".into(), Tensor::zeros(&[6]));
        assert!(model.load_state_dict(state).is_err());
        assert_eq!(model.block.ffn.w1, before);
    }

    #[test]
    fn test_load_tensor_f16() {
        let path = temp_dir("f16").with_extension("safetensors");
        let bytes: Vec<u8> = [1.0f32, -0.5, 2.0]
            .iter()
            .flat_map(|&v| half::f16::from_f32(v).to_bits().to_le_bytes())
            .collect();
        let view = TensorView::new(safetensors::Dtype::F16, vec![3], &bytes).unwrap();
        let serialized = serialize(vec![("emb", view)], &None).unwrap();
        std::fs::write(&path, serialized).unwrap();

        let t = load_tensor(&path, "emb").unwrap();
        assert_eq!(t.as_f32_slice(), &[1.0, -0.5, 2.0]);
        assert!(matches!(load_tensor(&path, "nope"), Err(QuillError::ParseError(_))));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_save_fails_when_dir_cannot_be_created() {
        let file = temp_dir("blocker");
        std::fs::write(&file, b"not a directory").unwrap();
        let model = Transformer::with_seed(TransformerConfig::tiny(), 0).unwrap();
        assert!(model.save(&file.join("nested")).is_err());
        let _ = std::fs::remove_file(&file);
    }
}
