//! Layer normalization over the last dimension.
//!
//! y = (x - mean) / sqrt(var + eps) * gamma + beta

use crate::error::QuillError;
use crate::tensor::Tensor;
use crate::Result;

/// Variance guard used by every layer norm in the model.
pub const LAYER_NORM_EPS: f32 = 1e-6;

impl Tensor {
    /// Normalize each row to zero mean and unit (biased) variance, then scale
    /// by `gamma` and shift by `beta`. Both must have the size of the last
    /// dimension.
    pub fn layer_norm(&self, gamma: &Tensor, beta: &Tensor, eps: f32) -> Result<Tensor> {
        let last_dim = *self
            .dims()
            .last()
            .ok_or_else(|| QuillError::InvalidArgument("layer_norm: empty shape".into()))?;
        gamma.expect_shape("layer_norm gamma", &[last_dim])?;
        beta.expect_shape("layer_norm beta", &[last_dim])?;
        if last_dim == 0 {
            return Ok(self.clone());
        }

        let g = gamma.as_f32_slice();
        let b = beta.as_f32_slice();
        let mut result = vec![0.0f32; self.numel()];

        for (src, dst) in self
            .as_f32_slice()
            .chunks_exact(last_dim)
            .zip(result.chunks_exact_mut(last_dim))
        {
            let mean: f32 = src.iter().sum::<f32>() / last_dim as f32;
            let var: f32 =
                src.iter().map(|&x| (x - mean) * (x - mean)).sum::<f32>() / last_dim as f32;
            let inv_std = 1.0 / (var + eps).sqrt();

            for i in 0..last_dim {
                dst[i] = (src[i] - mean) * inv_std * g[i] + b[i];
            }
        }

        Tensor::from_vec(result, self.dims())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn moments(row: &[f32]) -> (f32, f32) {
        let n = row.len() as f32;
        let mean = row.iter().sum::<f32>() / n;
        let var = row.iter().map(|&x| (x - mean) * (x - mean)).sum::<f32>() / n;
        (mean, var)
    }

    #[test]
    fn test_layer_norm_unit_moments() {
        let x = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0], &[2, 4]);
        let out = x
            .layer_norm(&Tensor::ones(&[4]), &Tensor::zeros(&[4]), LAYER_NORM_EPS)
            .unwrap();
        for r in 0..2 {
            let (mean, var) = moments(out.row(r).unwrap());
            assert!(mean.abs() < 1e-5, "mean {}", mean);
            assert!((var - 1.0).abs() < 1e-3, "var {}", var);
        }
    }

    #[test]
    fn test_layer_norm_constant_row_is_finite() {
        let x = Tensor::from_f32(&[3.0; 4], &[1, 4]);
        let out = x
            .layer_norm(&Tensor::ones(&[4]), &Tensor::zeros(&[4]), LAYER_NORM_EPS)
            .unwrap();
        assert!(out.as_f32_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_layer_norm_gamma_beta() {
        let x = Tensor::from_f32(&[-1.0, 1.0], &[1, 2]);
        let gamma = Tensor::from_f32(&[2.0, 2.0], &[2]);
        let beta = Tensor::from_f32(&[0.5, 0.5], &[2]);
        let out = x.layer_norm(&gamma, &beta, LAYER_NORM_EPS).unwrap();
        let d = out.as_f32_slice();
        assert!((d[0] - (-1.5)).abs() < 1e-4);
        assert!((d[1] - 2.5).abs() < 1e-4);
    }

    #[test]
    fn test_layer_norm_param_mismatch() {
        let x = Tensor::zeros(&[2, 4]);
        let err = x.layer_norm(&Tensor::ones(&[3]), &Tensor::zeros(&[4]), LAYER_NORM_EPS);
        assert!(matches!(err, Err(QuillError::ShapeMismatch { .. })));
    }

    proptest! {
        #[test]
        fn prop_layer_norm_zero_mean_unit_var(
            values in prop::collection::vec(-100.0f32..100.0, 8),
        ) {
            let (_, raw_var) = moments(&values);
            prop_assume!(raw_var > 1e-2);
            let x = Tensor::from_vec(values, &[1, 8]).unwrap();
            let out = x
                .layer_norm(&Tensor::ones(&[8]), &Tensor::zeros(&[8]), LAYER_NORM_EPS)
                .unwrap();
            let (mean, var) = moments(out.as_f32_slice());
            prop_assert!(mean.abs() < 1e-4);
            prop_assert!((var - 1.0).abs() < 1e-3);
        }
    }
}
