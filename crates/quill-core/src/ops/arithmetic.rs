//! Element-wise addition, bias broadcast, ReLU and matrix multiplication.

use crate::error::QuillError;
use crate::tensor::Tensor;
use crate::Result;

impl Tensor {
    /// Element-wise addition of two tensors with identical shapes.
    pub fn add(&self, other: &Tensor) -> Result<Tensor> {
        binary_op(self, other, "add", |a, b| a + b)
    }

    pub fn mul_scalar(&self, scalar: f32) -> Tensor {
        unary_op(self, |a| a * scalar)
    }

    /// Rectified linear unit: max(0, x).
    pub fn relu(&self) -> Tensor {
        unary_op(self, |a| a.max(0.0))
    }

    /// Add a bias vector to every row: [M, N] + [N] → [M, N].
    ///
    /// A rank-1 `self` of length N is treated as a single row.
    pub fn add_bias(&self, bias: &Tensor) -> Result<Tensor> {
        let cols = *self.dims().last().unwrap_or(&0);
        if bias.dims() != [cols] {
            return Err(QuillError::shape("add_bias", &[cols], bias.dims()));
        }
        let b = bias.as_f32_slice();
        let mut out = self.as_f32_slice().to_vec();
        for row in out.chunks_exact_mut(cols.max(1)) {
            for (v, &bv) in row.iter_mut().zip(b) {
                *v += bv;
            }
        }
        Tensor::from_vec(out, self.dims())
    }

    /// Matrix multiplication.
    ///
    /// Supports:
    /// - [M, K] @ [K, N] → [M, N]
    /// - [K] @ [K, N] → [N] (row vector times matrix)
    pub fn matmul(&self, other: &Tensor) -> Result<Tensor> {
        match (self.ndim(), other.ndim()) {
            (2, 2) => matmul_2d(self, other),
            (1, 2) => vecmat(self, other),
            _ => Err(QuillError::shape("matmul", self.dims(), other.dims())),
        }
    }
}

fn unary_op(a: &Tensor, op: impl Fn(f32) -> f32) -> Tensor {
    let result: Vec<f32> = a.as_f32_slice().iter().map(|&v| op(v)).collect();
    Tensor::from_f32(&result, a.dims())
}

fn binary_op(a: &Tensor, b: &Tensor, what: &str, op: impl Fn(f32, f32) -> f32) -> Result<Tensor> {
    if a.shape() != b.shape() {
        return Err(QuillError::shape(what, a.dims(), b.dims()));
    }
    let result: Vec<f32> = a
        .as_f32_slice()
        .iter()
        .zip(b.as_f32_slice())
        .map(|(&x, &y)| op(x, y))
        .collect();
    Ok(Tensor::from_f32(&result, a.dims()))
}

/// 2D matrix multiplication: [M, K] @ [K, N] → [M, N]
fn matmul_2d(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    let (m, k1) = a.dims2("matmul lhs")?;
    let (k2, n) = b.dims2("matmul rhs")?;
    if k1 != k2 {
        return Err(QuillError::ShapeMismatch {
            what: "matmul inner dimension".into(),
            expected: vec![m, k1],
            got: vec![k2, n],
        });
    }

    let a_data = a.as_f32_slice();
    let b_data = b.as_f32_slice();
    let mut c = vec![0.0f32; m * n];

    // i-k-j loop order keeps the inner loop streaming over contiguous rows of B.
    for i in 0..m {
        let c_row = &mut c[i * n..(i + 1) * n];
        for p in 0..k1 {
            let a_ip = a_data[i * k1 + p];
            if a_ip == 0.0 {
                continue;
            }
            let b_row = &b_data[p * n..(p + 1) * n];
            for (c_ij, &b_pj) in c_row.iter_mut().zip(b_row) {
                *c_ij += a_ip * b_pj;
            }
        }
    }

    Ok(Tensor::from_f32(&c, &[m, n]))
}

/// Row-vector × matrix: [K] @ [K, N] → [N]
fn vecmat(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    let k1 = a.numel();
    let (k2, n) = b.dims2("matmul rhs")?;
    if k1 != k2 {
        return Err(QuillError::ShapeMismatch {
            what: "matmul inner dimension".into(),
            expected: vec![k1],
            got: vec![k2, n],
        });
    }
    let row = Tensor::from_f32(a.as_f32_slice(), &[1, k1]);
    let out = matmul_2d(&row, b)?;
    Tensor::from_vec(out.into_vec(), &[n])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matmul_2d() {
        let a = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let b = Tensor::from_f32(&[7.0, 8.0, 9.0, 10.0, 11.0, 12.0], &[3, 2]);
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.dims(), &[2, 2]);
        assert_eq!(c.as_f32_slice(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_vector() {
        let v = Tensor::from_f32(&[1.0, 1.0], &[2]);
        let m = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let out = v.matmul(&m).unwrap();
        assert_eq!(out.dims(), &[3]);
        assert_eq!(out.as_f32_slice(), &[5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_matmul_inner_mismatch() {
        let a = Tensor::zeros(&[2, 3]);
        let b = Tensor::zeros(&[4, 2]);
        assert!(matches!(a.matmul(&b), Err(QuillError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_add_shape_mismatch() {
        let a = Tensor::zeros(&[2, 3]);
        let b = Tensor::zeros(&[3, 2]);
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn test_add_bias_broadcasts_rows() {
        let x = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let b = Tensor::from_f32(&[10.0, 20.0], &[2]);
        let out = x.add_bias(&b).unwrap();
        assert_eq!(out.as_f32_slice(), &[11.0, 22.0, 13.0, 24.0]);

        let v = Tensor::from_f32(&[1.0, 2.0], &[2]);
        assert_eq!(v.add_bias(&b).unwrap().as_f32_slice(), &[11.0, 22.0]);
        assert!(x.add_bias(&Tensor::zeros(&[3])).is_err());
    }

    #[test]
    fn test_relu() {
        let x = Tensor::from_f32(&[-1.0, 0.0, 2.5], &[3]);
        assert_eq!(x.relu().as_f32_slice(), &[0.0, 0.0, 2.5]);
    }
}
