use std::fmt;

use rand::Rng;

use crate::error::QuillError;
use crate::shape::Shape;
use crate::Result;

/// A dense, row-major f32 array. The fundamental data structure in Quill.
///
/// Every parameter matrix, hidden state and logit vector in the model is a
/// `Tensor`. Storage is always contiguous, so views are plain slices.
///
/// # Examples
///
/// ```
/// use quill_core::Tensor;
///
/// let t = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
/// assert_eq!(t.shape().dims(), &[2, 2]);
/// assert_eq!(t.numel(), 4);
/// ```
#[derive(Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Shape,
}

impl Tensor {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a tensor from f32 data with the given shape.
    ///
    /// # Panics
    /// Panics if `data.len()` does not match the element count of `shape`.
    /// Use [`Tensor::from_vec`] for data that comes from outside the crate.
    pub fn from_f32(data: &[f32], shape: &[usize]) -> Self {
        let s = Shape::new(shape);
        assert_eq!(
            s.numel(),
            data.len(),
            "Shape {:?} requires {} elements, got {}",
            shape,
            s.numel(),
            data.len()
        );
        Self { data: data.to_vec(), shape: s }
    }

    /// Create a tensor from owned data, checking the element count.
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let s = Shape::new(shape);
        if s.numel() != data.len() {
            return Err(QuillError::ShapeMismatch {
                what: "tensor data".into(),
                expected: vec![s.numel()],
                got: vec![data.len()],
            });
        }
        Ok(Self { data, shape: s })
    }

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: &[usize]) -> Self {
        let s = Shape::new(shape);
        Self { data: vec![0.0; s.numel()], shape: s }
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: &[usize]) -> Self {
        let s = Shape::new(shape);
        Self { data: vec![1.0; s.numel()], shape: s }
    }

    /// Create a tensor with values drawn from N(0, std²).
    ///
    /// Randomness comes entirely from `rng`, so a seeded generator gives a
    /// reproducible tensor.
    pub fn randn<R: Rng + ?Sized>(shape: &[usize], std: f32, rng: &mut R) -> Self {
        let s = Shape::new(shape);
        // Box-Muller transform for normal distribution
        let data: Vec<f32> = (0..s.numel())
            .map(|_| {
                let u1: f32 = rng.gen_range(1e-7f32..1.0f32);
                let u2: f32 = rng.gen_range(0.0f32..std::f32::consts::TAU);
                (-2.0 * u1.ln()).sqrt() * u2.cos() * std
            })
            .collect();
        Self { data, shape: s }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn as_f32_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_f32_slice_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Rows and columns of a rank-2 tensor.
    ///
    /// `what` names the operand in the error message.
    pub fn dims2(&self, what: &str) -> Result<(usize, usize)> {
        match self.dims() {
            &[rows, cols] => Ok((rows, cols)),
            other => Err(QuillError::ShapeMismatch {
                what: format!("{} (expected a matrix)", what),
                expected: vec![0, 0],
                got: other.to_vec(),
            }),
        }
    }

    /// Require this tensor to have exactly `expected` shape.
    pub fn expect_shape(&self, what: &str, expected: &[usize]) -> Result<()> {
        if self.dims() != expected {
            return Err(QuillError::shape(what, expected, self.dims()));
        }
        Ok(())
    }

    /// Borrow row `i` of a rank-2 tensor.
    pub fn row(&self, i: usize) -> Result<&[f32]> {
        let (rows, cols) = self.dims2("row")?;
        if i >= rows {
            return Err(QuillError::IndexOutOfRange { index: i, bound: rows });
        }
        Ok(&self.data[i * cols..(i + 1) * cols])
    }

    /// Transpose a rank-2 tensor: [M, N] → [N, M].
    pub fn transpose(&self) -> Result<Tensor> {
        let (m, n) = self.dims2("transpose")?;
        let mut out = vec![0.0f32; m * n];
        for i in 0..m {
            for j in 0..n {
                out[j * m + i] = self.data[i * n + j];
            }
        }
        Ok(Tensor { data: out, shape: Shape::new(&[n, m]) })
    }

    /// True if every element is finite.
    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 8;
        let head = &self.data[..self.data.len().min(PREVIEW)];
        write!(f, "Tensor(shape={:?}, data={:?}", self.shape, head)?;
        if self.data.len() > PREVIEW {
            write!(f, " ...")?;
        }
        write!(f, ")")
    }
}
