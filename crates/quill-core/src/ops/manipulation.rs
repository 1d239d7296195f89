//! Softmax and row slicing.

use crate::error::QuillError;
use crate::tensor::Tensor;
use crate::Result;

impl Tensor {
    /// Softmax along `axis` (negative values count from the end).
    ///
    /// The per-slice maximum is subtracted before exponentiating, so large
    /// logits and the −1e9 attention mask fill never overflow.
    pub fn softmax(&self, axis: isize) -> Result<Tensor> {
        let ndim = self.ndim();
        let axis = if axis < 0 { ndim as isize + axis } else { axis };
        if axis < 0 || axis as usize >= ndim {
            return Err(QuillError::InvalidArgument(format!(
                "softmax: axis {} out of range for rank {}",
                axis, ndim
            )));
        }
        let axis = axis as usize;

        let mut result = self.as_f32_slice().to_vec();
        let dims = self.dims();
        let outer: usize = dims[..axis].iter().product();
        let axis_size = dims[axis];
        let inner: usize = dims[axis + 1..].iter().product();

        for o in 0..outer {
            for i in 0..inner {
                let idx = |a: usize| (o * axis_size + a) * inner + i;

                let mut max_val = f32::NEG_INFINITY;
                for a in 0..axis_size {
                    max_val = max_val.max(result[idx(a)]);
                }

                let mut sum = 0.0f32;
                for a in 0..axis_size {
                    let e = (result[idx(a)] - max_val).exp();
                    result[idx(a)] = e;
                    sum += e;
                }

                if sum > 0.0 {
                    for a in 0..axis_size {
                        result[idx(a)] /= sum;
                    }
                }
            }
        }

        Tensor::from_vec(result, dims)
    }

    /// Rows `start..end` of a rank-2 tensor.
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Tensor> {
        let (rows, cols) = self.dims2("slice_rows")?;
        if start > end || end > rows {
            return Err(QuillError::InvalidArgument(format!(
                "slice_rows: range {}..{} invalid for {} rows",
                start, end, rows
            )));
        }
        let data = self.as_f32_slice()[start * cols..end * cols].to_vec();
        Tensor::from_vec(data, &[end - start, cols])
    }

    /// Last row of a rank-2 tensor as a rank-1 tensor.
    pub fn last_row(&self) -> Result<Tensor> {
        let (rows, cols) = self.dims2("last_row")?;
        if rows == 0 {
            return Err(QuillError::InvalidArgument("last_row: tensor has no rows".into()));
        }
        Tensor::from_vec(self.row(rows - 1)?.to_vec(), &[cols])
    }
}
