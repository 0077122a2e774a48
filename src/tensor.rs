//! Dynamic-rank tensor values exchanged between the graph and functional runtimes.
//!
//! Both runtimes consume and produce [`TensorValue`]s: dense dynamic-rank
//! tensors of `f64` or `Complex<f64>` elements. The trailing two axes are the
//! matrix axes of a batched operation; any leading axes are batch axes.

use mdarray::{DTensor, DynRank, Shape, Tensor};
use num_complex::Complex;

/// Complex double, the only complex element type the runtimes exchange.
pub type C64 = Complex<f64>;

/// Element type of a [`TensorValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F64,
    C64,
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DType::F64 => write!(f, "f64"),
            DType::C64 => write!(f, "c64"),
        }
    }
}

/// A dense dynamic-rank tensor of `f64` or `Complex<f64>` elements.
#[derive(Debug, Clone)]
pub enum TensorValue {
    F64(Tensor<f64, DynRank>),
    C64(Tensor<C64, DynRank>),
}

impl TensorValue {
    /// All-zeros tensor of the given shape and dtype.
    pub fn zeros(dims: &[usize], dtype: DType) -> Self {
        match dtype {
            DType::F64 => TensorValue::F64(Tensor::zeros(dims)),
            DType::C64 => TensorValue::C64(Tensor::zeros(dims)),
        }
    }

    /// All-zeros tensor with the shape and dtype of `self`.
    ///
    /// Conversion traces against zero-filled example inputs; only the
    /// signature matters, the values are never executed.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(&self.dims(), self.dtype())
    }

    /// Rank-1 empty tensor, the placeholder for outputs an op was asked not
    /// to compute.
    pub fn empty(dtype: DType) -> Self {
        Self::zeros(&[0], dtype)
    }

    pub fn dtype(&self) -> DType {
        match self {
            TensorValue::F64(_) => DType::F64,
            TensorValue::C64(_) => DType::C64,
        }
    }

    pub fn rank(&self) -> usize {
        match self {
            TensorValue::F64(t) => t.rank(),
            TensorValue::C64(t) => t.rank(),
        }
    }

    /// Dimensions as an owned vector.
    pub fn dims(&self) -> Vec<usize> {
        match self {
            TensorValue::F64(t) => t.shape().with_dims(|dims| dims.to_vec()),
            TensorValue::C64(t) => t.shape().with_dims(|dims| dims.to_vec()),
        }
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        match self {
            TensorValue::F64(t) => t.len(),
            TensorValue::C64(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f64(&self) -> Option<&Tensor<f64, DynRank>> {
        match self {
            TensorValue::F64(t) => Some(t),
            TensorValue::C64(_) => None,
        }
    }

    pub fn as_c64(&self) -> Option<&Tensor<C64, DynRank>> {
        match self {
            TensorValue::C64(t) => Some(t),
            TensorValue::F64(_) => None,
        }
    }

    /// Element at `idx` promoted to complex, regardless of dtype.
    pub fn at_c64(&self, idx: &[usize]) -> C64 {
        match self {
            TensorValue::F64(t) => Complex::new(t[idx], 0.0),
            TensorValue::C64(t) => t[idx],
        }
    }
}

/// Decode a flat batch index into a multi-index over `dims`.
pub fn decode_batch_index(flat: usize, dims: &[usize]) -> Vec<usize> {
    let mut idx = Vec::with_capacity(dims.len());
    let mut remainder = flat;
    for &d in dims.iter().rev() {
        idx.push(remainder % d);
        remainder /= d;
    }
    idx.reverse();
    idx
}

/// Number of batch elements for the given batch dimensions.
///
/// An empty slice (unbatched input) counts as a single element.
pub fn batch_count(dims: &[usize]) -> usize {
    dims.iter().product()
}

/// Extract the `rows x cols` matrix at batch multi-index `batch`.
pub fn mat_from_batch_f64(
    t: &Tensor<f64, DynRank>,
    batch: &[usize],
    rows: usize,
    cols: usize,
) -> DTensor<f64, 2> {
    DTensor::<f64, 2>::from_fn([rows, cols], |idx| {
        let mut full = Vec::with_capacity(batch.len() + 2);
        full.extend_from_slice(batch);
        full.push(idx[0]);
        full.push(idx[1]);
        t[&full[..]]
    })
}

/// Assemble per-batch matrices into a tensor of shape `batch_dims x rows x cols`.
///
/// `mats` is indexed by the flat batch index in row-major batch order.
pub fn stack_mats_f64(batch_dims: &[usize], mats: &[DTensor<f64, 2>]) -> Tensor<f64, DynRank> {
    let (rows, cols) = *mats[0].shape();
    let mut shape = batch_dims.to_vec();
    shape.push(rows);
    shape.push(cols);
    let mut out: Tensor<f64, DynRank> = Tensor::zeros(shape.as_slice());
    for (b, mat) in mats.iter().enumerate() {
        let bidx = decode_batch_index(b, batch_dims);
        for i in 0..rows {
            for j in 0..cols {
                let mut full = bidx.clone();
                full.push(i);
                full.push(j);
                out[&full[..]] = mat[[i, j]];
            }
        }
    }
    out
}

pub fn stack_mats_c64(batch_dims: &[usize], mats: &[DTensor<C64, 2>]) -> Tensor<C64, DynRank> {
    let (rows, cols) = *mats[0].shape();
    let mut shape = batch_dims.to_vec();
    shape.push(rows);
    shape.push(cols);
    let mut out: Tensor<C64, DynRank> = Tensor::zeros(shape.as_slice());
    for (b, mat) in mats.iter().enumerate() {
        let bidx = decode_batch_index(b, batch_dims);
        for i in 0..rows {
            for j in 0..cols {
                let mut full = bidx.clone();
                full.push(i);
                full.push(j);
                out[&full[..]] = mat[[i, j]];
            }
        }
    }
    out
}

/// Assemble per-batch vectors into a tensor of shape `batch_dims x n`.
pub fn stack_vecs_f64(batch_dims: &[usize], vecs: &[Vec<f64>]) -> Tensor<f64, DynRank> {
    let n = vecs[0].len();
    let mut shape = batch_dims.to_vec();
    shape.push(n);
    let mut out: Tensor<f64, DynRank> = Tensor::zeros(shape.as_slice());
    for (b, vec) in vecs.iter().enumerate() {
        let bidx = decode_batch_index(b, batch_dims);
        for (i, &x) in vec.iter().enumerate() {
            let mut full = bidx.clone();
            full.push(i);
            out[&full[..]] = x;
        }
    }
    out
}

pub fn stack_vecs_c64(batch_dims: &[usize], vecs: &[Vec<C64>]) -> Tensor<C64, DynRank> {
    let n = vecs[0].len();
    let mut shape = batch_dims.to_vec();
    shape.push(n);
    let mut out: Tensor<C64, DynRank> = Tensor::zeros(shape.as_slice());
    for (b, vec) in vecs.iter().enumerate() {
        let bidx = decode_batch_index(b, batch_dims);
        for (i, &x) in vec.iter().enumerate() {
            let mut full = bidx.clone();
            full.push(i);
            out[&full[..]] = x;
        }
    }
    out
}

/// Symmetrize a square matrix from its lower triangle: the strict upper
/// triangle is replaced by the mirrored strict lower triangle.
pub fn symmetrize_lower_2d(a: &DTensor<f64, 2>) -> DTensor<f64, 2> {
    let (n, m) = *a.shape();
    debug_assert_eq!(n, m);
    DTensor::<f64, 2>::from_fn([n, m], |idx| {
        if idx[0] >= idx[1] {
            a[[idx[0], idx[1]]]
        } else {
            a[[idx[1], idx[0]]]
        }
    })
}

/// Batched [`symmetrize_lower_2d`] over the trailing matrix axes.
///
/// Returns `None` if the input is not a real tensor of rank >= 2 with square
/// trailing axes.
pub fn symmetrize_lower(t: &TensorValue) -> Option<TensorValue> {
    let x = t.as_f64()?;
    let dims = t.dims();
    if dims.len() < 2 {
        return None;
    }
    let (rows, cols) = (dims[dims.len() - 2], dims[dims.len() - 1]);
    if rows != cols {
        return None;
    }
    let batch_dims = &dims[..dims.len() - 2];
    let mats: Vec<DTensor<f64, 2>> = (0..batch_count(batch_dims))
        .map(|b| {
            let bidx = decode_batch_index(b, batch_dims);
            symmetrize_lower_2d(&mat_from_batch_f64(x, &bidx, rows, cols))
        })
        .collect();
    Some(TensorValue::F64(stack_mats_f64(batch_dims, &mats)))
}

/// Truncate the last axis to its first `k` entries.
///
/// Used to restrict singular-vector matrices to the leading `k` columns
/// before comparison; the orthonormal completion beyond `k` is
/// basis-ambiguous.
pub fn truncate_last_axis(t: &TensorValue, k: usize) -> TensorValue {
    let dims = t.dims();
    let last = dims.len() - 1;
    assert!(k <= dims[last], "cannot truncate axis {} to {}", dims[last], k);
    let mut out_dims = dims.clone();
    out_dims[last] = k;
    match t {
        TensorValue::F64(x) => {
            let mut out: Tensor<f64, DynRank> = Tensor::zeros(out_dims.as_slice());
            for flat in 0..batch_count(&out_dims) {
                let idx = decode_batch_index(flat, &out_dims);
                out[&idx[..]] = x[&idx[..]];
            }
            TensorValue::F64(out)
        }
        TensorValue::C64(x) => {
            let mut out: Tensor<C64, DynRank> = Tensor::zeros(out_dims.as_slice());
            for flat in 0..batch_count(&out_dims) {
                let idx = decode_batch_index(flat, &out_dims);
                out[&idx[..]] = x[&idx[..]];
            }
            TensorValue::C64(out)
        }
    }
}
