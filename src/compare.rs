//! Numeric comparison policies of the conversion-equivalence checker.
//!
//! Decompositions are compared under floating-point tolerance and under the
//! ambiguities each factorization carries: eigenvalue ordering differs
//! across backends (unordered multiset matching), eigenvectors are unique
//! only up to scale/phase (validated through the defining relation, never
//! compared directly), and singular vectors carry a per-column sign/phase
//! freedom (normalized away before comparison).
//!
//! All checks return a typed error naming the first offending index, so
//! the policies themselves are unit-testable.

use mdarray::DTensor;
use num_complex::Complex;

use crate::gemm::{matmul_c64, matmul_f64};
use crate::tensor::{batch_count, decode_batch_index, C64, DType, TensorValue};

/// Default absolute tolerance for direct comparisons.
pub const DEFAULT_ATOL: f64 = 1e-6;
/// Default relative tolerance for direct comparisons.
pub const DEFAULT_RTOL: f64 = 1e-6;

/// A comparison policy violation.
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error("dtype mismatch: {left} vs {right}")]
    DtypeMismatch { left: DType, right: DType },

    #[error("values differ at {index:?}: {left} vs {right} (atol={atol}, rtol={rtol})")]
    ValueMismatch { index: Vec<usize>, left: String, right: String, atol: f64, rtol: f64 },

    #[error(
        "eigenvalue {value} at batch {batch:?} has no partner within {atol} (nearest {nearest:e})"
    )]
    UnmatchedEigenvalue { batch: Vec<usize>, value: String, nearest: f64, atol: f64 },

    #[error("eigenvalues not non-descending at batch {batch:?}, position {position}: {prev} > {next}")]
    NotNondescending { batch: Vec<usize>, position: usize, prev: f64, next: f64 },

    #[error("columns {i} and {j} at batch {batch:?} not orthonormal: inner product {value}")]
    NotOrthonormal { batch: Vec<usize>, i: usize, j: usize, value: f64 },
}

fn require_same_shape(a: &TensorValue, b: &TensorValue) -> Result<(), CompareError> {
    if a.dims() != b.dims() {
        return Err(CompareError::ShapeMismatch { left: a.dims(), right: b.dims() });
    }
    Ok(())
}

/// Elementwise approximate equality: `|a - b| <= atol + rtol * |b|`.
///
/// Shapes and dtypes must agree exactly.
pub fn allclose(a: &TensorValue, b: &TensorValue, atol: f64, rtol: f64) -> Result<(), CompareError> {
    require_same_shape(a, b)?;
    if a.dtype() != b.dtype() {
        return Err(CompareError::DtypeMismatch { left: a.dtype(), right: b.dtype() });
    }
    let dims = a.dims();
    for flat in 0..batch_count(&dims) {
        let idx = decode_batch_index(flat, &dims);
        let x = a.at_c64(&idx);
        let y = b.at_c64(&idx);
        if (x - y).norm() > atol + rtol * y.norm() {
            return Err(CompareError::ValueMismatch {
                index: idx,
                left: x.to_string(),
                right: y.to_string(),
                atol,
                rtol,
            });
        }
    }
    Ok(())
}

/// Unordered multiset matching of eigenvalue spectra, per batch element.
///
/// Eigenvalue ordering is not consistent across backends even after
/// sorting, so each eigenvalue on one side must have a partner within
/// `atol` on the other side, in both directions.
pub fn match_eigenvalues(a: &TensorValue, b: &TensorValue, atol: f64) -> Result<(), CompareError> {
    require_same_shape(a, b)?;
    let dims = a.dims();
    let n = dims[dims.len() - 1];
    let batch_dims = &dims[..dims.len() - 1];

    for flat in 0..batch_count(batch_dims) {
        let bidx = decode_batch_index(flat, batch_dims);
        let spectrum = |t: &TensorValue| -> Vec<C64> {
            (0..n)
                .map(|i| {
                    let mut idx = bidx.clone();
                    idx.push(i);
                    t.at_c64(&idx)
                })
                .collect()
        };
        let wa = spectrum(a);
        let wb = spectrum(b);
        for (from, to) in [(&wa, &wb), (&wb, &wa)] {
            for value in from {
                let nearest = to
                    .iter()
                    .map(|other| (value - other).norm())
                    .fold(f64::INFINITY, f64::min);
                if nearest > atol {
                    return Err(CompareError::UnmatchedEigenvalue {
                        batch: bidx.clone(),
                        value: value.to_string(),
                        nearest,
                        atol,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Require a real spectrum to be non-descending along its last axis, per
/// batch element.
pub fn check_nondescending(w: &TensorValue) -> Result<(), CompareError> {
    let dims = w.dims();
    let n = dims[dims.len() - 1];
    let batch_dims = &dims[..dims.len() - 1];
    for flat in 0..batch_count(batch_dims) {
        let bidx = decode_batch_index(flat, batch_dims);
        for i in 0..n.saturating_sub(1) {
            let mut idx = bidx.clone();
            idx.push(i);
            let prev = w.at_c64(&idx).re;
            idx[bidx.len()] = i + 1;
            let next = w.at_c64(&idx).re;
            if prev > next {
                return Err(CompareError::NotNondescending {
                    batch: bidx,
                    position: i,
                    prev,
                    next,
                });
            }
        }
    }
    Ok(())
}

/// Validate eigenpairs through the defining relation
/// `A . V ~= V * w[..., None, :]`, per batch element.
///
/// The relation is checked per framework output; eigenvectors are never
/// compared across frameworks.
pub fn check_eigenpairs(
    a: &TensorValue,
    w: &TensorValue,
    v: &TensorValue,
    atol: f64,
    rtol: f64,
) -> Result<(), CompareError> {
    let a_dims = a.dims();
    let v_dims = v.dims();
    let w_dims = w.dims();
    if a_dims != v_dims || w_dims != a_dims[..a_dims.len() - 1] {
        return Err(CompareError::ShapeMismatch { left: a_dims, right: v_dims });
    }
    let n = a_dims[a_dims.len() - 1];
    let batch_dims = &a_dims[..a_dims.len() - 2];

    for flat in 0..batch_count(batch_dims) {
        let bidx = decode_batch_index(flat, batch_dims);
        let full = |i: usize, j: usize| {
            let mut idx = bidx.clone();
            idx.push(i);
            idx.push(j);
            idx
        };
        let a_mat = DTensor::<C64, 2>::from_fn([n, n], |idx| a.at_c64(&full(idx[0], idx[1])));
        let v_mat = DTensor::<C64, 2>::from_fn([n, n], |idx| v.at_c64(&full(idx[0], idx[1])));
        let values: Vec<C64> = (0..n)
            .map(|j| {
                let mut idx = bidx.clone();
                idx.push(j);
                w.at_c64(&idx)
            })
            .collect();

        let left = matmul_c64(&a_mat, &v_mat);
        for i in 0..n {
            for j in 0..n {
                let right = values[j] * v_mat[[i, j]];
                if (left[[i, j]] - right).norm() > atol + rtol * right.norm() {
                    let mut index = bidx.clone();
                    index.push(i);
                    index.push(j);
                    return Err(CompareError::ValueMismatch {
                        index,
                        left: left[[i, j]].to_string(),
                        right: right.to_string(),
                        atol,
                        rtol,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Reconstruct a batched matrix from its truncated SVD factors:
/// `U[..., :k] . diag(S) . V[..., :k]^T` with `k = S.dims().last()`.
pub fn svd_reconstruct(
    u: &TensorValue,
    s: &TensorValue,
    v: &TensorValue,
) -> Result<TensorValue, CompareError> {
    let u_dims = u.dims();
    let s_dims = s.dims();
    let v_dims = v.dims();
    let k = s_dims[s_dims.len() - 1];
    let m = u_dims[u_dims.len() - 2];
    let n = v_dims[v_dims.len() - 2];
    let batch_dims = &u_dims[..u_dims.len() - 2];
    if v_dims[..v_dims.len() - 2] != *batch_dims
        || s_dims[..s_dims.len() - 1] != *batch_dims
        || u_dims[u_dims.len() - 1] < k
        || v_dims[v_dims.len() - 1] < k
    {
        return Err(CompareError::ShapeMismatch { left: u_dims, right: v_dims });
    }
    let (ut, st, vt) = match (u.as_f64(), s.as_f64(), v.as_f64()) {
        (Some(ut), Some(st), Some(vt)) => (ut, st, vt),
        _ => return Err(CompareError::DtypeMismatch { left: u.dtype(), right: s.dtype() }),
    };

    let mut mats = Vec::with_capacity(batch_count(batch_dims));
    for flat in 0..batch_count(batch_dims) {
        let bidx = decode_batch_index(flat, batch_dims);
        let full = |extra: &[usize]| {
            let mut idx = bidx.clone();
            idx.extend_from_slice(extra);
            idx
        };
        // Fold the singular values into the truncated left factor.
        let scaled = DTensor::<f64, 2>::from_fn([m, k], |idx| {
            ut[&full(&[idx[0], idx[1]])[..]] * st[&full(&[idx[1]])[..]]
        });
        let v_k_t = DTensor::<f64, 2>::from_fn([k, n], |idx| vt[&full(&[idx[1], idx[0]])[..]]);
        mats.push(matmul_f64(&scaled, &v_k_t));
    }
    Ok(TensorValue::F64(crate::tensor::stack_mats_f64(batch_dims, &mats)))
}

/// Remove the per-column sign/phase freedom of singular vectors.
///
/// Columns are unique up to a sign (a unit phase factor in the complex
/// case). The factor is estimated from the ratio of corresponding
/// components summed down the column, scaled to unit modulus, and applied
/// to `x`; the result is directly comparable to `y`.
pub fn align_singular_vectors(x: &TensorValue, y: &TensorValue) -> Result<TensorValue, CompareError> {
    require_same_shape(x, y)?;
    if x.dtype() != y.dtype() {
        return Err(CompareError::DtypeMismatch { left: x.dtype(), right: y.dtype() });
    }
    let dims = x.dims();
    let m = dims[dims.len() - 2];
    let k = dims[dims.len() - 1];
    let batch_dims = &dims[..dims.len() - 2];

    let mut mats = Vec::with_capacity(batch_count(batch_dims));
    for flat in 0..batch_count(batch_dims) {
        let bidx = decode_batch_index(flat, batch_dims);
        let full = |i: usize, j: usize| {
            let mut idx = bidx.clone();
            idx.push(i);
            idx.push(j);
            idx
        };
        let aligned = DTensor::<C64, 2>::from_fn([m, k], |idx| {
            let j = idx[1];
            let mut ratio_sum = Complex::new(0.0, 0.0);
            for i in 0..m {
                ratio_sum += y.at_c64(&full(i, j)) / x.at_c64(&full(i, j));
            }
            let phase = ratio_sum / ratio_sum.norm();
            x.at_c64(&full(idx[0], j)) * phase
        });
        mats.push(aligned);
    }
    let stacked = crate::tensor::stack_mats_c64(batch_dims, &mats);
    match x.dtype() {
        DType::C64 => Ok(TensorValue::C64(stacked)),
        DType::F64 => {
            // Phases of real columns are +-1; drop the zero imaginary part.
            let mut out: mdarray::Tensor<f64, mdarray::DynRank> =
                mdarray::Tensor::zeros(dims.as_slice());
            for flat in 0..batch_count(&dims) {
                let idx = decode_batch_index(flat, &dims);
                out[&idx[..]] = stacked[&idx[..]].re;
            }
            Ok(TensorValue::F64(out))
        }
    }
}

/// Compare singular-vector blocks after sign/phase alignment.
pub fn compare_singular_vectors(
    x: &TensorValue,
    y: &TensorValue,
    atol: f64,
    rtol: f64,
) -> Result<(), CompareError> {
    let aligned = align_singular_vectors(x, y)?;
    allclose(&aligned, y, atol, rtol)
}

/// Require the columns of a batched real matrix to be orthonormal:
/// `U^T . U ~= I` per batch element.
pub fn check_orthonormal(u: &TensorValue, atol: f64) -> Result<(), CompareError> {
    let dims = u.dims();
    let m = dims[dims.len() - 2];
    let k = dims[dims.len() - 1];
    let batch_dims = &dims[..dims.len() - 2];
    let ut = match u.as_f64() {
        Some(t) => t,
        None => return Err(CompareError::DtypeMismatch { left: u.dtype(), right: DType::F64 }),
    };

    for flat in 0..batch_count(batch_dims) {
        let bidx = decode_batch_index(flat, batch_dims);
        for i in 0..k {
            for j in 0..k {
                let mut sum = 0.0;
                for row in 0..m {
                    let mut left = bidx.clone();
                    left.push(row);
                    left.push(i);
                    let mut right = bidx.clone();
                    right.push(row);
                    right.push(j);
                    sum += ut[&left[..]] * ut[&right[..]];
                }
                let expected = if i == j { 1.0 } else { 0.0 };
                if (sum - expected).abs() > atol {
                    return Err(CompareError::NotOrthonormal { batch: bidx, i, j, value: sum });
                }
            }
        }
    }
    Ok(())
}
