//! Eager graph runtime backed by LAPACK (`ndarray-linalg`).
//!
//! This is the reference side of the equivalence check: each op is executed
//! directly, per batch element, by the library the graph framework itself
//! uses. The decompositions are provided by LAPACK; nothing here implements
//! one.

use mdarray::DTensor;
use ndarray_linalg::{Cholesky, Eig, Eigh, SVD, UPLO};

use crate::compat;
use crate::graph::{EvalError, RawOp};
use crate::tensor::{
    batch_count, decode_batch_index, mat_from_batch_f64, stack_mats_c64, stack_mats_f64,
    stack_vecs_c64, stack_vecs_f64, C64, DType, TensorValue,
};

const BACKEND: &str = "lapack";

/// Execute a raw op eagerly over a batched input.
pub(crate) fn execute(op: RawOp, inputs: &[TensorValue]) -> Result<Vec<TensorValue>, EvalError> {
    if inputs.len() != op.input_arity() {
        return Err(EvalError::InputArity {
            op: op.name(),
            expected: op.input_arity(),
            got: inputs.len(),
        });
    }
    let input = &inputs[0];
    let (rows, cols, batch_dims) = op.validate_input(&input.dims(), input.dtype())?;
    let x = input.as_f64().ok_or(EvalError::Dtype {
        op: op.name(),
        got: input.dtype(),
        expected: DType::F64,
    })?;
    let nbatch = batch_count(&batch_dims);

    match op {
        RawOp::Cholesky => {
            let mut factors = Vec::with_capacity(nbatch);
            for b in 0..nbatch {
                let bidx = decode_batch_index(b, &batch_dims);
                let a = mat_from_batch_f64(x, &bidx, rows, cols);
                factors.push(cholesky_2d(&a, &bidx)?);
            }
            Ok(vec![TensorValue::F64(stack_mats_f64(&batch_dims, &factors))])
        }
        RawOp::Eig { compute_v } => {
            let mut values = Vec::with_capacity(nbatch);
            let mut vectors = Vec::with_capacity(nbatch);
            for b in 0..nbatch {
                let bidx = decode_batch_index(b, &batch_dims);
                let a = mat_from_batch_f64(x, &bidx, rows, cols);
                let (w, v) = eig_2d(&a, compute_v)?;
                values.push(w);
                if let Some(v) = v {
                    vectors.push(v);
                }
            }
            let w_out = TensorValue::C64(stack_vecs_c64(&batch_dims, &values));
            let v_out = if compute_v {
                TensorValue::C64(stack_mats_c64(&batch_dims, &vectors))
            } else {
                TensorValue::empty(DType::C64)
            };
            Ok(vec![w_out, v_out])
        }
        RawOp::SelfAdjointEig { compute_v } => {
            let mut values = Vec::with_capacity(nbatch);
            let mut vectors = Vec::with_capacity(nbatch);
            for b in 0..nbatch {
                let bidx = decode_batch_index(b, &batch_dims);
                let a = mat_from_batch_f64(x, &bidx, rows, cols);
                let (w, v) = eigh_2d(&a, compute_v)?;
                values.push(w);
                if let Some(v) = v {
                    vectors.push(v);
                }
            }
            let w_out = TensorValue::F64(stack_vecs_f64(&batch_dims, &values));
            let v_out = if compute_v {
                TensorValue::F64(stack_mats_f64(&batch_dims, &vectors))
            } else {
                TensorValue::empty(DType::F64)
            };
            Ok(vec![w_out, v_out])
        }
        RawOp::Svd { compute_uv, full_matrices } => {
            let mut values = Vec::with_capacity(nbatch);
            let mut us = Vec::with_capacity(nbatch);
            let mut vs = Vec::with_capacity(nbatch);
            for b in 0..nbatch {
                let bidx = decode_batch_index(b, &batch_dims);
                let a = mat_from_batch_f64(x, &bidx, rows, cols);
                let (s, uv) = svd_2d(&a, compute_uv, full_matrices)?;
                values.push(s);
                if let Some((u, v)) = uv {
                    us.push(u);
                    vs.push(v);
                }
            }
            let s_out = TensorValue::F64(stack_vecs_f64(&batch_dims, &values));
            let (u_out, v_out) = if compute_uv {
                (
                    TensorValue::F64(stack_mats_f64(&batch_dims, &us)),
                    TensorValue::F64(stack_mats_f64(&batch_dims, &vs)),
                )
            } else {
                (TensorValue::empty(DType::F64), TensorValue::empty(DType::F64))
            };
            Ok(vec![s_out, u_out, v_out])
        }
    }
}

/// Lower Cholesky factor with zeroed strict upper triangle.
fn cholesky_2d(a: &DTensor<f64, 2>, batch: &[usize]) -> Result<DTensor<f64, 2>, EvalError> {
    let arr = compat::tensor_to_array2(a);
    // dpotrf fails exactly when the matrix is not positive definite.
    let l = arr.cholesky(UPLO::Lower).map_err(|_| EvalError::NotPositiveDefinite {
        op: "Cholesky",
        batch: batch.to_vec(),
    })?;
    Ok(compat::array2_to_tensor(&l))
}

/// General eigendecomposition; eigenvalues (and vectors) are complex.
fn eig_2d(
    a: &DTensor<f64, 2>,
    compute_v: bool,
) -> Result<(Vec<C64>, Option<DTensor<C64, 2>>), EvalError> {
    let arr = compat::tensor_to_array2(a);
    let (w, v) = arr.eig().map_err(|e| EvalError::Backend {
        op: "Eig",
        backend: BACKEND,
        message: e.to_string(),
    })?;
    let values = compat::array1_to_vec(&w);
    let vectors = if compute_v { Some(compat::array2_to_tensor(&v)) } else { None };
    Ok((values, vectors))
}

/// Symmetric eigendecomposition reading the lower triangle; eigenvalues
/// ascend (dsyev convention).
fn eigh_2d(
    a: &DTensor<f64, 2>,
    compute_v: bool,
) -> Result<(Vec<f64>, Option<DTensor<f64, 2>>), EvalError> {
    let arr = compat::tensor_to_array2(a);
    let (w, v) = arr.eigh(UPLO::Lower).map_err(|e| EvalError::Backend {
        op: "SelfAdjointEig",
        backend: BACKEND,
        message: e.to_string(),
    })?;
    let values = compat::array1_to_vec(&w);
    let vectors = if compute_v { Some(compat::array2_to_tensor(&v)) } else { None };
    Ok((values, vectors))
}

/// SVD with singular values descending; `v` is returned as columns of right
/// singular vectors. LAPACK computes full matrices; the thin form is a
/// column truncation.
fn svd_2d(
    a: &DTensor<f64, 2>,
    compute_uv: bool,
    full_matrices: bool,
) -> Result<(Vec<f64>, Option<(DTensor<f64, 2>, DTensor<f64, 2>)>), EvalError> {
    let (m, n) = *a.shape();
    let arr = compat::tensor_to_array2(a);
    let (u, s, vt) = arr.svd(compute_uv, compute_uv).map_err(|e| EvalError::Backend {
        op: "Svd",
        backend: BACKEND,
        message: e.to_string(),
    })?;
    let values = compat::array1_to_vec(&s);
    if !compute_uv {
        return Ok((values, None));
    }
    let missing = |what: &'static str| EvalError::Backend {
        op: "Svd",
        backend: BACKEND,
        message: format!("{} missing from factorization", what),
    };
    let u = u.ok_or_else(|| missing("left singular vectors"))?;
    let vt = vt.ok_or_else(|| missing("right singular vectors"))?;
    let k = values.len();
    let ucols = if full_matrices { m } else { k };
    let vcols = if full_matrices { n } else { k };
    let u_out = DTensor::<f64, 2>::from_fn([m, ucols], |idx| u[[idx[0], idx[1]]]);
    let v_out = DTensor::<f64, 2>::from_fn([n, vcols], |idx| vt[[idx[1], idx[0]]]);
    Ok((values, Some((u_out, v_out))))
}
