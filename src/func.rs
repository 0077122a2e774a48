//! Functional target runtime backed by nalgebra.
//!
//! Converted nodes execute here as pure functions of their input tensors.
//! The decompositions are nalgebra's; this module only adapts them to the
//! op contracts (lower-triangle symmetrization, eigenvalue ordering,
//! orthonormal completion for full matrices).

use mdarray::DTensor;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::compat;
use crate::graph::{EvalError, RawOp};
use crate::tensor::{
    batch_count, decode_batch_index, mat_from_batch_f64, stack_mats_f64, stack_vecs_c64,
    stack_vecs_f64, symmetrize_lower_2d, C64, DType, TensorValue,
};

const RUNTIME: &str = "functional";
const BACKEND: &str = "nalgebra";

/// What the functional runtime can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Eigenvalues of general non-symmetric matrices (Schur-based).
    pub nonsymmetric_eig: bool,
    /// Eigenvectors of general non-symmetric matrices.
    pub nonsymmetric_eig_vectors: bool,
}

/// Capabilities of this runtime.
///
/// nalgebra has no non-symmetric eigenvector solver, so converting
/// `Eig { compute_v: true }` is refused and suites skip those cases.
pub fn capabilities() -> Capabilities {
    Capabilities {
        nonsymmetric_eig: true,
        nonsymmetric_eig_vectors: false,
    }
}

/// Interpreted execution: layout and dispatch derived per call.
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
    execute_layout(op, input, rows, cols, &batch_dims, false)
}

/// Planned execution: layout already resolved at compile time; batch
/// elements fan out across threads.
pub(crate) fn execute_planned(
    op: RawOp,
    input: &TensorValue,
    rows: usize,
    cols: usize,
    batch_dims: &[usize],
) -> Result<Vec<TensorValue>, EvalError> {
    execute_layout(op, input, rows, cols, batch_dims, true)
}

fn execute_layout(
    op: RawOp,
    input: &TensorValue,
    rows: usize,
    cols: usize,
    batch_dims: &[usize],
    parallel: bool,
) -> Result<Vec<TensorValue>, EvalError> {
    let x = input.as_f64().ok_or(EvalError::Dtype {
        op: op.name(),
        got: input.dtype(),
        expected: DType::F64,
    })?;
    let nbatch = batch_count(batch_dims);

    match op {
        RawOp::Cholesky => {
            let factors = run_batched(nbatch, parallel, |b| {
                let bidx = decode_batch_index(b, batch_dims);
                cholesky_2d(&mat_from_batch_f64(x, &bidx, rows, cols), &bidx)
            })?;
            Ok(vec![TensorValue::F64(stack_mats_f64(batch_dims, &factors))])
        }
        RawOp::Eig { compute_v } => {
            if compute_v {
                return Err(EvalError::Unsupported {
                    op: "Eig",
                    runtime: RUNTIME,
                    what: "eigenvectors of non-symmetric matrices",
                });
            }
            let values = run_batched(nbatch, parallel, |b| {
                let bidx = decode_batch_index(b, batch_dims);
                Ok(eig_values_2d(&mat_from_batch_f64(x, &bidx, rows, cols)))
            })?;
            Ok(vec![
                TensorValue::C64(stack_vecs_c64(batch_dims, &values)),
                TensorValue::empty(DType::C64),
            ])
        }
        RawOp::SelfAdjointEig { compute_v } => {
            let pairs = run_batched(nbatch, parallel, |b| {
                let bidx = decode_batch_index(b, batch_dims);
                Ok(eigh_2d(&mat_from_batch_f64(x, &bidx, rows, cols), compute_v))
            })?;
            let values: Vec<Vec<f64>> = pairs.iter().map(|(w, _)| w.clone()).collect();
            let w_out = TensorValue::F64(stack_vecs_f64(batch_dims, &values));
            let v_out = if compute_v {
                let vectors: Vec<DTensor<f64, 2>> = pairs
                    .into_iter()
                    .map(|(_, v)| v.expect("vectors were requested"))
                    .collect();
                TensorValue::F64(stack_mats_f64(batch_dims, &vectors))
            } else {
                TensorValue::empty(DType::F64)
            };
            Ok(vec![w_out, v_out])
        }
        RawOp::Svd { compute_uv, full_matrices } => {
            let parts = run_batched(nbatch, parallel, |b| {
                let bidx = decode_batch_index(b, batch_dims);
                svd_2d(&mat_from_batch_f64(x, &bidx, rows, cols), compute_uv, full_matrices)
            })?;
            let values: Vec<Vec<f64>> = parts.iter().map(|(s, _)| s.clone()).collect();
            let s_out = TensorValue::F64(stack_vecs_f64(batch_dims, &values));
            let (u_out, v_out) = if compute_uv {
                let mut us = Vec::with_capacity(parts.len());
                let mut vs = Vec::with_capacity(parts.len());
                for (_, uv) in parts {
                    let (u, v) = uv.expect("singular vectors were requested");
                    us.push(u);
                    vs.push(v);
                }
                (
                    TensorValue::F64(stack_mats_f64(batch_dims, &us)),
                    TensorValue::F64(stack_mats_f64(batch_dims, &vs)),
                )
            } else {
                (TensorValue::empty(DType::F64), TensorValue::empty(DType::F64))
            };
            Ok(vec![s_out, u_out, v_out])
        }
    }
}

/// Run a per-batch kernel serially or fanned out over threads, preserving
/// batch order.
fn run_batched<T, F>(nbatch: usize, parallel: bool, kernel: F) -> Result<Vec<T>, EvalError>
where
    T: Send,
    F: Fn(usize) -> Result<T, EvalError> + Sync,
{
    if parallel {
        (0..nbatch).into_par_iter().map(|b| kernel(b)).collect()
    } else {
        (0..nbatch).map(|b| kernel(b)).collect()
    }
}

fn cholesky_2d(a: &DTensor<f64, 2>, batch: &[usize]) -> Result<DTensor<f64, 2>, EvalError> {
    let m = compat::tensor_to_dmatrix(a);
    let chol = nalgebra::Cholesky::new(m).ok_or_else(|| EvalError::NotPositiveDefinite {
        op: "Cholesky",
        batch: batch.to_vec(),
    })?;
    Ok(compat::dmatrix_to_tensor(&chol.l()))
}

/// Eigenvalues of a general real matrix via the Schur form.
fn eig_values_2d(a: &DTensor<f64, 2>) -> Vec<C64> {
    let m = compat::tensor_to_dmatrix(a);
    let w = m.complex_eigenvalues();
    w.iter().copied().collect()
}

/// Symmetric eigendecomposition per the op contract: only the lower
/// triangle is read, and eigenpairs come out in non-descending order
/// (nalgebra leaves them unordered).
fn eigh_2d(a: &DTensor<f64, 2>, compute_v: bool) -> (Vec<f64>, Option<DTensor<f64, 2>>) {
    let sym = symmetrize_lower_2d(a);
    let n = sym.shape().0;
    let se = nalgebra::SymmetricEigen::new(compat::tensor_to_dmatrix(&sym));

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| se.eigenvalues[i].total_cmp(&se.eigenvalues[j]));

    let values: Vec<f64> = order.iter().map(|&i| se.eigenvalues[i]).collect();
    let vectors = if compute_v {
        Some(DTensor::<f64, 2>::from_fn([n, n], |idx| {
            se.eigenvectors[(idx[0], order[idx[1]])]
        }))
    } else {
        None
    };
    (values, vectors)
}

/// SVD per the op contract: descending singular values, `v` as columns of
/// right singular vectors. nalgebra computes the thin form; full matrices
/// are obtained by orthonormal completion.
fn svd_2d(
    a: &DTensor<f64, 2>,
    compute_uv: bool,
    full_matrices: bool,
) -> Result<(Vec<f64>, Option<(DTensor<f64, 2>, DTensor<f64, 2>)>), EvalError> {
    let (m, n) = *a.shape();
    let mat = compat::tensor_to_dmatrix(a);
    let svd = nalgebra::SVD::new(mat, compute_uv, compute_uv);
    let values = compat::dvector_to_vec(&svd.singular_values);
    if !compute_uv {
        return Ok((values, None));
    }
    let missing = |what: &'static str| EvalError::Backend {
        op: "Svd",
        backend: BACKEND,
        message: format!("{} missing from factorization", what),
    };
    let u_thin = svd.u.ok_or_else(|| missing("left singular vectors"))?;
    let v_thin = svd.v_t.ok_or_else(|| missing("right singular vectors"))?.transpose();

    let (u, v) = if full_matrices {
        (complete_basis(&u_thin, m), complete_basis(&v_thin, n))
    } else {
        (u_thin, v_thin)
    };
    Ok((values, Some((compat::dmatrix_to_tensor(&u), compat::dmatrix_to_tensor(&v)))))
}

/// Extend a matrix with orthonormal columns to a full orthonormal basis of
/// dimension `dim`.
///
/// QR of `[U | I]` processes the columns of `U` first, so columns `k..dim`
/// of its Q factor span the orthogonal complement of `col(U)`. The leading
/// columns are kept as `U` itself; the completion columns are
/// basis-ambiguous by construction and never value-compared downstream.
fn complete_basis(u: &DMatrix<f64>, dim: usize) -> DMatrix<f64> {
    let k = u.ncols();
    if k == dim {
        return u.clone();
    }
    let mut aug = DMatrix::<f64>::zeros(dim, k + dim);
    aug.view_mut((0, 0), (dim, k)).copy_from(u);
    for i in 0..dim {
        aug[(i, k + i)] = 1.0;
    }
    let q = nalgebra::QR::new(aug).q();

    let mut full = DMatrix::<f64>::zeros(dim, dim);
    full.view_mut((0, 0), (dim, k)).copy_from(u);
    full.view_mut((0, k), (dim, dim - k)).copy_from(&q.columns(k, dim - k));
    full
}
