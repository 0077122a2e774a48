//! Op-graph layer: raw linear-algebra operations and single-op nodes.
//!
//! A [`Node`] is the unit the converter consumes: one raw op plus its
//! attributes, under a graph-unique name. Nodes execute eagerly on the
//! LAPACK-backed runtime via [`Node::eval`]; the converter lowers them to
//! the functional runtime.

use crate::eager;
use crate::tensor::{DType, TensorValue};

/// A raw linear-algebra operation with its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawOp {
    /// Lower-triangular Cholesky factor of a positive-definite matrix.
    Cholesky,
    /// General (non-symmetric) eigendecomposition. Output dtype is complex.
    Eig { compute_v: bool },
    /// Symmetric eigendecomposition reading only the lower triangle.
    /// Eigenvalues are emitted in non-descending order.
    SelfAdjointEig { compute_v: bool },
    /// Singular value decomposition. Singular values are emitted in
    /// non-ascending order; `v` holds right singular vectors as columns
    /// (not transposed).
    Svd { compute_uv: bool, full_matrices: bool },
}

impl RawOp {
    pub fn name(&self) -> &'static str {
        match self {
            RawOp::Cholesky => "Cholesky",
            RawOp::Eig { .. } => "Eig",
            RawOp::SelfAdjointEig { .. } => "SelfAdjointEig",
            RawOp::Svd { .. } => "Svd",
        }
    }

    /// Number of input tensors the op consumes.
    pub fn input_arity(&self) -> usize {
        1
    }

    /// Number of output tensors the op produces.
    ///
    /// Arity is fixed per op; outputs an op was asked not to compute are
    /// emitted as empty placeholders, so converted and eager outputs always
    /// zip positionally.
    pub fn output_arity(&self) -> usize {
        match self {
            RawOp::Cholesky => 1,
            RawOp::Eig { .. } | RawOp::SelfAdjointEig { .. } => 2,
            RawOp::Svd { .. } => 3,
        }
    }

    /// Whether the op requires a square trailing matrix.
    pub fn requires_square(&self) -> bool {
        !matches!(self, RawOp::Svd { .. })
    }

    /// Validate a single input's shape and dtype against the op contract.
    ///
    /// Returns `(rows, cols, batch_dims)` of the trailing matrix axes.
    pub fn validate_input(
        &self,
        dims: &[usize],
        dtype: DType,
    ) -> Result<(usize, usize, Vec<usize>), EvalError> {
        if dtype != DType::F64 {
            return Err(EvalError::Dtype {
                op: self.name(),
                got: dtype,
                expected: DType::F64,
            });
        }
        if dims.len() < 2 {
            return Err(EvalError::RankTooSmall {
                op: self.name(),
                rank: dims.len(),
            });
        }
        let rows = dims[dims.len() - 2];
        let cols = dims[dims.len() - 1];
        if self.requires_square() && rows != cols {
            return Err(EvalError::NotSquare { op: self.name(), rows, cols });
        }
        Ok((rows, cols, dims[..dims.len() - 2].to_vec()))
    }
}

/// A named single-op graph node.
#[derive(Debug, Clone)]
pub struct Node {
    pub op: RawOp,
    pub name: String,
}

impl Node {
    pub fn new(op: RawOp, name: impl Into<String>) -> Self {
        Self { op, name: name.into() }
    }

    /// Execute the node eagerly on the graph runtime.
    pub fn eval(&self, inputs: &[TensorValue]) -> Result<Vec<TensorValue>, EvalError> {
        eager::execute(self.op, inputs)
    }
}

/// Errors raised while executing an op on either runtime.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("op {op} expects exactly {expected} input(s), got {got}")]
    InputArity { op: &'static str, expected: usize, got: usize },

    #[error("op {op}: input of rank {rank} is below the minimum rank 2")]
    RankTooSmall { op: &'static str, rank: usize },

    #[error("op {op}: trailing matrix of {rows}x{cols} must be square")]
    NotSquare { op: &'static str, rows: usize, cols: usize },

    #[error("op {op}: input dtype {got} unsupported, expected {expected}")]
    Dtype { op: &'static str, got: DType, expected: DType },

    #[error("op {op}: matrix at batch index {batch:?} is not positive definite")]
    NotPositiveDefinite { op: &'static str, batch: Vec<usize> },

    #[error("op {op}: {backend} backend failed: {message}")]
    Backend { op: &'static str, backend: &'static str, message: String },

    #[error("op {op} is not supported by the {runtime} runtime: {what}")]
    Unsupported { op: &'static str, runtime: &'static str, what: &'static str },

    #[error("input {index} does not match the traced signature: expected {expected}, got {got}")]
    SignatureMismatch { index: usize, expected: String, got: String },
}
