//! # graph2fn: op-graph to functional-form conversion, with equivalence checking
//!
//! Lowers single-op linear-algebra graph nodes (Cholesky, general and
//! symmetric eigendecomposition, SVD) into pure functions executed by a
//! functional runtime, and validates that converting-then-executing matches
//! direct eager execution under floating-point tolerance, batching, and the
//! sign/ordering ambiguities the decompositions carry.

pub mod compare;
pub mod compat;
pub mod convert;
pub mod eager;
pub mod func;
pub mod gemm;
pub mod graph;
pub mod harness;
pub mod tensor;

// Re-export commonly used types and entry points
pub use compare::{
    allclose, align_singular_vectors, check_eigenpairs, check_nondescending, check_orthonormal,
    compare_singular_vectors, match_eigenvalues, svd_reconstruct, CompareError, DEFAULT_ATOL,
    DEFAULT_RTOL,
};
pub use convert::{
    convert, convert_functional, CompiledFn, ConvertError, ConvertedFn, Mode, Params, TensorSpec,
    MODES,
};
pub use func::{capabilities, Capabilities};
pub use graph::{EvalError, Node, RawOp};
pub use harness::{check_conversion, CheckError, CheckOptions};
pub use tensor::{symmetrize_lower, truncate_last_axis, C64, DType, TensorValue};

// Re-export external dependencies for convenience
pub use mdarray::{DTensor, DynRank, Tensor};
