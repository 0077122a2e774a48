//! The conversion-equivalence checker.
//!
//! One reusable procedure: convert a node against zero-filled example
//! inputs, execute the converted form in the requested modes and the node
//! eagerly with identical inputs, require identical output shapes, and
//! compare values under tolerance. Specialized suites (eigendecomposition,
//! SVD) reuse the converter directly and apply the policies from
//! [`crate::compare`] instead of plain elementwise equality.

use crate::compare::{self, CompareError};
use crate::convert::{convert, ConvertError, Mode, MODES};
use crate::graph::{EvalError, Node};
use crate::tensor::TensorValue;

/// Options of a conversion-equivalence check.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Absolute tolerance of the elementwise comparison.
    pub atol: f64,
    /// Relative tolerance of the elementwise comparison.
    pub rtol: f64,
    /// Compare shapes only, skipping values.
    pub shape_only: bool,
    /// Require that conversion extracted no parameters.
    pub functional: bool,
    /// Execution modes to exercise.
    pub modes: Vec<Mode>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            atol: 1e-5,
            rtol: compare::DEFAULT_RTOL,
            shape_only: false,
            functional: true,
            modes: MODES.to_vec(),
        }
    }
}

/// A conversion-equivalence check failure.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("eager execution failed: {0}")]
    Eager(EvalError),

    #[error("converted execution failed in {mode:?} mode: {source}")]
    Converted { mode: Mode, source: EvalError },

    #[error("expected no extracted parameters for a pure op, found {count}")]
    UnexpectedParams { count: usize },

    #[error("output arity mismatch: eager produced {eager}, converted produced {converted}")]
    OutputArity { eager: usize, converted: usize },

    #[error("output {index} differs in {mode:?} mode: {source}")]
    Mismatch { index: usize, mode: Mode, source: CompareError },
}

/// Check that converting-then-executing a node matches eager execution.
///
/// Returns the converted outputs of the last exercised mode (eager outputs
/// if `opts.modes` is empty, which still validates conversion itself).
pub fn check_conversion(
    node: &Node,
    inputs: &[TensorValue],
    opts: &CheckOptions,
) -> Result<Vec<TensorValue>, CheckError> {
    let examples: Vec<TensorValue> = inputs.iter().map(TensorValue::zeros_like).collect();
    let (converted, params) = convert(node, &examples)?;
    if opts.functional && !params.is_empty() {
        return Err(CheckError::UnexpectedParams { count: params.len() });
    }

    let eager_outputs = node.eval(inputs).map_err(CheckError::Eager)?;

    let mut last_outputs = eager_outputs.clone();
    for &mode in &opts.modes {
        let outputs = converted
            .execute(mode, inputs)
            .map_err(|source| CheckError::Converted { mode, source })?;
        if outputs.len() != eager_outputs.len() {
            return Err(CheckError::OutputArity {
                eager: eager_outputs.len(),
                converted: outputs.len(),
            });
        }
        for (index, (eager_out, converted_out)) in
            eager_outputs.iter().zip(outputs.iter()).enumerate()
        {
            if eager_out.dims() != converted_out.dims() {
                return Err(CheckError::Mismatch {
                    index,
                    mode,
                    source: CompareError::ShapeMismatch {
                        left: eager_out.dims(),
                        right: converted_out.dims(),
                    },
                });
            }
            if !opts.shape_only {
                compare::allclose(eager_out, converted_out, opts.atol, opts.rtol)
                    .map_err(|source| CheckError::Mismatch { index, mode, source })?;
            }
        }
        last_outputs = outputs;
    }
    Ok(last_outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RawOp;
    use mdarray::{DynRank, Tensor};

    fn spd_batch() -> TensorValue {
        // Diagonally dominant symmetric matrices are positive definite.
        let mut x: Tensor<f64, DynRank> = Tensor::zeros(&[2, 3, 3][..]);
        for b in 0..2 {
            for i in 0..3 {
                for j in 0..3 {
                    let v = if i == j { 5.0 + b as f64 } else { 1.0 };
                    x[&[b, i, j][..]] = v;
                }
            }
        }
        TensorValue::F64(x)
    }

    #[test]
    fn test_check_conversion_cholesky_both_modes() {
        let node = Node::new(RawOp::Cholesky, "cholesky");
        let outputs = check_conversion(&node, &[spd_batch()], &CheckOptions::default()).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].dims(), vec![2, 3, 3]);
    }

    #[test]
    fn test_check_conversion_shape_only() {
        let node = Node::new(RawOp::Cholesky, "cholesky");
        let opts = CheckOptions { shape_only: true, ..CheckOptions::default() };
        check_conversion(&node, &[spd_batch()], &opts).unwrap();
    }

    #[test]
    fn test_check_conversion_propagates_eager_failure() {
        let node = Node::new(RawOp::Cholesky, "cholesky");
        let mut x: Tensor<f64, DynRank> = Tensor::zeros(&[2, 2][..]);
        x[&[0, 0][..]] = 1.0;
        x[&[0, 1][..]] = 2.0;
        x[&[1, 0][..]] = 2.0;
        x[&[1, 1][..]] = 1.0;
        let err = check_conversion(&node, &[TensorValue::F64(x)], &CheckOptions::default())
            .unwrap_err();
        assert!(matches!(err, CheckError::Eager(EvalError::NotPositiveDefinite { .. })));
    }

    #[test]
    fn test_check_conversion_reports_unsupported() {
        let node = Node::new(RawOp::Eig { compute_v: true }, "eig");
        let input = TensorValue::zeros(&[3, 3], crate::tensor::DType::F64);
        let err = check_conversion(&node, &[input], &CheckOptions::default()).unwrap_err();
        assert!(matches!(err, CheckError::Convert(ConvertError::Unsupported { .. })));
    }
}
