//! Conversion of graph nodes into the functional runtime's representation.
//!
//! Two entry points mirror the converter's public surface: [`convert`]
//! returns the functional form together with any parameters extracted from
//! the node, and [`convert_functional`] insists the result is a pure
//! function of its inputs. The linear-algebra ops handled here carry no
//! state, so their parameter maps are always empty; the split is kept
//! because callers treat the two shapes differently.
//!
//! Conversion traces the node against example inputs: only shapes and
//! dtypes are read, the example values are never executed, so zero-filled
//! tensors are the conventional choice.

use std::collections::BTreeMap;

use crate::func;
use crate::graph::{EvalError, Node, RawOp};
use crate::tensor::{DType, TensorValue};

/// Parameters extracted from a node during conversion.
pub type Params = BTreeMap<String, TensorValue>;

/// Shape and dtype of one traced input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub dims: Vec<usize>,
    pub dtype: DType,
}

impl TensorSpec {
    fn of(value: &TensorValue) -> Self {
        Self { dims: value.dims(), dtype: value.dtype() }
    }

    fn describe(&self) -> String {
        format!("{:?}:{}", self.dims, self.dtype)
    }
}

/// Execution mode of a converted function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Dispatch and batch layout re-derived on every call.
    Interpret,
    /// Dispatch and batch layout resolved once, per-call work planned.
    Compiled,
}

/// Both execution modes, in the order suites exercise them.
pub const MODES: [Mode; 2] = [Mode::Interpret, Mode::Compiled];

/// Errors raised while converting a node.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("op {op} cannot be converted: {reason}")]
    Unsupported { op: &'static str, reason: String },

    #[error("conversion expects {expected} example input(s) for op {op}, got {got}")]
    ExampleArity { op: &'static str, expected: usize, got: usize },

    #[error("invalid example input: {0}")]
    InvalidExample(#[from] EvalError),

    #[error("converted function is not parameter-free: {count} parameter(s) extracted")]
    NotFunctional { count: usize },
}

/// Convert a node into functional form, returning the extracted parameters.
///
/// The example inputs fix the function's signature; subsequent calls must
/// match it exactly.
pub fn convert(node: &Node, examples: &[TensorValue]) -> Result<(ConvertedFn, Params), ConvertError> {
    let op = node.op;
    if examples.len() != op.input_arity() {
        return Err(ConvertError::ExampleArity {
            op: op.name(),
            expected: op.input_arity(),
            got: examples.len(),
        });
    }
    if let RawOp::Eig { compute_v: true } = op {
        if !func::capabilities().nonsymmetric_eig_vectors {
            return Err(ConvertError::Unsupported {
                op: op.name(),
                reason: "the functional runtime has no non-symmetric eigenvector solver"
                    .to_string(),
            });
        }
    }
    let spec = TensorSpec::of(&examples[0]);
    op.validate_input(&spec.dims, spec.dtype)?;

    let converted = ConvertedFn { op, signature: vec![spec] };
    // The linear-algebra ops are pure: nothing to extract.
    Ok((converted, Params::new()))
}

/// Convert a node into a pure function of its inputs.
///
/// Fails with [`ConvertError::NotFunctional`] if conversion extracted any
/// parameters.
pub fn convert_functional(node: &Node, examples: &[TensorValue]) -> Result<ConvertedFn, ConvertError> {
    let (converted, params) = convert(node, examples)?;
    if !params.is_empty() {
        return Err(ConvertError::NotFunctional { count: params.len() });
    }
    Ok(converted)
}

/// A node lowered to the functional runtime, with a traced input signature.
#[derive(Debug, Clone)]
pub struct ConvertedFn {
    op: RawOp,
    signature: Vec<TensorSpec>,
}

impl ConvertedFn {
    pub fn op(&self) -> RawOp {
        self.op
    }

    pub fn signature(&self) -> &[TensorSpec] {
        &self.signature
    }

    /// Interpreted call: parameters pass through unchanged for pure ops.
    pub fn call(
        &self,
        params: &Params,
        inputs: &[TensorValue],
    ) -> Result<(Vec<TensorValue>, Params), EvalError> {
        check_signature(&self.signature, inputs)?;
        let outputs = func::execute(self.op, inputs)?;
        Ok((outputs, params.clone()))
    }

    /// Resolve dispatch and batch layout once, against the traced signature.
    pub fn compile(&self) -> CompiledFn {
        let spec = &self.signature[0];
        let dims = &spec.dims;
        let rows = dims[dims.len() - 2];
        let cols = dims[dims.len() - 1];
        CompiledFn {
            op: self.op,
            signature: self.signature.clone(),
            rows,
            cols,
            batch_dims: dims[..dims.len() - 2].to_vec(),
        }
    }

    /// Execute in the given mode. Both modes are numerically identical.
    pub fn execute(&self, mode: Mode, inputs: &[TensorValue]) -> Result<Vec<TensorValue>, EvalError> {
        match mode {
            Mode::Interpret => {
                let (outputs, _) = self.call(&Params::new(), inputs)?;
                Ok(outputs)
            }
            Mode::Compiled => self.compile().call(inputs),
        }
    }
}

/// A converted function with its execution plan resolved.
#[derive(Debug, Clone)]
pub struct CompiledFn {
    op: RawOp,
    signature: Vec<TensorSpec>,
    rows: usize,
    cols: usize,
    batch_dims: Vec<usize>,
}

impl CompiledFn {
    pub fn call(&self, inputs: &[TensorValue]) -> Result<Vec<TensorValue>, EvalError> {
        check_signature(&self.signature, inputs)?;
        func::execute_planned(self.op, &inputs[0], self.rows, self.cols, &self.batch_dims)
    }
}

fn check_signature(signature: &[TensorSpec], inputs: &[TensorValue]) -> Result<(), EvalError> {
    if inputs.len() != signature.len() {
        return Err(EvalError::SignatureMismatch {
            index: signature.len().min(inputs.len()),
            expected: format!("{} input(s)", signature.len()),
            got: format!("{} input(s)", inputs.len()),
        });
    }
    for (index, (spec, input)) in signature.iter().zip(inputs).enumerate() {
        let got = TensorSpec::of(input);
        if got != *spec {
            return Err(EvalError::SignatureMismatch {
                index,
                expected: spec.describe(),
                got: got.describe(),
            });
        }
    }
    Ok(())
}
