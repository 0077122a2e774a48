//! Conversion-equivalence tests for general (non-symmetric) eigendecomposition.
//!
//! Eigenvalue ordering is not consistent across backends even after
//! sorting, so spectra are compared as unordered multisets. No ordering of
//! the eigenvalues themselves is asserted.

mod common;

use common::SimpleRng;
use graph2fn::{
    capabilities, check_eigenpairs, convert_functional, match_eigenvalues, ConvertError, Node,
    RawOp, TensorValue, MODES,
};

const SHAPES: [&[usize]; 3] = [&[5, 5], &[3, 5, 5], &[2, 3, 5, 5]];

#[test]
fn test_eig_eigenvalue_multisets_match() {
    let mut rng = SimpleRng::new(42);
    let node = Node::new(RawOp::Eig { compute_v: false }, "eig");

    for shape in SHAPES {
        let inputs = common::normal_tensor(&mut rng, shape);
        let eager = node.eval(&[inputs.clone()]).expect("eager eig");
        let converted = convert_functional(&node, &[inputs.zeros_like()]).expect("convert eig");

        for mode in MODES {
            let outputs = converted.execute(mode, &[inputs.clone()]).expect("converted eig");
            assert_eq!(outputs.len(), eager.len());
            assert_eq!(outputs[0].dims(), eager[0].dims(), "eigenvalue shape for {:?}", shape);
            assert_eq!(outputs[1].dims(), eager[1].dims(), "placeholder shape for {:?}", shape);

            match_eigenvalues(&outputs[0], &eager[0], 1e-5)
                .unwrap_or_else(|e| panic!("spectra differ for {:?} in {:?} mode: {}", shape, mode, e));
        }
    }
}

#[test]
fn test_eig_eager_vectors_satisfy_defining_relation() {
    // The graph runtime computes non-symmetric eigenvectors; they are
    // validated through A . V = V . diag(w), never compared across
    // frameworks (eigenvectors are unique only up to scale/phase).
    let mut rng = SimpleRng::new(42);
    let node = Node::new(RawOp::Eig { compute_v: true }, "eig");

    for shape in SHAPES {
        let inputs = common::normal_tensor(&mut rng, shape);
        let outputs = node.eval(&[inputs.clone()]).expect("eager eig with vectors");
        check_eigenpairs(&inputs, &outputs[0], &outputs[1], 1e-5, 1e-6)
            .unwrap_or_else(|e| panic!("defining relation fails for {:?}: {}", shape, e));
    }
}

#[test]
fn test_eig_with_vectors_skips_on_capability_gap() {
    let node = Node::new(RawOp::Eig { compute_v: true }, "eig");

    if !capabilities().nonsymmetric_eig_vectors {
        // Conversion must refuse with a typed error rather than panic; the
        // suite skips rather than fails on the known gap.
        let example = TensorValue::zeros(&[5, 5], graph2fn::DType::F64);
        let err = convert_functional(&node, &[example])
            .expect_err("conversion must report the capability gap");
        assert!(matches!(err, ConvertError::Unsupported { op: "Eig", .. }));
        println!("skipping: functional runtime does not support non-symmetric eigenvectors");
        return;
    }

    let mut rng = SimpleRng::new(42);
    for shape in SHAPES {
        let inputs = common::normal_tensor(&mut rng, shape);
        let eager = node.eval(&[inputs.clone()]).expect("eager eig");
        let converted = convert_functional(&node, &[inputs.zeros_like()]).expect("convert eig");
        for mode in MODES {
            let outputs = converted.execute(mode, &[inputs.clone()]).expect("converted eig");
            match_eigenvalues(&outputs[0], &eager[0], 1e-5).expect("spectra match");
            check_eigenpairs(&inputs, &eager[0], &eager[1], 1e-5, 1e-6)
                .expect("eager defining relation");
            check_eigenpairs(&inputs, &outputs[0], &outputs[1], 1e-5, 1e-6)
                .expect("converted defining relation");
        }
    }
}
