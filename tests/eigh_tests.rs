//! Conversion-equivalence tests for symmetric eigendecomposition.
//!
//! Both runtimes read only the lower triangle of the input, so the
//! defining relation is checked against the lower-symmetrized matrix.

mod common;

use common::SimpleRng;
use graph2fn::{
    check_eigenpairs, check_nondescending, convert_functional, match_eigenvalues,
    symmetrize_lower, Node, RawOp, MODES,
};

const SHAPES: [&[usize]; 3] = [&[5, 5], &[3, 5, 5], &[2, 3, 5, 5]];

#[test]
fn test_eigh_values_nondescending_and_matching() {
    let mut rng = SimpleRng::new(42);
    let node = Node::new(RawOp::SelfAdjointEig { compute_v: false }, "eigh");

    for shape in SHAPES {
        let inputs = common::normal_tensor(&mut rng, shape);
        let eager = node.eval(&[inputs.clone()]).expect("eager eigh");
        let converted = convert_functional(&node, &[inputs.zeros_like()]).expect("convert eigh");

        // Each framework's own spectrum must already be sorted.
        check_nondescending(&eager[0]).expect("eager eigenvalues sorted");

        for mode in MODES {
            let outputs = converted.execute(mode, &[inputs.clone()]).expect("converted eigh");
            assert_eq!(outputs[0].dims(), eager[0].dims(), "eigenvalue shape for {:?}", shape);
            assert_eq!(outputs[1].dims(), eager[1].dims(), "placeholder shape for {:?}", shape);

            check_nondescending(&outputs[0]).expect("converted eigenvalues sorted");
            // Cross-framework comparison is still order-insensitive.
            match_eigenvalues(&outputs[0], &eager[0], 1e-5)
                .unwrap_or_else(|e| panic!("spectra differ for {:?} in {:?} mode: {}", shape, mode, e));
        }
    }
}

#[test]
fn test_eigh_vectors_satisfy_defining_relation() {
    let mut rng = SimpleRng::new(42);
    let node = Node::new(RawOp::SelfAdjointEig { compute_v: true }, "eigh");

    for shape in SHAPES {
        let inputs = common::normal_tensor(&mut rng, shape);
        let sym = symmetrize_lower(&inputs).expect("square real input");
        let eager = node.eval(&[inputs.clone()]).expect("eager eigh");
        let converted = convert_functional(&node, &[inputs.zeros_like()]).expect("convert eigh");

        check_eigenpairs(&sym, &eager[0], &eager[1], 1e-5, 1e-6)
            .unwrap_or_else(|e| panic!("eager defining relation fails for {:?}: {}", shape, e));

        for mode in MODES {
            let outputs = converted.execute(mode, &[inputs.clone()]).expect("converted eigh");
            assert_eq!(outputs[1].dims(), eager[1].dims());
            check_nondescending(&outputs[0]).expect("converted eigenvalues sorted");
            match_eigenvalues(&outputs[0], &eager[0], 1e-5).expect("spectra match");
            check_eigenpairs(&sym, &outputs[0], &outputs[1], 1e-5, 1e-6).unwrap_or_else(|e| {
                panic!("converted defining relation fails for {:?} in {:?} mode: {}", shape, mode, e)
            });
        }
    }
}
