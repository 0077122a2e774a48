//! Conversion-equivalence tests for the Cholesky op.

mod common;

use common::SimpleRng;
use graph2fn::gemm::matmul_f64;
use graph2fn::tensor::{decode_batch_index, mat_from_batch_f64};
use graph2fn::{
    check_conversion, CheckError, CheckOptions, DTensor, EvalError, Node, RawOp, TensorValue,
};

#[test]
fn test_cholesky_covariance_batch_matches_eager() {
    let mut rng = SimpleRng::new(42);
    let inputs = common::covariance_batch(&mut rng, 3, 5, 10);
    let node = Node::new(RawOp::Cholesky, "cholesky");

    let outputs = check_conversion(&node, &[inputs], &CheckOptions::default())
        .expect("converted Cholesky must match eager execution in both modes");
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].dims(), vec![3, 5, 5]);
}

#[test]
fn test_cholesky_unbatched() {
    let mut rng = SimpleRng::new(7);
    let cov = common::covariance(&mut rng, 5, 10);
    let mut t: graph2fn::Tensor<f64, graph2fn::DynRank> = graph2fn::Tensor::zeros(&[5, 5][..]);
    for i in 0..5 {
        for j in 0..5 {
            t[&[i, j][..]] = cov[[i, j]];
        }
    }
    let node = Node::new(RawOp::Cholesky, "cholesky");
    let outputs = check_conversion(&node, &[TensorValue::F64(t)], &CheckOptions::default())
        .expect("unbatched Cholesky must match");
    assert_eq!(outputs[0].dims(), vec![5, 5]);
}

#[test]
fn test_cholesky_factor_is_lower_triangular_and_recovers_input() {
    let mut rng = SimpleRng::new(42);
    let inputs = common::covariance_batch(&mut rng, 3, 5, 10);
    let node = Node::new(RawOp::Cholesky, "cholesky");
    let factors = node.eval(&[inputs.clone()]).expect("eager Cholesky");
    let l = factors[0].as_f64().expect("real factor");
    let x = inputs.as_f64().expect("real input");

    for b in 0..3 {
        let bidx = decode_batch_index(b, &[3]);
        let l_mat = mat_from_batch_f64(l, &bidx, 5, 5);
        // Strict upper triangle is zeroed.
        for i in 0..5 {
            for j in (i + 1)..5 {
                assert_eq!(l_mat[[i, j]], 0.0, "upper triangle not zero at {},{}", i, j);
            }
        }
        // Round trip: L * L^T recovers the input matrix.
        let l_t = DTensor::<f64, 2>::from_fn([5, 5], |idx| l_mat[[idx[1], idx[0]]]);
        let recovered = matmul_f64(&l_mat, &l_t);
        let original = mat_from_batch_f64(x, &bidx, 5, 5);
        for i in 0..5 {
            for j in 0..5 {
                assert!(
                    (recovered[[i, j]] - original[[i, j]]).abs() < 1e-10,
                    "batch {}: L L^T differs at {},{}",
                    b,
                    i,
                    j
                );
            }
        }
    }
}

#[test]
fn test_cholesky_rejects_indefinite_input() {
    let mut t: graph2fn::Tensor<f64, graph2fn::DynRank> = graph2fn::Tensor::zeros(&[2, 2][..]);
    t[&[0, 0][..]] = 1.0;
    t[&[0, 1][..]] = 2.0;
    t[&[1, 0][..]] = 2.0;
    t[&[1, 1][..]] = 1.0;
    let node = Node::new(RawOp::Cholesky, "cholesky");
    let err = check_conversion(&node, &[TensorValue::F64(t)], &CheckOptions::default())
        .expect_err("indefinite input must be rejected");
    assert!(matches!(err, CheckError::Eager(EvalError::NotPositiveDefinite { .. })));
}

#[test]
fn test_cholesky_rejects_rectangular_input() {
    let node = Node::new(RawOp::Cholesky, "cholesky");
    let input = TensorValue::zeros(&[4, 5], graph2fn::DType::F64);
    let err = check_conversion(&node, &[input], &CheckOptions::default())
        .expect_err("rectangular input must be rejected");
    assert!(matches!(err, CheckError::Convert(_)));
}
