//! Matrix multiplication with a pluggable backend.
//!
//! The comparison policies multiply matrices when reconstructing
//! decompositions and checking defining relations. The default backend is
//! Faer (pure Rust, parallelized); a naive triple-loop backend can be
//! selected at runtime, mostly to cross-check the dispatcher itself.

use mdarray::DTensor;
use num_complex::Complex;
use once_cell::sync::Lazy;
use std::sync::RwLock;

use crate::tensor::C64;

/// GEMM backend for runtime dispatch.
pub trait GemmBackend: Send + Sync {
    /// C = A * B, row-major f64 buffers.
    fn dgemm(&self, m: usize, n: usize, k: usize, a: &[f64], b: &[f64], c: &mut [f64]);

    /// C = A * B, row-major Complex<f64> buffers.
    fn zgemm(&self, m: usize, n: usize, k: usize, a: &[C64], b: &[C64], c: &mut [C64]);

    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Default Faer backend (pure Rust).
struct FaerBackend;

impl GemmBackend for FaerBackend {
    fn dgemm(&self, m: usize, n: usize, k: usize, a: &[f64], b: &[f64], c: &mut [f64]) {
        use mdarray_linalg::matmul::{MatMul, MatMulBuilder};
        use mdarray_linalg_faer::Faer;

        let a_tensor = DTensor::<f64, 2>::from_fn([m, k], |idx| a[idx[0] * k + idx[1]]);
        let b_tensor = DTensor::<f64, 2>::from_fn([k, n], |idx| b[idx[0] * n + idx[1]]);
        let c_tensor = Faer.matmul(&a_tensor, &b_tensor).parallelize().eval();
        for i in 0..m {
            for j in 0..n {
                c[i * n + j] = c_tensor[[i, j]];
            }
        }
    }

    fn zgemm(&self, m: usize, n: usize, k: usize, a: &[C64], b: &[C64], c: &mut [C64]) {
        use mdarray_linalg::matmul::{MatMul, MatMulBuilder};
        use mdarray_linalg_faer::Faer;

        let a_tensor = DTensor::<C64, 2>::from_fn([m, k], |idx| a[idx[0] * k + idx[1]]);
        let b_tensor = DTensor::<C64, 2>::from_fn([k, n], |idx| b[idx[0] * n + idx[1]]);
        let c_tensor = Faer.matmul(&a_tensor, &b_tensor).parallelize().eval();
        for i in 0..m {
            for j in 0..n {
                c[i * n + j] = c_tensor[[i, j]];
            }
        }
    }

    fn name(&self) -> &'static str {
        "Faer (Pure Rust)"
    }
}

/// Naive triple-loop backend.
struct NaiveBackend;

impl GemmBackend for NaiveBackend {
    fn dgemm(&self, m: usize, n: usize, k: usize, a: &[f64], b: &[f64], c: &mut [f64]) {
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0;
                for l in 0..k {
                    sum += a[i * k + l] * b[l * n + j];
                }
                c[i * n + j] = sum;
            }
        }
    }

    fn zgemm(&self, m: usize, n: usize, k: usize, a: &[C64], b: &[C64], c: &mut [C64]) {
        for i in 0..m {
            for j in 0..n {
                let mut sum = Complex::new(0.0, 0.0);
                for l in 0..k {
                    sum += a[i * k + l] * b[l * n + j];
                }
                c[i * n + j] = sum;
            }
        }
    }

    fn name(&self) -> &'static str {
        "Naive"
    }
}

/// Global GEMM dispatcher (thread-safe).
static GEMM_DISPATCHER: Lazy<RwLock<Box<dyn GemmBackend>>> =
    Lazy::new(|| RwLock::new(Box::new(FaerBackend)));

/// Select the naive backend.
pub fn use_naive_backend() {
    let mut dispatcher = GEMM_DISPATCHER.write().unwrap();
    *dispatcher = Box::new(NaiveBackend);
}

/// Reset to the default Faer backend.
pub fn use_faer_backend() {
    let mut dispatcher = GEMM_DISPATCHER.write().unwrap();
    *dispatcher = Box::new(FaerBackend);
}

/// Name of the currently selected backend.
pub fn backend_name() -> &'static str {
    GEMM_DISPATCHER.read().unwrap().name()
}

/// Matrix multiplication C = A * B for f64 matrices.
///
/// # Panics
/// Panics if `A.cols != B.rows`.
pub fn matmul_f64(a: &DTensor<f64, 2>, b: &DTensor<f64, 2>) -> DTensor<f64, 2> {
    let (m, k) = *a.shape();
    let (k2, n) = *b.shape();
    assert_eq!(k, k2, "matrix dimension mismatch: A.cols ({}) != B.rows ({})", k, k2);

    let mut a_vec = Vec::with_capacity(m * k);
    for i in 0..m {
        for j in 0..k {
            a_vec.push(a[[i, j]]);
        }
    }
    let mut b_vec = Vec::with_capacity(k * n);
    for i in 0..k {
        for j in 0..n {
            b_vec.push(b[[i, j]]);
        }
    }
    let mut c_vec = vec![0.0; m * n];
    GEMM_DISPATCHER.read().unwrap().dgemm(m, n, k, &a_vec, &b_vec, &mut c_vec);
    DTensor::<f64, 2>::from_fn([m, n], |idx| c_vec[idx[0] * n + idx[1]])
}

/// Matrix multiplication C = A * B for Complex<f64> matrices.
///
/// # Panics
/// Panics if `A.cols != B.rows`.
pub fn matmul_c64(a: &DTensor<C64, 2>, b: &DTensor<C64, 2>) -> DTensor<C64, 2> {
    let (m, k) = *a.shape();
    let (k2, n) = *b.shape();
    assert_eq!(k, k2, "matrix dimension mismatch: A.cols ({}) != B.rows ({})", k, k2);

    let mut a_vec = Vec::with_capacity(m * k);
    for i in 0..m {
        for j in 0..k {
            a_vec.push(a[[i, j]]);
        }
    }
    let mut b_vec = Vec::with_capacity(k * n);
    for i in 0..k {
        for j in 0..n {
            b_vec.push(b[[i, j]]);
        }
    }
    let mut c_vec = vec![Complex::new(0.0, 0.0); m * n];
    GEMM_DISPATCHER.read().unwrap().zgemm(m, n, k, &a_vec, &b_vec, &mut c_vec);
    DTensor::<C64, 2>::from_fn([m, n], |idx| c_vec[idx[0] * n + idx[1]])
}
