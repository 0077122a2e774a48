//! Common test utilities
#![allow(dead_code)]

use graph2fn::{DTensor, DynRank, Tensor, TensorValue};

/// Simple deterministic pseudo-random number generator (LCG)
///
/// Linear Congruential Generator for reproducible random numbers in tests.
/// Uses the common parameters a = 1664525, c = 1013904223.
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next f64 in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        ((self.state >> 16) as f64) / ((1u64 << 48) as f64)
    }

    /// Standard normal deviate via Box-Muller.
    pub fn next_normal(&mut self) -> f64 {
        let u1 = 1.0 - self.next_f64(); // (0, 1], keeps the log finite
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// Tensor of standard normal deviates with the given shape.
pub fn normal_tensor(rng: &mut SimpleRng, dims: &[usize]) -> TensorValue {
    let mut t: Tensor<f64, DynRank> = Tensor::zeros(dims);
    let total: usize = dims.iter().product();
    let mut idx = vec![0usize; dims.len()];
    for _ in 0..total {
        t[&idx[..]] = rng.next_normal();
        // Increment the multi-index, last axis fastest.
        for d in (0..dims.len()).rev() {
            idx[d] += 1;
            if idx[d] < dims[d] {
                break;
            }
            idx[d] = 0;
        }
    }
    TensorValue::F64(t)
}

/// Sample covariance of `n` variables observed `samples` times.
///
/// Positive definite with probability one for `samples > n`.
pub fn covariance(rng: &mut SimpleRng, n: usize, samples: usize) -> DTensor<f64, 2> {
    // Draw in a fixed row-major order so the data is reproducible.
    let mut raw = vec![0.0; n * samples];
    for value in raw.iter_mut() {
        *value = rng.next_normal();
    }
    let data = DTensor::<f64, 2>::from_fn([n, samples], |idx| raw[idx[0] * samples + idx[1]]);
    let means: Vec<f64> = (0..n)
        .map(|i| (0..samples).map(|s| data[[i, s]]).sum::<f64>() / samples as f64)
        .collect();
    DTensor::<f64, 2>::from_fn([n, n], |idx| {
        let (i, j) = (idx[0], idx[1]);
        let mut sum = 0.0;
        for s in 0..samples {
            sum += (data[[i, s]] - means[i]) * (data[[j, s]] - means[j]);
        }
        sum / (samples - 1) as f64
    })
}

/// Batch of sample covariance matrices, shape `[batch, n, n]`.
pub fn covariance_batch(rng: &mut SimpleRng, batch: usize, n: usize, samples: usize) -> TensorValue {
    let mut t: Tensor<f64, DynRank> = Tensor::zeros(&[batch, n, n][..]);
    for b in 0..batch {
        let cov = covariance(rng, n, samples);
        for i in 0..n {
            for j in 0..n {
                t[&[b, i, j][..]] = cov[[i, j]];
            }
        }
    }
    TensorValue::F64(t)
}
