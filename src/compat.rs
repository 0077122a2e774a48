//! Compatibility layer between the array representations at the runtime
//! boundaries.
//!
//! The exchange type is an mdarray tensor; the eager runtime works on
//! ndarray arrays and the functional runtime on nalgebra matrices. These
//! conversions are all element-copying, which is fine at the matrix sizes
//! the conversion checker handles.

use mdarray::DTensor;
use nalgebra::{DMatrix, DVector, Scalar};
use ndarray::{Array1, Array2};

/// Convert an mdarray matrix to an ndarray Array2.
pub fn tensor_to_array2<T: Clone>(t: &DTensor<T, 2>) -> Array2<T> {
    let (m, n) = *t.shape();
    let mut vec = Vec::with_capacity(m * n);
    for i in 0..m {
        for j in 0..n {
            vec.push(t[[i, j]].clone());
        }
    }
    Array2::from_shape_vec((m, n), vec).expect("shape and data length agree by construction")
}

/// Convert an ndarray Array2 to an mdarray matrix.
pub fn array2_to_tensor<T: Clone>(arr: &Array2<T>) -> DTensor<T, 2> {
    let (m, n) = (arr.nrows(), arr.ncols());
    DTensor::<T, 2>::from_fn([m, n], |idx| arr[[idx[0], idx[1]]].clone())
}

/// Convert an ndarray Array1 to a plain vector.
pub fn array1_to_vec<T: Clone>(arr: &Array1<T>) -> Vec<T> {
    arr.iter().cloned().collect()
}

/// Convert an mdarray matrix to a nalgebra DMatrix.
pub fn tensor_to_dmatrix<T: Scalar>(t: &DTensor<T, 2>) -> DMatrix<T> {
    let (m, n) = *t.shape();
    DMatrix::from_fn(m, n, |i, j| t[[i, j]].clone())
}

/// Convert a nalgebra DMatrix to an mdarray matrix.
pub fn dmatrix_to_tensor<T: Scalar>(m: &DMatrix<T>) -> DTensor<T, 2> {
    DTensor::<T, 2>::from_fn([m.nrows(), m.ncols()], |idx| m[(idx[0], idx[1])].clone())
}

/// Convert a nalgebra DVector to a plain vector.
pub fn dvector_to_vec<T: Scalar>(v: &DVector<T>) -> Vec<T> {
    v.iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdarray::tensor;
    use ndarray::array;

    #[test]
    fn test_tensor_to_array2() {
        let t: DTensor<f64, 2> = tensor![[1.0, 2.0], [3.0, 4.0]];
        let arr = tensor_to_array2(&t);
        assert_eq!(arr[[0, 1]], 2.0);
        assert_eq!(arr[[1, 0]], 3.0);
    }

    #[test]
    fn test_roundtrip_ndarray() {
        let arr = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let t = array2_to_tensor(&arr);
        let back = tensor_to_array2(&t);
        assert_eq!(arr, back);
    }

    #[test]
    fn test_roundtrip_nalgebra() {
        let t: DTensor<f64, 2> = tensor![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let m = tensor_to_dmatrix(&t);
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 2);
        let back = dmatrix_to_tensor(&m);
        for i in 0..3 {
            for j in 0..2 {
                assert_eq!(back[[i, j]], t[[i, j]]);
            }
        }
    }

    #[test]
    fn test_dvector_to_vec() {
        let v = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(dvector_to_vec(&v), vec![1.0, 2.0, 3.0]);
    }
}
