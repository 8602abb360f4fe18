//!
//! Dense linear algebra used by the learner
//!
//! * `expm`: matrix exponential by Padé(13) scaling and squaring
//! * `EigenDecomposition`: complex right-eigen decomposition `Q = U diag(D) V`
//!   with `V = U^{-1}`, backed by LAPACK through ndarray-linalg.
//!
pub mod eigen;
pub mod expm;

pub use eigen::EigenDecomposition;
pub use expm::expm;

use ndarray::Array2;

///
/// max absolute entry of a real matrix
///
pub fn max_abs(a: &Array2<f64>) -> f64 {
    a.iter().fold(0.0, |m, x| m.max(x.abs()))
}

///
/// true if every entry is finite (neither NaN nor Inf)
///
pub fn all_finite(a: &Array2<f64>) -> bool {
    a.iter().all(|x| x.is_finite())
}
