//!
//! Pairwise beliefs of consecutive observations
//!
use crate::error::{CtHmmError, Result};
use ndarray::{Array1, Array2, ArrayView1};

///
/// Joint posterior of the states at `t_i` and `t_{i+1}`
///
/// ```text
/// zeta[k,l]  = P[k,l] alpha_i[k] w[l] / L,   w = beta_{i+1} * b_{i+1}
/// L          = alpha_i P w
/// ratio[k,l] = zeta[k,l] / P[k,l]            (0 where P[k,l] = 0)
/// ```
///
/// `ratio` is the matrix contracted with the end-state integrals to get the
/// expected sojourn times and transition counts of the step.
///
#[derive(Debug, Clone)]
pub struct Pairwise {
    zeta: Array2<f64>,
    ratio: Array2<f64>,
}

impl Pairwise {
    pub fn new(kernel: &Array2<f64>, alpha: ArrayView1<f64>, w: &Array1<f64>) -> Result<Pairwise> {
        let l = alpha.dot(&kernel.dot(w));
        if !(l.is_finite() && l > 0.0) {
            return Err(CtHmmError::NumericalInstability(format!(
                "pairwise normalizer is {}",
                l
            )));
        }
        let n = alpha.len();
        let ratio = Array2::from_shape_fn((n, n), |(k, j)| {
            if kernel[[k, j]] > 0.0 {
                alpha[k] * w[j] / l
            } else {
                0.0
            }
        });
        let zeta = &ratio * kernel;
        Ok(Pairwise { zeta, ratio })
    }
    pub fn zeta(&self) -> &Array2<f64> {
        &self.zeta
    }
    pub fn ratio(&self) -> &Array2<f64> {
        &self.ratio
    }
}
