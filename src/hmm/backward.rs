//!
//! Backward algorithm in log space
//!
use super::forward::Forward;
use crate::error::{CtHmmError, Result};
use crate::model::{EmissionTable, KernelCache};
use crate::prob::{lp, p, Prob};
use ndarray::{Array1, Array2};

///
/// Result of the backward algorithm. `log_beta[i, k]` is the log of the
/// scaled backward probability, with the same normalizers as the forward
/// run so that `alpha_i * beta_i` sums to 1.
///
#[derive(Debug, Clone)]
pub struct Backward {
    log_beta: Array2<f64>,
}

impl Backward {
    pub fn beta(&self, i: usize) -> Array1<f64> {
        self.log_beta.row(i).mapv(f64::exp)
    }
    pub fn betas(&self) -> Array2<f64> {
        self.log_beta.mapv(f64::exp)
    }
    pub fn log_beta(&self, i: usize, k: usize) -> f64 {
        self.log_beta[[i, k]]
    }
}

///
/// Run backward on an emission table.
///
/// ```text
/// beta_{m-1}[k] = 1
/// beta_i[k] = sum_l P[k,l] b_{i+1}[l] beta_{i+1}[l] / c_{i+1}
/// ```
///
/// The sum over `l` is taken with `Prob` (log-sum-exp).
///
pub fn backward(
    kernels: &KernelCache,
    gap_index: &[usize],
    table: &EmissionTable,
    forward: &Forward,
) -> Result<Backward> {
    let m = table.len();
    let n = forward.alpha(0).len();
    let mut log_beta = Array2::zeros((m, n));
    for i in (0..m.saturating_sub(1)).rev() {
        let kernel = kernels.get(gap_index[i]);
        let b = table.get(i + 1);
        let c = p(forward.c(i + 1));
        for k in 0..n {
            let s: Prob = (0..n)
                .map(|l| p(kernel[[k, l]]) * p(b[l]) * lp(log_beta[[i + 1, l]]))
                .sum();
            let v = s / c;
            if v.is_nan() {
                return Err(CtHmmError::NumericalInstability(format!(
                    "NaN in backward at observation {} state {}",
                    i, k
                )));
            }
            log_beta[[i, k]] = v.to_log_value();
        }
    }
    Ok(Backward { log_beta })
}
