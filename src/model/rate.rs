//!
//! Generator (rate) matrix Q of the latent continuous-time Markov chain
//!
//! ```text
//! Q[i,j] >= 0            (i != j, allowed by the mask)
//! Q[i,j] == 0            (i != j, forbidden by the mask)
//! Q[i,i] = -sum_{j!=i} Q[i,j]
//! ```
//!
use crate::error::{CtHmmError, Result};
use ndarray::Array2;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// tolerance of `|sum_j Q[i,j]|`
pub const ROW_SUM_TOL: f64 = 1e-6;

/// default seed of `RateMatrix::random`
pub const DEFAULT_SEED: u64 = 65;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateMatrix {
    q: Array2<f64>,
    mask: Array2<bool>,
}

impl RateMatrix {
    ///
    /// Validate a user supplied generator against the structural mask.
    ///
    pub fn new(q: Array2<f64>, mask: Array2<bool>) -> Result<RateMatrix> {
        let n = mask.nrows();
        if mask.ncols() != n {
            return Err(CtHmmError::DimensionMismatch {
                what: "mask columns",
                expected: n,
                actual: mask.ncols(),
            });
        }
        if q.dim() != (n, n) {
            return Err(CtHmmError::InvalidGenerator(format!(
                "Q is {}x{} but the state space has {} states",
                q.nrows(),
                q.ncols(),
                n
            )));
        }
        for ((i, j), &x) in q.indexed_iter() {
            if !x.is_finite() {
                return Err(CtHmmError::InvalidGenerator(format!(
                    "Q[{},{}] is not finite",
                    i, j
                )));
            }
            if i == j {
                continue;
            }
            if x < 0.0 {
                return Err(CtHmmError::InvalidGenerator(format!(
                    "negative rate Q[{},{}]={}",
                    i, j, x
                )));
            }
            if x != 0.0 && !mask[[i, j]] {
                return Err(CtHmmError::InvalidGenerator(format!(
                    "Q[{},{}]={} is forbidden by the topology",
                    i, j, x
                )));
            }
        }
        for (i, row) in q.rows().into_iter().enumerate() {
            let sum: f64 = row.sum();
            if sum.abs() > ROW_SUM_TOL {
                return Err(CtHmmError::InvalidGenerator(format!(
                    "row {} sums to {}",
                    i, sum
                )));
            }
        }
        Ok(RateMatrix { q, mask })
    }
    ///
    /// Random generator: every allowed off-diagonal rate is uniform in `[0, 1)`.
    ///
    pub fn random(mask: Array2<bool>, seed: u64) -> RateMatrix {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let n = mask.nrows();
        let mut rates = Array2::zeros((n, n));
        for ((i, j), &allowed) in mask.indexed_iter() {
            if allowed && i != j {
                rates[[i, j]] = rng.gen::<f64>();
            }
        }
        RateMatrix::from_rates(rates, mask)
    }
    ///
    /// Build from off-diagonal rates. Entries outside the mask (and the
    /// diagonal) of `rates` are ignored; the diagonal is set to minus the
    /// row sum.
    ///
    pub(crate) fn from_rates(rates: Array2<f64>, mask: Array2<bool>) -> RateMatrix {
        let n = mask.nrows();
        let mut q = Array2::from_shape_fn((n, n), |(i, j)| {
            if i != j && mask[[i, j]] {
                rates[[i, j]]
            } else {
                0.0
            }
        });
        for i in 0..n {
            let exit: f64 = q.row(i).sum();
            q[[i, i]] = -exit;
        }
        RateMatrix { q, mask }
    }
    pub fn q(&self) -> &Array2<f64> {
        &self.q
    }
    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }
    /// number of states
    pub fn n(&self) -> usize {
        self.q.nrows()
    }
    ///
    /// `Q[i,j]`
    ///
    pub fn rate(&self, i: usize, j: usize) -> f64 {
        self.q[[i, j]]
    }
    ///
    /// total exit rate `-Q[i,i]`
    ///
    pub fn exit_rate(&self, i: usize) -> f64 {
        -self.q[[i, i]]
    }
    ///
    /// state `i` has at least one allowed exit
    ///
    pub fn has_exits(&self, i: usize) -> bool {
        self.mask.row(i).iter().any(|&b| b)
    }
    ///
    /// list of allowed `(i, j)` pairs
    ///
    pub fn allowed(&self) -> Vec<(usize, usize)> {
        self.mask
            .indexed_iter()
            .filter(|&(_, &b)| b)
            .map(|(ij, _)| ij)
            .collect()
    }
}

//
// tests
//
