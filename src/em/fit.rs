//!
//! Training record
//!
use crate::model::ModelState;
use serde::{Deserialize, Serialize};

///
/// Phase of the learner
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmState {
    Init,
    EStep,
    MStep,
    Converged,
    MaxIterReached,
}

///
/// Result of `Learner::train`
///
/// `trace[k]` is the log-likelihood of the model that entered the `k`-th
/// E-step. `model` is the model after the last M-step.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fit {
    pub model: ModelState,
    pub trace: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl Fit {
    ///
    /// last evaluated log-likelihood
    ///
    pub fn log_likelihood(&self) -> Option<f64> {
        self.trace.last().copied()
    }
    ///
    /// `|trace[-1] - trace[-2]|`, infinite with less than two entries
    ///
    pub fn last_delta(&self) -> f64 {
        match self.trace.as_slice() {
            [.., a, b] => (b - a).abs(),
            _ => f64::INFINITY,
        }
    }
    ///
    /// the trace never decreases by more than `slack`
    ///
    pub fn is_monotone(&self, slack: f64) -> bool {
        self.trace.windows(2).all(|w| w[1] >= w[0] - slack)
    }
}
