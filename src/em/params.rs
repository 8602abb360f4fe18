//!
//! Training parameters of the EM learner
//!
use crate::model::emission::MIN_SD;
use crate::stats::EigenMode;
use serde::{Deserialize, Serialize};

/// default lower bound of the estimated rates when flooring is on
pub const RATE_FLOOR: f64 = 1e-10;

///
/// Parameters of `Learner::train`
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    /// stop when `|loglik_new - loglik_old| <= tol`
    pub tol: f64,
    /// iteration cap
    pub max_iter: usize,
    /// log every iteration at info level (debug level otherwise)
    pub verbose: bool,
    /// re-estimate the emission means
    pub update_mu: bool,
    /// re-estimate the emission standard deviations
    pub update_sigma: bool,
    /// lower bound of the allowed rates, used when the learner bounds rates
    pub rate_floor: f64,
    /// lower bound of re-estimated standard deviations
    pub min_sd: f64,
    pub eigen_mode: EigenMode,
    /// use the augmented exponential for an iteration whose Q cannot be
    /// eigendecomposed
    pub fallback_to_augmented: bool,
    /// run the per-sequence E-step on the rayon thread pool
    pub parallel: bool,
}

impl TrainParams {
    pub fn new(tol: f64, max_iter: usize) -> TrainParams {
        TrainParams {
            tol,
            max_iter,
            ..TrainParams::default()
        }
    }
    ///
    /// Re-estimate Q, pi0 and all the emission parameters.
    ///
    pub fn full_update(tol: f64, max_iter: usize) -> TrainParams {
        TrainParams {
            update_mu: true,
            update_sigma: true,
            ..TrainParams::new(tol, max_iter)
        }
    }
    pub fn verbose(mut self) -> TrainParams {
        self.verbose = true;
        self
    }
    pub fn sequential(mut self) -> TrainParams {
        self.parallel = false;
        self
    }
}

impl Default for TrainParams {
    fn default() -> Self {
        TrainParams {
            tol: 1e-4,
            max_iter: 100,
            verbose: false,
            update_mu: false,
            update_sigma: false,
            rate_floor: RATE_FLOOR,
            min_sd: MIN_SD,
            eigen_mode: EigenMode::default(),
            fallback_to_augmented: false,
            parallel: true,
        }
    }
}

impl std::fmt::Display for TrainParams {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "tol:{}", self.tol)?;
        writeln!(f, "max_iter:{}", self.max_iter)?;
        writeln!(f, "update_mu:{}", self.update_mu)?;
        writeln!(f, "update_sigma:{}", self.update_sigma)?;
        writeln!(f, "rate_floor:{}", self.rate_floor)?;
        writeln!(f, "min_sd:{}", self.min_sd)?;
        writeln!(f, "eigen_mode:{:?}", self.eigen_mode)?;
        writeln!(f, "fallback_to_augmented:{}", self.fallback_to_augmented)?;
        write!(f, "parallel:{}", self.parallel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_params_constructors() {
        let p = TrainParams::default();
        assert_eq!(p.tol, 1e-4);
        assert_eq!(p.max_iter, 100);
        assert!(!p.update_mu && !p.update_sigma);
        let p = TrainParams::full_update(1e-6, 10).sequential();
        assert!(p.update_mu && p.update_sigma && !p.parallel);
        assert_eq!(p.max_iter, 10);
        let json = serde_json::to_string(&p).unwrap();
        let q: TrainParams = serde_json::from_str(&json).unwrap();
        assert_eq!(p, q);
        println!("{}", q);
    }
}
