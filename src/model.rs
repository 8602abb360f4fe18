//!
//! Parameters of a CT-HMM
//!
//! * `structure`: composite states and topology masks
//! * `rate`: generator matrix Q
//! * `kernel`: transition kernels `exp(Q gap)` of the distinct gaps
//! * `emission`: Gaussian observation model
//!
//! `ModelState` bundles `(Q, pi0, emission)`. It is an immutable value: the
//! M-step returns a new one instead of modifying the current one.
//!
pub mod emission;
pub mod kernel;
pub mod rate;
pub mod structure;

pub use emission::{EmissionStats, EmissionTable, Gaussian, ObservationModel};
pub use kernel::{transition_kernel, KernelCache};
pub use rate::RateMatrix;
pub use structure::{StateSpace, Topology};

use crate::error::{CtHmmError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// tolerance of `|sum pi0 - 1|`
const PI0_SUM_TOL: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub rate: RateMatrix,
    pub pi0: Array1<f64>,
    pub emission: ObservationModel,
}

impl ModelState {
    pub fn new(rate: RateMatrix, pi0: Array1<f64>, emission: ObservationModel) -> Result<ModelState> {
        let n = emission.n_states();
        if rate.n() != n {
            return Err(CtHmmError::DimensionMismatch {
                what: "rate matrix states",
                expected: n,
                actual: rate.n(),
            });
        }
        if pi0.len() != n {
            return Err(CtHmmError::DimensionMismatch {
                what: "initial distribution states",
                expected: n,
                actual: pi0.len(),
            });
        }
        if pi0.iter().any(|&p| !(p.is_finite() && p >= 0.0)) || (pi0.sum() - 1.0).abs() > PI0_SUM_TOL
        {
            return Err(CtHmmError::StructuralConfig(format!(
                "initial distribution {} is not a probability vector",
                pi0
            )));
        }
        Ok(ModelState {
            rate,
            pi0,
            emission,
        })
    }
    /// number of composite states
    pub fn n_states(&self) -> usize {
        self.emission.n_states()
    }
    pub fn q(&self) -> &Array2<f64> {
        self.rate.q()
    }
    pub fn space(&self) -> &StateSpace {
        self.emission.space()
    }
    ///
    /// Serialize into a JSON string
    ///
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| CtHmmError::StructuralConfig(format!("serialization failed: {}", e)))
    }
    ///
    /// Deserialize from a JSON string, re-validating the generator.
    ///
    pub fn from_json(json: &str) -> Result<ModelState> {
        let m: ModelState = serde_json::from_str(json)
            .map_err(|e| CtHmmError::StructuralConfig(format!("deserialization failed: {}", e)))?;
        let rate = RateMatrix::new(m.rate.q().clone(), m.rate.mask().clone())?;
        ModelState::new(rate, m.pi0, m.emission)
    }
}

impl std::fmt::Display for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "Q=\n{:.4}", self.q())?;
        writeln!(f, "pi0={:.4}", self.pi0)?;
        write!(
            f,
            "means={:?} sds={:?}",
            self.emission.means(),
            self.emission.sds()
        )
    }
}

//
// tests
//
