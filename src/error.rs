//!
//! Error taxonomy of the CT-HMM learner
//!
//! Recoverable numerical corner cases (tied eigenvalues, negative roundoff
//! in kernels, rates under the floor) never reach this type; they are handled
//! where they occur.
//!
use crate::em::Fit;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CtHmmError {
    /// unknown topology name or inconsistent structural parameters
    #[error("structural configuration error: {0}")]
    StructuralConfig(String),

    #[error("unknown sufficient statistics method: {0} (expected `eigen` or `augmented-exponential`)")]
    UnknownMethod(String),

    #[error("invalid generator matrix: {0}")]
    InvalidGenerator(String),

    #[error("invalid observation sequence: {0}")]
    InvalidSequence(String),

    #[error("dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// eigendecomposition (or a matrix inversion) of the current Q is unusable
    #[error("singular or ill-conditioned matrix: {0}")]
    SingularMatrix(String),

    /// expected sojourn time of a state with allowed exits is zero
    #[error("degenerate state {state}: expected sojourn time is zero")]
    DegenerateState { state: usize },

    /// NaN or Inf detected in forward/backward/statistics/M-step
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    /// iteration cap hit before the tolerance was met. `fit` holds the model after the last M-step
    /// and the full trace.
    #[error("EM did not converge in {iterations} iterations (last |delta loglik|={delta})")]
    ConvergenceNotReached {
        iterations: usize,
        delta: f64,
        fit: Box<Fit>,
    },
}

pub type Result<T> = std::result::Result<T, CtHmmError>;
