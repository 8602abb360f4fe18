//!
//! Expectation-Maximization training of a CT-HMM
//!
//! * `params`: `TrainParams`
//! * `learner`: `Learner` (E-step, M-step, training loop) and `LearnerBuilder`
//! * `fit`: `Fit`, the record of a training run
//!
pub mod fit;
pub mod learner;
pub mod params;

pub use fit::{EmState, Fit};
pub use learner::{Learner, LearnerBuilder, LearnerConfig};
pub use params::TrainParams;
