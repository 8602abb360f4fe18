//!
//! cthmm: continuous-time hidden Markov models trained by EM
//!
//! Parameters are estimated from irregularly sampled observation sequences.
//! The expected sojourn times and transition counts of the E-step come from
//! either the eigendecomposition of the generator or block-matrix
//! exponentials.
//!
pub mod em;
pub mod error;
pub mod hmm;
pub mod linalg;
#[cfg(test)]
pub mod mocks;
pub mod model;
pub mod prelude;
pub mod prob;
pub mod sample;
pub mod sequence;
pub mod stats;
