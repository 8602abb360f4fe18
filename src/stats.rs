//!
//! Expected sufficient statistics of the latent chain
//!
//! For a step `t_i -> t_{i+1}` with gap `t`, kernel `P = exp(Q t)` and pairwise
//! belief `zeta`, with `F = zeta / P`:
//!
//! ```text
//! TauI[i]  += sum_{k,l} F[k,l] int_0^t P_ki(s) P_il(t-s) ds          (sojourn time)
//! Nij[i,j] += Q[i,j] sum_{k,l} F[k,l] int_0^t P_ki(s) P_jl(t-s) ds   (transitions)
//! ```
//!
//! The end-state integrals are computed either from the eigendecomposition
//! of Q (`eigen`) or from the exponential of a block matrix
//! (`augmented`). Both implement `StatsEstimator`.
//!
pub mod augmented;
pub mod eigen;

pub use augmented::augmented_kernels;
pub use eigen::{eigen_kernels, EigenOnDemand};

use crate::error::{CtHmmError, Result};
use crate::hmm::Posterior;
use crate::model::{EmissionStats, KernelCache, ModelState, StateSpace};
use crate::sequence::Sequence;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// relative size of negative roundoff in TauI/Nij that is clamped to zero
pub const NEGATIVE_TOL: f64 = 1e-8;

///
/// Algorithm of the end-state integrals
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatsMethod {
    /// eigendecomposition of Q and divided differences
    Eigen,
    /// block-matrix exponential; no eigendecomposition
    AugmentedExpm,
}

impl FromStr for StatsMethod {
    type Err = CtHmmError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "eigen" => Ok(StatsMethod::Eigen),
            "expm" | "augmented" | "augmented-exponential" | "augmented_exponential" => {
                Ok(StatsMethod::AugmentedExpm)
            }
            _ => Err(CtHmmError::UnknownMethod(s.to_string())),
        }
    }
}

impl std::fmt::Display for StatsMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StatsMethod::Eigen => write!(f, "eigen"),
            StatsMethod::AugmentedExpm => write!(f, "augmented-exponential"),
        }
    }
}

///
/// Execution mode of the eigen method
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EigenMode {
    /// contract through `U`, `V` and `Psi` at every step
    OnDemand,
    /// build the end-state matrices once per distinct gap
    Precomputed,
}

impl Default for EigenMode {
    fn default() -> Self {
        EigenMode::Precomputed
    }
}

///
/// Accumulates the sojourn time and transition count contribution of a
/// single step.
///
pub trait StatsEstimator: Sync {
    ///
    /// Add the contribution of a step whose gap is the entry `gap` of the
    /// gap set, with `ratio = zeta / P`.
    ///
    fn accumulate(&self, gap: usize, ratio: &Array2<f64>, tau: &mut Array1<f64>, n: &mut Array2<f64>);
}

///
/// End-state matrices of every distinct gap.
///
/// ```text
/// tau[g][i][k,l]       = int_0^t P_ki(s) P_il(t-s) ds
/// trans[g][(i,j)][k,l] = Q[i,j] int_0^t P_ki(s) P_jl(t-s) ds   (allowed (i,j) only)
/// ```
///
#[derive(Debug, Clone)]
pub struct EndStateKernels {
    tau: Vec<Vec<Array2<f64>>>,
    trans: Vec<Vec<((usize, usize), Array2<f64>)>>,
}

impl EndStateKernels {
    pub(crate) fn from_parts(
        tau: Vec<Vec<Array2<f64>>>,
        trans: Vec<Vec<((usize, usize), Array2<f64>)>>,
    ) -> EndStateKernels {
        EndStateKernels { tau, trans }
    }
    /// number of gap entries
    pub fn len(&self) -> usize {
        self.tau.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tau.is_empty()
    }
    ///
    /// sojourn end-state matrix of state `i` for gap entry `gap`
    ///
    pub fn tau(&self, gap: usize, i: usize) -> &Array2<f64> {
        &self.tau[gap][i]
    }
}

impl StatsEstimator for EndStateKernels {
    fn accumulate(&self, gap: usize, ratio: &Array2<f64>, tau: &mut Array1<f64>, n: &mut Array2<f64>) {
        for (i, s) in self.tau[gap].iter().enumerate() {
            tau[i] += (ratio * s).sum();
        }
        for ((i, j), t) in self.trans[gap].iter() {
            n[[*i, *j]] += (ratio * t).sum();
        }
    }
}

///
/// Expected statistics of a set of sequences.
///
/// Statistics of disjoint sets of sequences are combined with `+`.
///
#[derive(Debug, Clone, PartialEq)]
pub struct SufficientStats {
    /// expected sojourn time in each state
    pub tau: Array1<f64>,
    /// expected number of `i -> j` transitions
    pub n: Array2<f64>,
    /// sum of posterior occupancies at the first observation
    pub pi0_num: Array1<f64>,
    /// number of first observations
    pub pi0_den: f64,
    pub emission: EmissionStats,
    pub log_likelihood: f64,
    pub n_sequences: usize,
    /// sum of observed time spans
    pub total_time: f64,
}

impl SufficientStats {
    pub fn zero(space: &StateSpace) -> SufficientStats {
        let n = space.n_states();
        SufficientStats {
            tau: Array1::zeros(n),
            n: Array2::zeros((n, n)),
            pi0_num: Array1::zeros(n),
            pi0_den: 0.0,
            emission: EmissionStats::zero(space),
            log_likelihood: 0.0,
            n_sequences: 0,
            total_time: 0.0,
        }
    }
    ///
    /// E-step of a single sequence
    ///
    pub fn from_sequence(
        model: &ModelState,
        kernels: &KernelCache,
        estimator: &dyn StatsEstimator,
        sequence: &Sequence,
        gap_index: &[usize],
    ) -> Result<SufficientStats> {
        let post = Posterior::new(model, kernels, sequence, gap_index)?;
        let space = model.space();
        let mut stats = SufficientStats::zero(space);

        let gamma = post.gammas();
        stats.pi0_num.assign(&gamma.row(0));
        stats.pi0_den = 1.0;
        for (i, g) in gamma.rows().into_iter().enumerate() {
            stats
                .emission
                .add_observation(space, g, sequence.value(i));
        }

        for (i, &gap) in gap_index.iter().enumerate() {
            let pw = post.pairwise(kernels, i)?;
            estimator.accumulate(gap, pw.ratio(), &mut stats.tau, &mut stats.n);
        }

        stats.total_time = sequence.duration();
        stats.log_likelihood = post.log_likelihood();
        stats.n_sequences = 1;
        stats.clamp_roundoff()?;
        stats.check_finite()?;
        Ok(stats)
    }
    ///
    /// Clamp tiny negative roundoff of TauI and Nij to zero.
    ///
    fn clamp_roundoff(&mut self) -> Result<()> {
        let tol = NEGATIVE_TOL * (1.0 + self.total_time);
        let n = self.tau.len();
        for i in 0..n {
            if self.tau[i] < -tol {
                return Err(CtHmmError::NumericalInstability(format!(
                    "negative expected sojourn time TauI[{}]={}",
                    i, self.tau[i]
                )));
            }
            self.tau[i] = self.tau[i].max(0.0);
            for j in 0..n {
                if self.n[[i, j]] < -tol {
                    return Err(CtHmmError::NumericalInstability(format!(
                        "negative expected transition count Nij[{},{}]={}",
                        i, j, self.n[[i, j]]
                    )));
                }
                self.n[[i, j]] = self.n[[i, j]].max(0.0);
            }
        }
        Ok(())
    }
    fn check_finite(&self) -> Result<()> {
        let finite = self.tau.iter().all(|x| x.is_finite())
            && self.n.iter().all(|x| x.is_finite())
            && self.pi0_num.iter().all(|x| x.is_finite())
            && self.emission.is_finite()
            && self.log_likelihood.is_finite();
        if finite {
            Ok(())
        } else {
            Err(CtHmmError::NumericalInstability(
                "non-finite sufficient statistics".to_string(),
            ))
        }
    }
}

impl<'a> std::ops::AddAssign<&'a SufficientStats> for SufficientStats {
    fn add_assign(&mut self, other: &'a SufficientStats) {
        self.tau += &other.tau;
        self.n += &other.n;
        self.pi0_num += &other.pi0_num;
        self.pi0_den += other.pi0_den;
        self.emission += &other.emission;
        self.log_likelihood += other.log_likelihood;
        self.n_sequences += other.n_sequences;
        self.total_time += other.total_time;
    }
}

impl std::ops::Add for SufficientStats {
    type Output = SufficientStats;
    fn add(mut self, other: SufficientStats) -> SufficientStats {
        self += &other;
        self
    }
}

//
// tests
//
