//!
//! EM learner of a CT-HMM
//!
//! One iteration:
//!
//! 1. build the kernel cache `exp(Q gap)` of every distinct gap, and the
//!    statistics estimator (eigendecomposition or augmented exponentials)
//! 2. E-step: forward-backward and expected statistics of every sequence,
//!    summed in sequence order
//! 3. M-step: a new `ModelState` from the summed statistics
//!
//! The learner replaces its model only when the whole iteration succeeded.
//!
use super::fit::{EmState, Fit};
use super::params::TrainParams;
use crate::error::{CtHmmError, Result};
use crate::hmm::{forward, predict, Posterior, Prediction};
use crate::linalg::EigenDecomposition;
use crate::model::{EmissionTable, KernelCache, ModelState, ObservationModel, RateMatrix, Topology};
use crate::sequence::{GapSet, Sequence, GAP_REL_TOL};
use crate::stats::{
    augmented_kernels, eigen_kernels, EigenMode, EigenOnDemand, StatsEstimator, StatsMethod,
    SufficientStats,
};
use log::{debug, info, warn};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

///
/// Structural choices fixed at construction
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerConfig {
    pub method: StatsMethod,
    pub topology: Topology,
    /// floor the estimated rates at `TrainParams::rate_floor`
    pub bound: bool,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        LearnerConfig {
            method: StatsMethod::Eigen,
            topology: Topology::FullyConnected,
            bound: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Learner {
    config: LearnerConfig,
    model: ModelState,
    sequences: Vec<Sequence>,
    gaps: GapSet,
    /// `gap_index[s][i]` is the gap entry of step `i` of sequence `s`
    gap_index: Vec<Vec<usize>>,
    state: EmState,
}

impl Learner {
    pub fn new(config: LearnerConfig, model: ModelState, sequences: Vec<Sequence>) -> Result<Learner> {
        if sequences.is_empty() {
            return Err(CtHmmError::InvalidSequence(
                "at least one sequence is required".to_string(),
            ));
        }
        for s in sequences.iter() {
            s.validate()?;
            if s.n_markers() != model.emission.n_markers() {
                return Err(CtHmmError::DimensionMismatch {
                    what: "sequence markers",
                    expected: model.emission.n_markers(),
                    actual: s.n_markers(),
                });
            }
        }
        let (gaps, gap_index) = GapSet::from_sequences(&sequences, GAP_REL_TOL);
        debug!(
            "learner: {} states, {} sequences, {} distinct gaps, method={} topology={}",
            model.n_states(),
            sequences.len(),
            gaps.len(),
            config.method,
            config.topology
        );
        Ok(Learner {
            config,
            model,
            sequences,
            gaps,
            gap_index,
            state: EmState::Init,
        })
    }
    pub fn model(&self) -> &ModelState {
        &self.model
    }
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }
    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }
    fn sequence_at(&self, index: usize) -> Result<(&Sequence, &[usize])> {
        match (self.sequences.get(index), self.gap_index.get(index)) {
            (Some(s), Some(g)) => Ok((s, g)),
            _ => Err(CtHmmError::InvalidSequence(format!(
                "sequence index {} out of range ({} sequences)",
                index,
                self.sequences.len()
            ))),
        }
    }
    pub fn gaps(&self) -> &GapSet {
        &self.gaps
    }
    pub fn state(&self) -> EmState {
        self.state
    }
    fn set_state(&mut self, state: EmState) {
        debug!("em state {:?} -> {:?}", self.state, state);
        self.state = state;
    }
    ///
    /// Statistics estimator of `model` for this iteration.
    ///
    fn estimator(&self, model: &ModelState, params: &TrainParams) -> Result<Box<dyn StatsEstimator>> {
        if self.config.method == StatsMethod::AugmentedExpm {
            return Ok(Box::new(augmented_kernels(&model.rate, &self.gaps)?));
        }
        let eigen = EigenDecomposition::new(model.q()).and_then(|ed| {
            let estimator: Box<dyn StatsEstimator> = match params.eigen_mode {
                EigenMode::OnDemand => Box::new(EigenOnDemand::new(&ed, &model.rate, &self.gaps)?),
                EigenMode::Precomputed => Box::new(eigen_kernels(&ed, &model.rate, &self.gaps)?),
            };
            Ok(estimator)
        });
        let estimator: Box<dyn StatsEstimator> = match eigen {
            Ok(estimator) => estimator,
            Err(CtHmmError::SingularMatrix(msg)) if params.fallback_to_augmented => {
                warn!("eigen method unusable ({}); using augmented exponentials", msg);
                Box::new(augmented_kernels(&model.rate, &self.gaps)?)
            }
            Err(e) => return Err(e),
        };
        Ok(estimator)
    }
    ///
    /// Expected sufficient statistics of all sequences under `model`.
    ///
    pub fn e_step(&self, model: &ModelState, params: &TrainParams) -> Result<SufficientStats> {
        let kernels = KernelCache::build(model.q(), &self.gaps)?;
        let estimator = self.estimator(model, params)?;
        let estimator: &dyn StatsEstimator = estimator.as_ref();
        let per_sequence: Vec<SufficientStats> = if params.parallel {
            self.sequences
                .par_iter()
                .zip(self.gap_index.par_iter())
                .map(|(s, idx)| SufficientStats::from_sequence(model, &kernels, estimator, s, idx))
                .collect::<Result<Vec<_>>>()?
        } else {
            self.sequences
                .iter()
                .zip(self.gap_index.iter())
                .map(|(s, idx)| SufficientStats::from_sequence(model, &kernels, estimator, s, idx))
                .collect::<Result<Vec<_>>>()?
        };
        // summed in sequence order, so the result does not depend on scheduling
        Ok(per_sequence
            .into_iter()
            .fold(SufficientStats::zero(model.space()), |acc, s| acc + s))
    }
    ///
    /// New model maximizing the expected complete-data log-likelihood.
    ///
    /// ```text
    /// Q[i,j] = Nij[i,j] / TauI[i]     (allowed (i,j))
    /// Q[i,i] = -sum_j Q[i,j]
    /// pi0    = sum_s gamma_s,0 / #sequences
    /// ```
    ///
    pub fn m_step(
        &self,
        model: &ModelState,
        stats: &SufficientStats,
        params: &TrainParams,
    ) -> Result<ModelState> {
        let n = model.n_states();
        let mut rates = Array2::zeros((n, n));
        for (i, j) in model.rate.allowed() {
            let tau = stats.tau[i];
            if tau.is_nan() {
                return Err(CtHmmError::NumericalInstability(format!(
                    "TauI[{}] is NaN",
                    i
                )));
            }
            if tau <= 0.0 {
                return Err(CtHmmError::DegenerateState { state: i });
            }
            let r = stats.n[[i, j]] / tau;
            if !r.is_finite() {
                return Err(CtHmmError::NumericalInstability(format!(
                    "estimated rate Q[{},{}]={} (Nij={} TauI={})",
                    i,
                    j,
                    r,
                    stats.n[[i, j]],
                    tau
                )));
            }
            rates[[i, j]] = if self.config.bound {
                r.max(params.rate_floor)
            } else {
                r
            };
        }
        let rate = RateMatrix::from_rates(rates, model.rate.mask().clone());

        if !(stats.pi0_den > 0.0) {
            return Err(CtHmmError::NumericalInstability(
                "no sequence contributed to the initial distribution".to_string(),
            ));
        }
        let pi0: Array1<f64> = &stats.pi0_num / stats.pi0_den;

        let emission: ObservationModel = if params.update_mu || params.update_sigma {
            model.emission.updated(
                &stats.emission,
                params.update_mu,
                params.update_sigma,
                params.min_sd,
            )
        } else {
            model.emission.clone()
        };
        ModelState::new(rate, pi0, emission)
    }
    ///
    /// One E-step and M-step. Returns the log-likelihood of the model that
    /// entered the E-step. On error the model is unchanged.
    ///
    pub fn step(&mut self, params: &TrainParams) -> Result<f64> {
        self.set_state(EmState::EStep);
        let stats = self.e_step(&self.model, params)?;
        self.set_state(EmState::MStep);
        let next = self.m_step(&self.model, &stats, params)?;
        self.model = next;
        Ok(stats.log_likelihood)
    }
    ///
    /// Iterate until the log-likelihood changes by at most `params.tol`.
    ///
    /// Returns `ConvergenceNotReached` (with the latest fit) when
    /// `params.max_iter` iterations were not enough.
    ///
    pub fn train(&mut self, params: &TrainParams) -> Result<Fit> {
        self.set_state(EmState::Init);
        let mut trace: Vec<f64> = Vec::new();
        for iteration in 0..params.max_iter {
            let ll = self.step(params)?;
            if params.verbose {
                info!("iteration {} loglik={}", iteration, ll);
            } else {
                debug!("iteration {} loglik={}", iteration, ll);
            }
            trace.push(ll);
            if let [.., prev, last] = trace.as_slice() {
                if (last - prev).abs() <= params.tol {
                    self.set_state(EmState::Converged);
                    info!("converged after {} iterations (loglik={})", trace.len(), ll);
                    return Ok(Fit {
                        model: self.model.clone(),
                        iterations: trace.len(),
                        trace,
                        converged: true,
                    });
                }
            }
        }
        self.set_state(EmState::MaxIterReached);
        let fit = Fit {
            model: self.model.clone(),
            iterations: trace.len(),
            trace,
            converged: false,
        };
        warn!(
            "EM stopped after {} iterations without convergence",
            fit.iterations
        );
        Err(CtHmmError::ConvergenceNotReached {
            iterations: fit.iterations,
            delta: fit.last_delta(),
            fit: Box::new(fit),
        })
    }
    ///
    /// Log-likelihood of all sequences under the current model.
    ///
    pub fn log_likelihood(&self) -> Result<f64> {
        let kernels = KernelCache::build(self.model.q(), &self.gaps)?;
        let mut total = 0.0;
        for (s, idx) in self.sequences.iter().zip(self.gap_index.iter()) {
            let table = EmissionTable::new(&self.model.emission, s)?;
            total += forward(&self.model.pi0, &kernels, idx, &table)?.log_likelihood();
        }
        Ok(total)
    }
    ///
    /// Forward-backward result of sequence `index` under the current model.
    ///
    pub fn posterior(&self, index: usize) -> Result<Posterior> {
        let (sequence, gap_index) = self.sequence_at(index)?;
        let kernels = KernelCache::build(self.model.q(), &self.gaps)?;
        Posterior::new(&self.model, &kernels, sequence, gap_index)
    }
    ///
    /// Predict the state and the observation of sequence `index` at `time`
    /// (not before its last observation).
    ///
    pub fn predict(&self, index: usize, time: f64) -> Result<Prediction> {
        let (s, _) = self.sequence_at(index)?;
        let post = self.posterior(index)?;
        predict(&self.model, post.forward(), s.time(s.len() - 1), time)
    }
}

///
/// Assembles a `Learner` from user-level parameters
///
/// ```ignore
/// let mut learner = LearnerBuilder::new(vec![vec![0.0, 1.0]], vec![vec![0.5, 0.5]])
///     .topology("forward stepwise")
///     .method("eigen")
///     .sequences(sequences)
///     .build()?;
/// ```
///
#[derive(Debug, Clone)]
pub struct LearnerBuilder {
    means: Vec<Vec<f64>>,
    sds: Vec<Vec<f64>>,
    q: Option<Array2<f64>>,
    seed: u64,
    pi0: Option<Array1<f64>>,
    topology: String,
    method: String,
    bound: bool,
    sequences: Vec<Sequence>,
}

impl LearnerBuilder {
    ///
    /// Per-marker per-level emission means and standard deviations.
    ///
    pub fn new(means: Vec<Vec<f64>>, sds: Vec<Vec<f64>>) -> LearnerBuilder {
        LearnerBuilder {
            means,
            sds,
            q: None,
            seed: crate::model::rate::DEFAULT_SEED,
            pi0: None,
            topology: Topology::FullyConnected.to_string(),
            method: StatsMethod::Eigen.to_string(),
            bound: true,
            sequences: Vec::new(),
        }
    }
    ///
    /// Initial generator. A seeded random one is used when not given.
    ///
    pub fn rate_matrix(mut self, q: Array2<f64>) -> Self {
        self.q = Some(q);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
    ///
    /// Initial distribution. Uniform when not given.
    ///
    pub fn initial(mut self, pi0: Array1<f64>) -> Self {
        self.pi0 = Some(pi0);
        self
    }
    pub fn topology(mut self, name: &str) -> Self {
        self.topology = name.to_string();
        self
    }
    pub fn method(mut self, name: &str) -> Self {
        self.method = name.to_string();
        self
    }
    pub fn bound(mut self, bound: bool) -> Self {
        self.bound = bound;
        self
    }
    pub fn sequences(mut self, sequences: Vec<Sequence>) -> Self {
        self.sequences = sequences;
        self
    }
    pub fn build(self) -> Result<Learner> {
        let topology: Topology = self.topology.parse()?;
        let method: StatsMethod = self.method.parse()?;
        let emission = ObservationModel::new(self.means, self.sds)?;
        let n = emission.n_states();
        let mask = emission.space().mask(topology);
        let rate = match self.q {
            Some(q) => RateMatrix::new(q, mask)?,
            None => RateMatrix::random(mask, self.seed),
        };
        let pi0 = self
            .pi0
            .unwrap_or_else(|| Array1::from_elem(n, 1.0 / n as f64));
        let model = ModelState::new(rate, pi0, emission)?;
        let config = LearnerConfig {
            method,
            topology,
            bound: self.bound,
        };
        Learner::new(config, model, self.sequences)
    }
}

//
// tests
//
