//!
//! Sampling observation sequences from a CT-HMM
//!
//! The latent chain is simulated exactly (Gillespie): the holding time in
//! state `s` is exponential with rate `-Q[s,s]` and the next state is picked
//! with probability proportional to `Q[s,j]`. Observations are taken at
//! irregular times whose gaps are drawn from a small set of visit intervals.
//!
use crate::error::{CtHmmError, Result};
use crate::model::ModelState;
use crate::sequence::Sequence;
use rand::prelude::*;
use rand_distr::{Exp, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleParams {
    /// number of sequences
    pub n_sequences: usize,
    /// number of observations of each sequence
    pub n_observations: usize,
    /// candidate intervals between consecutive observations
    pub gaps: Vec<f64>,
    pub seed: u64,
}

impl Default for SampleParams {
    fn default() -> Self {
        SampleParams {
            n_sequences: 100,
            n_observations: 10,
            gaps: vec![0.5, 1.0, 2.0],
            seed: 0,
        }
    }
}

///
/// A sampled sequence with the hidden state at each observation
///
#[derive(Debug, Clone)]
pub struct Sampled {
    pub sequence: Sequence,
    pub states: Vec<usize>,
}

fn pick<R: Rng>(rng: &mut R, weights: &[f64]) -> Result<usize> {
    let indices: Vec<usize> = (0..weights.len()).collect();
    indices
        .choose_weighted(rng, |&i| weights[i])
        .copied()
        .map_err(|e| CtHmmError::InvalidGenerator(format!("cannot sample a state: {}", e)))
}

///
/// Time until the next jump from state `s`. Infinite for absorbing states.
///
fn holding_time<R: Rng>(rng: &mut R, model: &ModelState, s: usize) -> Result<f64> {
    let exit = model.rate.exit_rate(s);
    if exit <= 0.0 {
        return Ok(f64::INFINITY);
    }
    let exp = Exp::new(exit)
        .map_err(|e| CtHmmError::InvalidGenerator(format!("exit rate {}: {}", exit, e)))?;
    Ok(exp.sample(rng))
}

fn next_state<R: Rng>(rng: &mut R, model: &ModelState, s: usize) -> Result<usize> {
    let weights: Vec<f64> = (0..model.n_states())
        .map(|j| if j == s { 0.0 } else { model.rate.rate(s, j) })
        .collect();
    pick(rng, &weights)
}

fn emit<R: Rng>(rng: &mut R, model: &ModelState, s: usize) -> Result<Vec<f64>> {
    model
        .space()
        .levels(s)
        .iter()
        .enumerate()
        .map(|(m, &l)| {
            let g = model.emission.gaussian(m, l);
            let normal = Normal::new(g.mean, g.sd).map_err(|e| {
                CtHmmError::StructuralConfig(format!("marker {} level {}: {}", m, l, e))
            })?;
            Ok(normal.sample(rng))
        })
        .collect()
}

///
/// Sample one sequence of `n_observations` observations starting at time 0.
///
pub fn sample_sequence<R: Rng>(
    rng: &mut R,
    model: &ModelState,
    n_observations: usize,
    gaps: &[f64],
) -> Result<Sampled> {
    if n_observations == 0 || gaps.iter().any(|&g| !(g > 0.0)) || gaps.is_empty() {
        return Err(CtHmmError::InvalidSequence(
            "sampling needs at least one observation and positive gaps".to_string(),
        ));
    }
    let pi0 = model.pi0.to_vec();
    let mut state = pick(rng, &pi0)?;
    let mut t = 0.0;
    let mut next_jump = holding_time(rng, model, state)?;
    let mut times = Vec::with_capacity(n_observations);
    let mut values = Vec::with_capacity(n_observations);
    let mut states = Vec::with_capacity(n_observations);
    for k in 0..n_observations {
        if k > 0 {
            t += gaps[rng.gen_range(0..gaps.len())];
        }
        while next_jump <= t {
            state = next_state(rng, model, state)?;
            next_jump += holding_time(rng, model, state)?;
        }
        times.push(t);
        values.push(emit(rng, model, state)?);
        states.push(state);
    }
    Ok(Sampled {
        sequence: Sequence::new(times, values)?,
        states,
    })
}

///
/// Sample a dataset with a seeded RNG.
///
pub fn sample_dataset(model: &ModelState, params: &SampleParams) -> Result<Vec<Sequence>> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
    (0..params.n_sequences)
        .map(|_| {
            sample_sequence(&mut rng, model, params.n_observations, &params.gaps)
                .map(|sampled| sampled.sequence)
        })
        .collect()
}

//
// tests
//
