//!
//! Forward-backward inference of a single sequence under a CT-HMM
//!
//! ```text
//! alpha_i[k] = P(state k at t_i | x_0..x_i)                  (scaled forward)
//! beta_i[k]  = P(x_{i+1}.. | state k at t_i) / prod_{j>i} c_j  (scaled backward)
//! gamma_i    = alpha_i * beta_i                              (sums to 1)
//! zeta_i     = P(state k at t_i, state l at t_{i+1} | x)
//! ```
//!
//! The transition between observations `i` and `i+1` uses the kernel of the
//! gap `t_{i+1} - t_i` from a `KernelCache`.
//!
pub mod backward;
pub mod forward;
pub mod pairwise;
pub mod predict;

pub use backward::{backward, Backward};
pub use forward::{forward, Forward};
pub use pairwise::Pairwise;
pub use predict::{predict, Prediction};

use crate::error::Result;
use crate::model::{EmissionTable, KernelCache, ModelState};
use crate::sequence::Sequence;
use ndarray::{Array1, Array2};

///
/// Forward and backward tables of one sequence.
///
#[derive(Debug, Clone)]
pub struct Posterior {
    table: EmissionTable,
    forward: Forward,
    backward: Backward,
    gap_index: Vec<usize>,
}

impl Posterior {
    ///
    /// Run forward and backward on `sequence`. `gap_index[i]` is the kernel
    /// entry of `t_{i+1} - t_i`.
    ///
    pub fn new(
        model: &ModelState,
        kernels: &KernelCache,
        sequence: &Sequence,
        gap_index: &[usize],
    ) -> Result<Posterior> {
        let table = EmissionTable::new(&model.emission, sequence)?;
        let forward = forward(&model.pi0, kernels, gap_index, &table)?;
        let backward = backward(kernels, gap_index, &table, &forward)?;
        Ok(Posterior {
            table,
            forward,
            backward,
            gap_index: gap_index.to_vec(),
        })
    }
    /// number of observations
    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
    pub fn forward(&self) -> &Forward {
        &self.forward
    }
    pub fn backward(&self) -> &Backward {
        &self.backward
    }
    pub fn table(&self) -> &EmissionTable {
        &self.table
    }
    ///
    /// `log P(x)`
    ///
    pub fn log_likelihood(&self) -> f64 {
        self.forward.log_likelihood()
    }
    ///
    /// state occupancy at observation `i`
    ///
    pub fn gamma(&self, i: usize) -> Array1<f64> {
        &self.forward.alpha(i) * &self.backward.beta(i)
    }
    ///
    /// occupancy of every observation (`len x n`)
    ///
    pub fn gammas(&self) -> Array2<f64> {
        self.forward.alphas() * &self.backward.betas()
    }
    ///
    /// pairwise belief of the step `i -> i+1`
    ///
    pub fn pairwise(&self, kernels: &KernelCache, i: usize) -> Result<Pairwise> {
        Pairwise::new(
            kernels.get(self.gap_index[i]),
            self.forward.alpha(i),
            &(self.backward.beta(i + 1) * self.table.get(i + 1)),
        )
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{mock_two_state, mock_two_state_sequence};
    use crate::model::transition_kernel;
    use crate::sequence::{GapSet, GAP_REL_TOL};
    use approx::assert_abs_diff_eq;
    use itertools::Itertools;

    fn posterior_of(model: &ModelState, seq: &Sequence) -> (Posterior, KernelCache) {
        let (gaps, indices) = GapSet::from_sequences(std::slice::from_ref(seq), GAP_REL_TOL);
        let kernels = KernelCache::build(model.q(), &gaps).unwrap();
        let post = Posterior::new(model, &kernels, seq, &indices[0]).unwrap();
        (post, kernels)
    }

    ///
    /// `P(x)` summed over every hidden path, without scaling
    ///
    fn brute_force_likelihood(model: &ModelState, seq: &Sequence) -> f64 {
        let n = model.n_states();
        let m = seq.len();
        let kernels: Vec<_> = seq
            .gaps()
            .map(|g| transition_kernel(model.q(), g).unwrap())
            .collect();
        let b: Vec<_> = (0..m)
            .map(|i| model.emission.likelihoods(seq.value(i)).unwrap())
            .collect();
        (0..m)
            .map(|_| 0..n)
            .multi_cartesian_product()
            .map(|path| {
                let mut w = model.pi0[path[0]] * b[0][path[0]];
                for i in 1..m {
                    w *= kernels[i - 1][[path[i - 1], path[i]]] * b[i][path[i]];
                }
                w
            })
            .sum()
    }

    #[test]
    fn forward_matches_brute_force() {
        let model = mock_two_state();
        let seq = mock_two_state_sequence();
        let (post, _) = posterior_of(&model, &seq);
        let expected = brute_force_likelihood(&model, &seq).ln();
        assert_abs_diff_eq!(post.log_likelihood(), expected, epsilon = 1e-10);
    }
    #[test]
    fn gamma_sums_to_one() {
        let model = mock_two_state();
        let seq = Sequence::univariate(
            vec![0.0, 0.3, 1.0, 2.5, 2.6, 7.0],
            vec![0.1, 0.9, 0.2, 1.1, -0.3, 0.6],
        )
        .unwrap();
        let (post, kernels) = posterior_of(&model, &seq);
        for i in 0..post.len() {
            assert_abs_diff_eq!(post.gamma(i).sum(), 1.0, epsilon = 1e-10);
        }
        let g = post.gammas();
        for i in 0..post.len() - 1 {
            let pw = post.pairwise(&kernels, i).unwrap();
            assert_abs_diff_eq!(pw.zeta().sum(), 1.0, epsilon = 1e-10);
            // marginals of zeta are gamma_i and gamma_{i+1}
            for k in 0..2 {
                assert_abs_diff_eq!(pw.zeta().row(k).sum(), g[[i, k]], epsilon = 1e-10);
                assert_abs_diff_eq!(pw.zeta().column(k).sum(), g[[i + 1, k]], epsilon = 1e-10);
            }
        }
    }
    #[test]
    fn far_observations_do_not_underflow() {
        // every raw density is exp(-5000) or less
        let model = mock_two_state();
        let seq = Sequence::univariate(vec![0.0, 1.0, 2.0], vec![50.0, 51.0, -50.0]).unwrap();
        let (post, _) = posterior_of(&model, &seq);
        assert!(post.log_likelihood().is_finite());
        assert!(post.log_likelihood() < -1000.0);
        for i in 0..post.len() {
            assert_abs_diff_eq!(post.gamma(i).sum(), 1.0, epsilon = 1e-10);
        }
    }
    #[test]
    fn single_observation() {
        let model = mock_two_state();
        let seq = Sequence::univariate(vec![3.0], vec![0.1]).unwrap();
        let (post, _) = posterior_of(&model, &seq);
        let b = model.emission.likelihoods(&[0.1]).unwrap();
        assert_abs_diff_eq!(
            post.log_likelihood(),
            (0.5 * b[0] + 0.5 * b[1]).ln(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(post.gamma(0)[0], b[0] / (b[0] + b[1]), epsilon = 1e-12);
    }
}
