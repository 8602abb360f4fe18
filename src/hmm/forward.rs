//!
//! Scaled forward algorithm
//!
use crate::error::{CtHmmError, Result};
use crate::model::{EmissionTable, KernelCache};
use ndarray::{Array1, Array2, ArrayView1};

///
/// Result of the forward algorithm
///
/// `alpha` rows are normalized. `c[i]` is the normalizer of row `i` computed
/// with the scaled emissions of the table, and `log_c[i]` adds the table
/// scale back, so that `sum_i log_c[i] = log P(x)`.
///
#[derive(Debug, Clone)]
pub struct Forward {
    alpha: Array2<f64>,
    c: Vec<f64>,
    log_c: Vec<f64>,
}

impl Forward {
    pub fn alpha(&self, i: usize) -> ArrayView1<f64> {
        self.alpha.row(i)
    }
    pub fn alphas(&self) -> &Array2<f64> {
        &self.alpha
    }
    ///
    /// filtered distribution at the last observation
    ///
    pub fn last(&self) -> ArrayView1<f64> {
        self.alpha.row(self.alpha.nrows() - 1)
    }
    ///
    /// normalizer of row `i` (scaled emissions)
    ///
    pub fn c(&self, i: usize) -> f64 {
        self.c[i]
    }
    ///
    /// `log P(x_i | x_0..x_{i-1})`
    ///
    pub fn log_c(&self, i: usize) -> f64 {
        self.log_c[i]
    }
    pub fn log_likelihood(&self) -> f64 {
        self.log_c.iter().sum()
    }
}

///
/// Run forward on an emission table.
///
/// ```text
/// alpha_0 ~ pi0 * b_0
/// alpha_i ~ (alpha_{i-1} P(t_i - t_{i-1})) * b_i
/// ```
///
pub fn forward(
    pi0: &Array1<f64>,
    kernels: &KernelCache,
    gap_index: &[usize],
    table: &EmissionTable,
) -> Result<Forward> {
    let m = table.len();
    let n = pi0.len();
    let mut alpha = Array2::zeros((m, n));
    let mut c = Vec::with_capacity(m);
    for i in 0..m {
        let mut a = if i == 0 {
            pi0 * table.get(0)
        } else {
            alpha.row(i - 1).dot(kernels.get(gap_index[i - 1])) * table.get(i)
        };
        let ci = a.sum();
        if !(ci.is_finite() && ci > 0.0) {
            return Err(CtHmmError::NumericalInstability(format!(
                "forward normalizer c[{}]={} (observation impossible under the model)",
                i, ci
            )));
        }
        a /= ci;
        alpha.row_mut(i).assign(&a);
        c.push(ci);
    }
    let log_c = c
        .iter()
        .enumerate()
        .map(|(i, &ci)| ci.ln() + table.log_scale(i))
        .collect();
    Ok(Forward { alpha, c, log_c })
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::mock_two_state;
    use crate::sequence::{GapSet, Sequence, GAP_REL_TOL};
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    #[test]
    fn forward_rows_are_normalized() {
        let model = mock_two_state();
        let seq = Sequence::univariate(vec![0.0, 1.0, 2.0, 10.0], vec![0.1, 0.9, 0.2, 1.0]).unwrap();
        let (gaps, indices) = GapSet::from_sequences(&[seq.clone()], GAP_REL_TOL);
        let kernels = KernelCache::build(model.q(), &gaps).unwrap();
        let table = EmissionTable::new(&model.emission, &seq).unwrap();
        let f = forward(&model.pi0, &kernels, &indices[0], &table).unwrap();
        for i in 0..seq.len() {
            assert_abs_diff_eq!(f.alpha(i).sum(), 1.0, epsilon = 1e-12);
        }
        assert_eq!(f.last(), f.alpha(3));
        // after a long gap the prior is stationary (1/2, 1/2)
        let b = model.emission.likelihoods(&[1.0]).unwrap();
        assert_abs_diff_eq!(f.log_c(3), (0.5 * b[0] + 0.5 * b[1]).ln(), epsilon = 1e-6);
    }
    #[test]
    fn forward_impossible_start() {
        let mut model = mock_two_state();
        // start surely in state 0, and observation is impossible there
        model.pi0 = arr1(&[1.0, 0.0]);
        let seq = Sequence::univariate(vec![0.0], vec![1e6]).unwrap();
        let (gaps, indices) = GapSet::from_sequences(&[seq.clone()], GAP_REL_TOL);
        let kernels = KernelCache::build(model.q(), &gaps).unwrap();
        let table = EmissionTable::new(&model.emission, &seq).unwrap();
        assert!(matches!(
            forward(&model.pi0, &kernels, &indices[0], &table),
            Err(CtHmmError::NumericalInstability(_))
        ));
    }
}
