//!
//! Transition kernels `P(gap) = exp(Q gap)` of the distinct gaps
//!
use crate::error::Result;
use crate::linalg::expm;
use crate::sequence::GapSet;
use ndarray::Array2;
use rayon::prelude::*;

///
/// `exp(Q t)` with negative roundoff clamped to zero.
///
pub fn transition_kernel(q: &Array2<f64>, t: f64) -> Result<Array2<f64>> {
    let mut p = expm(&(q * t))?;
    p.mapv_inplace(|x| x.max(0.0));
    Ok(p)
}

///
/// One kernel per entry of a `GapSet`, for a fixed Q.
///
/// Rebuilt for every new Q.
///
#[derive(Debug, Clone)]
pub struct KernelCache {
    kernels: Vec<Array2<f64>>,
}

impl KernelCache {
    pub fn build(q: &Array2<f64>, gaps: &GapSet) -> Result<KernelCache> {
        let kernels = gaps
            .gaps()
            .par_iter()
            .map(|&t| transition_kernel(q, t))
            .collect::<Result<Vec<_>>>()?;
        Ok(KernelCache { kernels })
    }
    ///
    /// kernel of the gap entry `index`
    ///
    pub fn get(&self, index: usize) -> &Array2<f64> {
        &self.kernels[index]
    }
    pub fn len(&self) -> usize {
        self.kernels.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{Sequence, GAP_REL_TOL};
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn kernel_cache_rows_are_distributions() {
        let q = arr2(&[[-1.0, 1.0, 0.0], [0.0, -2.0, 2.0], [0.0, 0.0, 0.0]]);
        let s = Sequence::univariate(vec![0.0, 0.5, 3.0, 3.5, 20.0], vec![0.0; 5]).unwrap();
        let (gaps, indices) = GapSet::from_sequences(&[s], GAP_REL_TOL);
        let cache = KernelCache::build(&q, &gaps).unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(indices[0], vec![0, 1, 0, 2]);
        for k in 0..cache.len() {
            let p = cache.get(k);
            for row in p.rows() {
                assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-10);
                assert!(row.iter().all(|&x| x >= 0.0));
            }
            // absorbing state
            assert_abs_diff_eq!(p[[2, 2]], 1.0, epsilon = 1e-12);
            // unreachable backwards
            assert!(p[[1, 0]] < 1e-12);
        }
    }
}
