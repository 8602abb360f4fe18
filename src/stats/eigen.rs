//!
//! End-state integrals from the eigendecomposition `Q = U diag(D) V`
//!
//! ```text
//! int_0^t P_ki(s) P_jl(t-s) ds = sum_{p,q} U[k,p] V[p,i] U[j,q] V[q,l] Psi[p,q]
//! ```
//!
//! where `Psi` holds the divided differences of `exp(t x)` over the
//! eigenvalues (see `EigenDecomposition::psi`). Both estimators fail with
//! `SingularMatrix` for a gap whose integrals the decomposition cannot
//! resolve (`EigenDecomposition::check_end_state_accuracy`).
//!
use super::{EndStateKernels, StatsEstimator};
use crate::error::Result;
use crate::linalg::EigenDecomposition;
use crate::model::RateMatrix;
use crate::sequence::GapSet;
use ndarray::{Array1, Array2};
use ndarray_linalg::c64;
use rayon::prelude::*;

///
/// Eigen method contracting each step through `U`, `V` and the cached `Psi`.
///
/// ```text
/// B = U^T F V^T
/// M = V^T (Psi o B) U^T
/// TauI[i]  += Re M[i,i]
/// Nij[i,j] += Q[i,j] Re M[i,j]
/// ```
///
#[derive(Debug, Clone)]
pub struct EigenOnDemand {
    u: Array2<c64>,
    v: Array2<c64>,
    q: Array2<f64>,
    allowed: Vec<(usize, usize)>,
    /// `Psi` of each gap entry
    psi: Vec<Array2<c64>>,
}

impl EigenOnDemand {
    pub fn new(ed: &EigenDecomposition, rate: &RateMatrix, gaps: &GapSet) -> Result<EigenOnDemand> {
        let psi = gaps
            .gaps()
            .par_iter()
            .map(|&t| {
                ed.check_end_state_accuracy(t)?;
                Ok(ed.psi(t))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(EigenOnDemand {
            u: ed.u().clone(),
            v: ed.v().clone(),
            q: rate.q().clone(),
            allowed: rate.allowed(),
            psi,
        })
    }
}

impl StatsEstimator for EigenOnDemand {
    fn accumulate(&self, gap: usize, ratio: &Array2<f64>, tau: &mut Array1<f64>, n: &mut Array2<f64>) {
        let f = ratio.mapv(|x| c64::new(x, 0.0));
        let b = self.u.t().dot(&f).dot(&self.v.t());
        let c = &self.psi[gap] * &b;
        let m = self.v.t().dot(&c).dot(&self.u.t());
        for i in 0..tau.len() {
            tau[i] += m[[i, i]].re;
        }
        for &(i, j) in self.allowed.iter() {
            n[[i, j]] += self.q[[i, j]] * m[[i, j]].re;
        }
    }
}

///
/// `Re(U A V)` with `A[p,q] = V[p,i] U[j,q] Psi[p,q]`
///
fn end_state(ed: &EigenDecomposition, psi: &Array2<c64>, i: usize, j: usize) -> Array2<f64> {
    let (u, v) = (ed.u(), ed.v());
    let n = ed.n();
    let a = Array2::from_shape_fn((n, n), |(p, q)| v[[p, i]] * u[[j, q]] * psi[[p, q]]);
    u.dot(&a).dot(v).mapv(|z| z.re)
}

///
/// Eigen method with the end-state matrices of every distinct gap built
/// in advance.
///
pub fn eigen_kernels(
    ed: &EigenDecomposition,
    rate: &RateMatrix,
    gaps: &GapSet,
) -> Result<EndStateKernels> {
    let allowed = rate.allowed();
    let parts = gaps
        .gaps()
        .par_iter()
        .map(|&t| {
            ed.check_end_state_accuracy(t)?;
            let psi = ed.psi(t);
            let tau: Vec<Array2<f64>> = (0..ed.n()).map(|i| end_state(ed, &psi, i, i)).collect();
            let trans: Vec<((usize, usize), Array2<f64>)> = allowed
                .iter()
                .map(|&(i, j)| ((i, j), end_state(ed, &psi, i, j) * rate.rate(i, j)))
                .collect();
            Ok((tau, trans))
        })
        .collect::<Result<Vec<_>>>()?;
    let (tau, trans) = parts.into_iter().unzip();
    Ok(EndStateKernels::from_parts(tau, trans))
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CtHmmError;
    use crate::model::transition_kernel;
    use crate::sequence::{Sequence, GAP_REL_TOL};
    use crate::stats::augmented_kernels;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn sojourn_end_states_sum_to_t_p() {
        // sum_i int P_ki(s) P_il(t-s) ds = t P_kl(t)
        let q = arr2(&[[-3.0, 2.0, 1.0], [0.5, -1.0, 0.5], [4.0, 4.0, -8.0]]);
        let mask = Array2::from_shape_fn((3, 3), |(i, j)| i != j);
        let rate = RateMatrix::new(q.clone(), mask).unwrap();
        let ed = EigenDecomposition::new(&q).unwrap();
        let s = Sequence::univariate(vec![0.0, 0.25, 1.25], vec![0.0; 3]).unwrap();
        let (gaps, _) = GapSet::from_sequences(&[s], GAP_REL_TOL);
        let kernels = eigen_kernels(&ed, &rate, &gaps).unwrap();
        assert_eq!(kernels.len(), 2);
        for (g, &t) in gaps.gaps().iter().enumerate() {
            let p = transition_kernel(&q, t).unwrap();
            let mut sum: Array2<f64> = Array2::zeros((3, 3));
            for i in 0..3 {
                sum += kernels.tau(g, i);
            }
            for (x, y) in sum.iter().zip(p.iter()) {
                assert_abs_diff_eq!(*x, t * y, epsilon = 1e-10);
            }
        }
    }
    #[test]
    fn nearly_defective_generator_agrees_or_is_singular() {
        // -1 and -(1 + 1e-7) are untied, with almost parallel eigenvectors
        let delta = 1e-7;
        let q = arr2(&[
            [-1.0, 1.0, 0.0],
            [0.0, -(1.0 + delta), 1.0 + delta],
            [0.0, 0.0, 0.0],
        ]);
        let mask = Array2::from_shape_fn((3, 3), |(i, j)| i < j);
        let rate = RateMatrix::new(q.clone(), mask).unwrap();
        let s = Sequence::univariate(vec![0.0, 1.0, 3.0], vec![0.0; 3]).unwrap();
        let (gaps, _) = GapSet::from_sequences(&[s], GAP_REL_TOL);
        let reference = augmented_kernels(&rate, &gaps).unwrap();

        let precomputed = EigenDecomposition::new(&q).and_then(|ed| eigen_kernels(&ed, &rate, &gaps));
        match precomputed {
            Ok(kernels) => {
                for g in 0..gaps.len() {
                    for i in 0..3 {
                        for (x, y) in kernels.tau(g, i).iter().zip(reference.tau(g, i).iter()) {
                            assert_abs_diff_eq!(x, y, epsilon = 1e-6);
                        }
                    }
                }
            }
            Err(e) => assert!(matches!(e, CtHmmError::SingularMatrix(_))),
        }
        let on_demand = EigenDecomposition::new(&q).and_then(|ed| EigenOnDemand::new(&ed, &rate, &gaps));
        match on_demand {
            Ok(estimator) => {
                let ratio = Array2::from_elem((3, 3), 1.0);
                let (mut tau, mut n) = (Array1::zeros(3), Array2::zeros((3, 3)));
                let (mut tau_ref, mut n_ref) = (Array1::zeros(3), Array2::zeros((3, 3)));
                estimator.accumulate(0, &ratio, &mut tau, &mut n);
                reference.accumulate(0, &ratio, &mut tau_ref, &mut n_ref);
                for (x, y) in tau.iter().zip(tau_ref.iter()) {
                    assert_abs_diff_eq!(x, y, epsilon = 1e-6);
                }
            }
            Err(e) => assert!(matches!(e, CtHmmError::SingularMatrix(_))),
        }
    }
}
