//!
//! End-state integrals from the exponential of a block matrix
//!
//! ```text
//! exp( [[Q, E_ij], [0, Q]] t ) = [[P(t), I_ij(t)], [0, P(t)]]
//! I_ij(t)[k,l] = int_0^t P_ki(s) P_jl(t-s) ds
//! ```
//!
//! `E_ij` is the unit matrix with a single 1 at `(i, j)`. No
//! eigendecomposition is needed, so tied or defective generators are fine.
//!
use super::EndStateKernels;
use crate::error::Result;
use crate::linalg::expm;
use crate::model::RateMatrix;
use crate::sequence::GapSet;
use ndarray::{s, Array2};
use rayon::prelude::*;

///
/// `int_0^t exp(Q s) E_ij exp(Q (t-s)) ds`
///
pub fn end_state_integral(q: &Array2<f64>, i: usize, j: usize, t: f64) -> Result<Array2<f64>> {
    let n = q.nrows();
    let mut a = Array2::zeros((2 * n, 2 * n));
    a.slice_mut(s![..n, ..n]).assign(q);
    a.slice_mut(s![n.., n..]).assign(q);
    a[[i, n + j]] = 1.0;
    let e = expm(&(a * t))?;
    Ok(e.slice(s![..n, n..]).to_owned())
}

///
/// End-state matrices of every distinct gap, from block-matrix exponentials.
///
pub fn augmented_kernels(rate: &RateMatrix, gaps: &GapSet) -> Result<EndStateKernels> {
    let q = rate.q();
    let allowed = rate.allowed();
    let per_gap = gaps
        .gaps()
        .par_iter()
        .map(|&t| {
            let tau = (0..rate.n())
                .map(|i| end_state_integral(q, i, i, t))
                .collect::<Result<Vec<_>>>()?;
            let trans = allowed
                .iter()
                .map(|&(i, j)| Ok(((i, j), end_state_integral(q, i, j, t)? * rate.rate(i, j))))
                .collect::<Result<Vec<_>>>()?;
            Ok((tau, trans))
        })
        .collect::<Result<Vec<_>>>()?;
    let (tau, trans) = per_gap.into_iter().unzip();
    Ok(EndStateKernels::from_parts(tau, trans))
}

//
// tests
//
