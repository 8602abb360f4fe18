//!
//! Eigendecomposition of a generator matrix
//!
//! ```text
//! Q = U diag(D) V,   V = U^{-1}
//! exp(Qt) = U diag(exp(t D)) V
//! ```
//!
//! A generator of a non-reversible chain can have complex eigenvalues, so
//! `U`, `V` and `D` are kept complex. Any real quantity computed from them
//! is the real part of the complex result.
//!
//! ## Tied eigenvalues
//!
//! Eigenvalues are grouped by single linkage:
//! `|d_p - d_q| <= TIE_TOL * max(1, |d_p|, |d_q|)`.
//! Within a group the divided difference of `exp(t x)` is replaced by its
//! confluent limit `t exp(t d)` evaluated at the group mean `d`. This holds for
//! ties of any multiplicity, as long as `Q` is diagonalizable.
//!
//! ## Accuracy of end-state integrals
//!
//! The integrals `sum_{p,q} U[k,p] V[p,i] U[j,q] V[q,l] Psi[p,q]` cancel terms
//! of size `(|U| |V|)^2 |Psi|`. For a nearly defective `Q` (two untied
//! eigenvalues with almost parallel eigenvectors) this loses every digit
//! while the reconstruction of `Q` still looks fine, so
//! `EigenDecomposition::end_state_error` bounds the rounding error of the
//! integrals directly and callers reject gaps where it exceeds `END_STATE_TOL`.
//!
use crate::error::{CtHmmError, Result};
use ndarray::{Array1, Array2};
use ndarray_linalg::{c64, Eig, Inverse};

/// relative tolerance of eigenvalue ties
pub const TIE_TOL: f64 = 1e-8;

/// relative tolerance of `|U diag(D) V - Q|`
const RECONSTRUCTION_TOL: f64 = 1e-6;

/// upper bound of `|U| |V|` (max-abs norms); above it `U` is treated as singular
const MAX_CONDITION: f64 = 1e12;

/// absolute tolerance of the end-state integrals, relative to `max(1, t)`
pub const END_STATE_TOL: f64 = 1e-7;

#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    /// eigenvalues `D`
    d: Array1<c64>,
    /// right eigenvectors `U` (as columns)
    u: Array2<c64>,
    /// `V = U^{-1}`
    v: Array2<c64>,
    /// tie group of each eigenvalue
    group: Vec<usize>,
    /// mean eigenvalue of each tie group
    group_mean: Vec<c64>,
    /// `|U| |V|` in max-abs norms
    condition: f64,
}

impl EigenDecomposition {
    ///
    /// Decompose `q`. Fails with `SingularMatrix` when the decomposition is
    /// unusable: LAPACK error, non-finite output, non-invertible or
    /// ill-conditioned `U` (defective `q`), or all eigenvalues tied.
    ///
    pub fn new(q: &Array2<f64>) -> Result<EigenDecomposition> {
        let n = q.nrows();
        let (d, u) = q
            .eig()
            .map_err(|e| CtHmmError::SingularMatrix(format!("eigendecomposition failed: {}", e)))?;
        if d.iter().chain(u.iter()).any(|z| !z.re.is_finite() || !z.im.is_finite()) {
            return Err(CtHmmError::SingularMatrix(
                "non-finite eigenvalue or eigenvector".to_string(),
            ));
        }
        let v = u
            .inv()
            .map_err(|e| CtHmmError::SingularMatrix(format!("eigenvectors not invertible: {}", e)))?;
        let condition = max_norm(&u) * max_norm(&v);
        if !condition.is_finite() || condition > MAX_CONDITION {
            return Err(CtHmmError::SingularMatrix(format!(
                "eigenvector matrix is ill-conditioned (|U||V|={:e})",
                condition
            )));
        }

        let (group, group_mean) = tie_groups(&d);
        let ed = EigenDecomposition {
            d,
            u,
            v,
            group,
            group_mean,
            condition,
        };

        if n > 1 && ed.n_groups() == 1 {
            return Err(CtHmmError::SingularMatrix(format!(
                "all {} eigenvalues are tied",
                n
            )));
        }

        let scale = q.iter().fold(1.0f64, |m, x| m.max(x.abs()));
        let error = ed
            .reconstruct()
            .iter()
            .zip(q.iter())
            .map(|(z, &x)| (z - c64::new(x, 0.0)).norm())
            .fold(0.0, f64::max);
        if !(error <= RECONSTRUCTION_TOL * scale) {
            return Err(CtHmmError::SingularMatrix(format!(
                "U diag(D) V does not reproduce Q (error={:e})",
                error
            )));
        }
        Ok(ed)
    }
    /// number of states
    pub fn n(&self) -> usize {
        self.d.len()
    }
    pub fn eigenvalues(&self) -> &Array1<c64> {
        &self.d
    }
    pub fn u(&self) -> &Array2<c64> {
        &self.u
    }
    pub fn v(&self) -> &Array2<c64> {
        &self.v
    }
    /// number of distinct eigenvalues after merging ties
    pub fn n_groups(&self) -> usize {
        self.group_mean.len()
    }
    /// `|U| |V|` in max-abs norms
    pub fn condition(&self) -> f64 {
        self.condition
    }
    /// eigenvalues `p` and `q` are tied
    pub fn is_tied(&self, p: usize, q: usize) -> bool {
        self.group[p] == self.group[q]
    }
    ///
    /// `U diag(D) V`
    ///
    pub fn reconstruct(&self) -> Array2<c64> {
        let n = self.n();
        let ud = Array2::from_shape_fn((n, n), |(i, p)| self.u[[i, p]] * self.d[p]);
        ud.dot(&self.v)
    }
    ///
    /// `exp(Qt) = U diag(exp(t D)) V` (real part)
    ///
    pub fn exp(&self, t: f64) -> Array2<f64> {
        let n = self.n();
        let ue = Array2::from_shape_fn((n, n), |(i, p)| self.u[[i, p]] * (self.d[p] * t).exp());
        ue.dot(&self.v).mapv(|z| z.re)
    }
    ///
    /// Divided differences of `x -> exp(t x)` over the eigenvalue pairs.
    ///
    /// ```text
    /// Psi[p,q] = (exp(t d_p) - exp(t d_q)) / (d_p - d_q)   (d_p, d_q not tied)
    ///          = t exp(t d)                                 (tied, d = group mean)
    /// ```
    ///
    pub fn psi(&self, t: f64) -> Array2<c64> {
        let n = self.n();
        let e: Vec<c64> = self.d.iter().map(|&d| (d * t).exp()).collect();
        let e_group: Vec<c64> = self
            .group_mean
            .iter()
            .map(|&d| (d * t).exp() * t)
            .collect();
        Array2::from_shape_fn((n, n), |(p, q)| {
            if self.is_tied(p, q) {
                e_group[self.group[p]]
            } else {
                let h = self.d[p] - self.d[q];
                if (h * t).norm() < 1.0 {
                    // exp(t d_q) (exp(t h) - 1) / h without cancellation
                    e[q] * exp_m1(h * t) / h
                } else {
                    (e[p] - e[q]) / h
                }
            }
        })
    }
    ///
    /// Bound of the rounding error of the end-state integrals at gap `t`
    ///
    /// ```text
    /// n^2 eps (|U| |V|)^2 max|Psi(t)|
    /// ```
    ///
    pub fn end_state_error(&self, t: f64) -> f64 {
        let n = self.n() as f64;
        let psi_max = max_norm(&self.psi(t));
        n * n * f64::EPSILON * self.condition * self.condition * psi_max
    }
    ///
    /// Fails with `SingularMatrix` when the end-state integrals at gap `t`
    /// cannot be trusted to `END_STATE_TOL * max(1, t)`.
    ///
    pub fn check_end_state_accuracy(&self, t: f64) -> Result<()> {
        let error = self.end_state_error(t);
        if error <= END_STATE_TOL * t.max(1.0) {
            Ok(())
        } else {
            Err(CtHmmError::SingularMatrix(format!(
                "eigenvectors too close to parallel for gap {} (|U||V|={:e}, error bound={:e})",
                t, self.condition, error
            )))
        }
    }
}

///
/// `exp(z) - 1` accurate for small `|z|`
///
fn exp_m1(z: c64) -> c64 {
    let half = (z.im / 2.0).sin();
    let re = z.re.exp_m1() * z.im.cos() - 2.0 * half * half;
    let im = z.re.exp() * z.im.sin();
    c64::new(re, im)
}

fn max_norm(a: &Array2<c64>) -> f64 {
    a.iter().fold(0.0, |m, z| m.max(z.norm()))
}

fn is_close(a: c64, b: c64) -> bool {
    (a - b).norm() <= TIE_TOL * 1f64.max(a.norm()).max(b.norm())
}

///
/// Single-linkage grouping of eigenvalues. Returns the group id of each
/// eigenvalue and the mean of each group.
///
fn tie_groups(d: &Array1<c64>) -> (Vec<usize>, Vec<c64>) {
    let n = d.len();
    // union-find with path halving
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }
    for p in 0..n {
        for q in 0..p {
            if is_close(d[p], d[q]) {
                let rp = find(&mut parent, p);
                let rq = find(&mut parent, q);
                if rp != rq {
                    parent[rp] = rq;
                }
            }
        }
    }

    let mut group = vec![usize::MAX; n];
    let mut sums: Vec<(c64, usize)> = Vec::new();
    let mut root_to_group = vec![usize::MAX; n];
    for p in 0..n {
        let root = find(&mut parent, p);
        if root_to_group[root] == usize::MAX {
            root_to_group[root] = sums.len();
            sums.push((c64::new(0.0, 0.0), 0));
        }
        let g = root_to_group[root];
        group[p] = g;
        sums[g].0 += d[p];
        sums[g].1 += 1;
    }
    let means = sums
        .into_iter()
        .map(|(sum, count)| sum / count as f64)
        .collect();
    (group, means)
}

//
// tests
//
