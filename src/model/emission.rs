//!
//! Gaussian observation model
//!
//! Each marker has one univariate normal per level. The density of an
//! observation vector `x` in a composite state `s = (l_0, .., l_{M-1})` is
//!
//! ```text
//! b_s(x) = prod_m N(x_m; mu[m][l_m], sd[m][l_m]^2)
//! ```
//!
//! i.e. a Gaussian with diagonal covariance (a plain univariate normal when
//! there is a single marker).
//!
use super::structure::StateSpace;
use crate::error::{CtHmmError, Result};
use crate::sequence::Sequence;
use derive_new::new;
use fnv::FnvHashMap;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// `ln(2 pi) / 2`
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// default lower bound of re-estimated standard deviations
pub const MIN_SD: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, new)]
pub struct Gaussian {
    pub mean: f64,
    pub sd: f64,
}

impl Gaussian {
    ///
    /// log density at `x`
    ///
    pub fn ln_pdf(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.sd;
        -0.5 * z * z - self.sd.ln() - LN_SQRT_2PI
    }
    pub fn pdf(&self, x: f64) -> f64 {
        self.ln_pdf(x).exp()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationModel {
    space: StateSpace,
    /// `markers[m][l]` is the distribution of marker `m` at level `l`
    markers: Vec<Vec<Gaussian>>,
}

impl ObservationModel {
    ///
    /// `means[m][l]` and `sds[m][l]` of level `l` of marker `m`. The number of
    /// levels of each marker defines the composite state space.
    ///
    pub fn new(means: Vec<Vec<f64>>, sds: Vec<Vec<f64>>) -> Result<ObservationModel> {
        if means.len() != sds.len() {
            return Err(CtHmmError::DimensionMismatch {
                what: "number of markers in sds",
                expected: means.len(),
                actual: sds.len(),
            });
        }
        let mut markers = Vec::with_capacity(means.len());
        for (m, (mu, sd)) in means.into_iter().zip(sds.into_iter()).enumerate() {
            if mu.len() != sd.len() {
                return Err(CtHmmError::DimensionMismatch {
                    what: "number of levels in sds",
                    expected: mu.len(),
                    actual: sd.len(),
                });
            }
            if mu.iter().any(|x| !x.is_finite()) {
                return Err(CtHmmError::StructuralConfig(format!(
                    "marker {} has a non-finite mean",
                    m
                )));
            }
            if sd.iter().any(|&x| !(x.is_finite() && x > 0.0)) {
                return Err(CtHmmError::StructuralConfig(format!(
                    "marker {} has a non-positive standard deviation",
                    m
                )));
            }
            markers.push(
                mu.into_iter()
                    .zip(sd.into_iter())
                    .map(|(mean, sd)| Gaussian::new(mean, sd))
                    .collect::<Vec<_>>(),
            );
        }
        let space = StateSpace::new(markers.iter().map(|levels| levels.len()).collect())?;
        Ok(ObservationModel { space, markers })
    }
    pub fn space(&self) -> &StateSpace {
        &self.space
    }
    pub fn n_states(&self) -> usize {
        self.space.n_states()
    }
    pub fn n_markers(&self) -> usize {
        self.markers.len()
    }
    pub fn gaussian(&self, marker: usize, level: usize) -> &Gaussian {
        &self.markers[marker][level]
    }
    pub fn means(&self) -> Vec<Vec<f64>> {
        self.markers
            .iter()
            .map(|levels| levels.iter().map(|g| g.mean).collect())
            .collect()
    }
    pub fn sds(&self) -> Vec<Vec<f64>> {
        self.markers
            .iter()
            .map(|levels| levels.iter().map(|g| g.sd).collect())
            .collect()
    }
    ///
    /// `log b_s(x)` of every composite state `s`
    ///
    pub fn log_likelihoods(&self, x: &[f64]) -> Result<Array1<f64>> {
        if x.len() != self.n_markers() {
            return Err(CtHmmError::DimensionMismatch {
                what: "observation markers",
                expected: self.n_markers(),
                actual: x.len(),
            });
        }
        // marker-level table first, then sum per composite state
        let per_level: Vec<Vec<f64>> = self
            .markers
            .iter()
            .zip(x)
            .map(|(levels, &xm)| levels.iter().map(|g| g.ln_pdf(xm)).collect())
            .collect();
        Ok(Array1::from_shape_fn(self.n_states(), |s| {
            self.space
                .levels(s)
                .iter()
                .enumerate()
                .map(|(m, &l)| per_level[m][l])
                .sum()
        }))
    }
    ///
    /// `b_s(x)` of every composite state `s`
    ///
    pub fn likelihoods(&self, x: &[f64]) -> Result<Array1<f64>> {
        Ok(self.log_likelihoods(x)?.mapv(f64::exp))
    }
    ///
    /// Expected observation `sum_s probs[s] mu(s)` for a state distribution.
    ///
    pub fn expected_value(&self, probs: ArrayView1<f64>) -> Vec<f64> {
        let mut expected = vec![0.0; self.n_markers()];
        for (s, &w) in probs.iter().enumerate() {
            for (m, &l) in self.space.levels(s).iter().enumerate() {
                expected[m] += w * self.markers[m][l].mean;
            }
        }
        expected
    }
    ///
    /// Re-estimated model from accumulated posterior statistics.
    ///
    /// Levels that received no posterior weight keep their parameters.
    ///
    pub fn updated(
        &self,
        stats: &EmissionStats,
        update_mu: bool,
        update_sigma: bool,
        min_sd: f64,
    ) -> ObservationModel {
        let mut markers = self.markers.clone();
        for (m, levels) in markers.iter_mut().enumerate() {
            for (l, g) in levels.iter_mut().enumerate() {
                let acc = &stats.levels[m][l];
                if !(acc.weight > 0.0) {
                    continue;
                }
                let mean = acc.sum / acc.weight;
                let mu = if update_mu { mean } else { g.mean };
                if update_sigma {
                    // sum w (x - mu)^2 / sum w
                    let var = acc.sum_sq / acc.weight - 2.0 * mu * mean + mu * mu;
                    g.sd = var.max(0.0).sqrt().max(min_sd);
                }
                g.mean = mu;
            }
        }
        ObservationModel {
            space: self.space.clone(),
            markers,
        }
    }
}

///
/// Weighted moments of one marker level
///
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelMoments {
    pub weight: f64,
    pub sum: f64,
    pub sum_sq: f64,
}

///
/// Posterior-weighted moments of the observations, per marker and level.
///
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionStats {
    levels: Vec<Vec<LevelMoments>>,
}

impl EmissionStats {
    pub fn zero(space: &StateSpace) -> EmissionStats {
        EmissionStats {
            levels: space
                .radices()
                .iter()
                .map(|&r| vec![LevelMoments::default(); r])
                .collect(),
        }
    }
    ///
    /// Add observation `x` weighted by the state occupancy `gamma`.
    ///
    pub fn add_observation(&mut self, space: &StateSpace, gamma: ArrayView1<f64>, x: &[f64]) {
        for (s, &w) in gamma.iter().enumerate() {
            if w == 0.0 {
                continue;
            }
            for (m, &l) in space.levels(s).iter().enumerate() {
                let acc = &mut self.levels[m][l];
                acc.weight += w;
                acc.sum += w * x[m];
                acc.sum_sq += w * x[m] * x[m];
            }
        }
    }
    pub fn level(&self, marker: usize, level: usize) -> &LevelMoments {
        &self.levels[marker][level]
    }
    pub fn is_finite(&self) -> bool {
        self.levels
            .iter()
            .flatten()
            .all(|a| a.weight.is_finite() && a.sum.is_finite() && a.sum_sq.is_finite())
    }
}

impl std::ops::AddAssign<&EmissionStats> for EmissionStats {
    fn add_assign(&mut self, other: &EmissionStats) {
        for (a, b) in self.levels.iter_mut().flatten().zip(other.levels.iter().flatten()) {
            a.weight += b.weight;
            a.sum += b.sum;
            a.sum_sq += b.sum_sq;
        }
    }
}

///
/// Emission densities of every observation of a sequence.
///
/// A row is computed once per distinct observation vector and divided by
/// its maximum, so that a row never underflows entirely:
///
/// ```text
/// b_i(s) = row(i)[s] * exp(log_scale(i))
/// ```
///
#[derive(Debug, Clone)]
pub struct EmissionTable {
    rows: Vec<Array1<f64>>,
    log_scales: Vec<f64>,
    /// observation index -> row index
    row_of: Vec<usize>,
}

impl EmissionTable {
    pub fn new(model: &ObservationModel, sequence: &Sequence) -> Result<EmissionTable> {
        let mut rows = Vec::new();
        let mut log_scales = Vec::new();
        let mut index: FnvHashMap<Vec<u64>, usize> = FnvHashMap::default();
        let mut row_of = Vec::with_capacity(sequence.len());
        for x in sequence.values() {
            let key: Vec<u64> = x.iter().map(|v| v.to_bits()).collect();
            let r = match index.get(&key) {
                Some(&r) => r,
                None => {
                    let ll = model.log_likelihoods(x)?;
                    let max = ll.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    if !max.is_finite() {
                        return Err(CtHmmError::NumericalInstability(format!(
                            "observation {:?} has zero density in every state",
                            x
                        )));
                    }
                    rows.push(ll.mapv(|v| (v - max).exp()));
                    log_scales.push(max);
                    index.insert(key, rows.len() - 1);
                    rows.len() - 1
                }
            };
            row_of.push(r);
        }
        Ok(EmissionTable {
            rows,
            log_scales,
            row_of,
        })
    }
    /// number of observations
    pub fn len(&self) -> usize {
        self.row_of.len()
    }
    pub fn is_empty(&self) -> bool {
        self.row_of.is_empty()
    }
    /// number of distinct observation vectors
    pub fn n_distinct(&self) -> usize {
        self.rows.len()
    }
    ///
    /// scaled densities of observation `i` (max entry is 1)
    ///
    pub fn get(&self, i: usize) -> &Array1<f64> {
        &self.rows[self.row_of[i]]
    }
    ///
    /// log of the factor removed from row `i`
    ///
    pub fn log_scale(&self, i: usize) -> f64 {
        self.log_scales[self.row_of[i]]
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    #[test]
    fn gaussian_pdf() {
        let g = Gaussian::new(1.0, 2.0);
        // 1 / (2 sqrt(2 pi))
        assert_abs_diff_eq!(g.pdf(1.0), 0.19947114020071635, epsilon = 1e-14);
        assert_abs_diff_eq!(g.ln_pdf(3.0), g.pdf(3.0).ln(), epsilon = 1e-12);
    }
    #[test]
    fn observation_model_validation() {
        assert!(ObservationModel::new(vec![vec![0.0, 1.0]], vec![vec![1.0]]).is_err());
        assert!(ObservationModel::new(vec![vec![0.0, 1.0]], vec![vec![1.0, 0.0]]).is_err());
        assert!(ObservationModel::new(vec![vec![0.0]], vec![]).is_err());
        let m = ObservationModel::new(vec![vec![0.0, 1.0]], vec![vec![1.0, 1.0]]).unwrap();
        assert!(matches!(
            m.likelihoods(&[0.0, 0.0]),
            Err(CtHmmError::DimensionMismatch { .. })
        ));
    }
    #[test]
    fn diagonal_gaussian_is_product() {
        let m = ObservationModel::new(
            vec![vec![0.0, 1.0], vec![10.0, 20.0, 30.0]],
            vec![vec![1.0, 0.5], vec![2.0, 3.0, 4.0]],
        )
        .unwrap();
        assert_eq!(m.n_states(), 6);
        let x = [0.3, 22.0];
        let b = m.likelihoods(&x).unwrap();
        for s in 0..6 {
            let l = m.space().levels(s);
            let expected = m.gaussian(0, l[0]).pdf(x[0]) * m.gaussian(1, l[1]).pdf(x[1]);
            assert_abs_diff_eq!(b[s], expected, epsilon = 1e-15);
        }
        let e = m.expected_value(arr1(&[0.0, 0.0, 0.0, 0.5, 0.5, 0.0]).view());
        assert_abs_diff_eq!(e[0], 1.0);
        assert_abs_diff_eq!(e[1], 15.0);
    }
    #[test]
    fn emission_table_shares_rows() {
        let m = ObservationModel::new(vec![vec![0.0, 1.0]], vec![vec![0.5, 0.5]]).unwrap();
        let s = Sequence::univariate(vec![0.0, 1.0, 2.0, 3.0], vec![0.1, 50.0, 0.1, 50.0]).unwrap();
        let table = EmissionTable::new(&m, &s).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.n_distinct(), 2);
        // far observation: raw densities underflow but the scaled row does not
        assert!(m.likelihoods(&[50.0]).unwrap().iter().all(|&b| b == 0.0));
        assert!(table.get(1).iter().any(|&b| b == 1.0));
        for i in 0..4 {
            let direct = m.log_likelihoods(s.value(i)).unwrap();
            for k in 0..2 {
                assert_abs_diff_eq!(
                    table.get(i)[k].ln() + table.log_scale(i),
                    direct[k],
                    epsilon = 1e-9
                );
            }
        }
    }
    #[test]
    fn update_keeps_unvisited_levels() {
        let m = ObservationModel::new(vec![vec![0.0, 1.0]], vec![vec![0.5, 0.5]]).unwrap();
        let mut stats = EmissionStats::zero(m.space());
        stats.add_observation(m.space(), arr1(&[1.0, 0.0]).view(), &[0.2]);
        stats.add_observation(m.space(), arr1(&[1.0, 0.0]).view(), &[0.4]);
        let u = m.updated(&stats, true, true, MIN_SD);
        assert_abs_diff_eq!(u.gaussian(0, 0).mean, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(u.gaussian(0, 0).sd, 0.1, epsilon = 1e-12);
        assert_eq!(u.gaussian(0, 1), m.gaussian(0, 1));
        // sigma only: variance around the current mean 0.0
        let u = m.updated(&stats, false, true, MIN_SD);
        assert_abs_diff_eq!(u.gaussian(0, 0).mean, 0.0);
        assert_abs_diff_eq!(u.gaussian(0, 0).sd, (0.1f64).sqrt(), epsilon = 1e-12);
        // floor
        let mut stats = EmissionStats::zero(m.space());
        stats.add_observation(m.space(), arr1(&[0.0, 2.0]).view(), &[1.0]);
        let u = m.updated(&stats, true, true, MIN_SD);
        assert_eq!(u.gaussian(0, 1).sd, MIN_SD);
    }
}
