//!
//! Observation sequences (one per subject) and the distinct time-gap set
//!
//! ```text
//! times:   t[0] < t[1] < ... < t[m-1]
//! values:  x[0],  x[1],  ..., x[m-1]     (x[i] has one entry per marker)
//! gaps:    d[i] = t[i+1] - t[i]          (i = 0..m-1)
//! ```
//!
use crate::error::{CtHmmError, Result};
use serde::{Deserialize, Serialize};

/// Default relative tolerance under which two gaps share a transition kernel
pub const GAP_REL_TOL: f64 = 1e-9;

///
/// Irregularly sampled observations of a single subject.
///
/// `end_time` and `censored` are not used by training; they are carried for
/// trajectory decoders working on the trained model.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    times: Vec<f64>,
    values: Vec<Vec<f64>>,
    #[serde(default)]
    end_time: Option<f64>,
    #[serde(default)]
    censored: bool,
}

impl Sequence {
    ///
    /// Create a validated sequence of multi-marker observations.
    ///
    pub fn new(times: Vec<f64>, values: Vec<Vec<f64>>) -> Result<Sequence> {
        let seq = Sequence {
            times,
            values,
            end_time: None,
            censored: false,
        };
        seq.validate()?;
        Ok(seq)
    }
    ///
    /// Create a sequence with a single marker.
    ///
    pub fn univariate(times: Vec<f64>, values: Vec<f64>) -> Result<Sequence> {
        Sequence::new(times, values.into_iter().map(|x| vec![x]).collect())
    }
    ///
    /// Create a single-marker sequence from `(time, value)` pairs.
    ///
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Sequence> {
        let (times, values) = pairs.iter().cloned().unzip();
        Sequence::univariate(times, values)
    }
    ///
    /// Attach end-of-follow-up time and censoring flag.
    ///
    pub fn with_end_time(mut self, end_time: f64, censored: bool) -> Sequence {
        self.end_time = Some(end_time);
        self.censored = censored;
        self
    }
    ///
    /// Check the invariants. Called by constructors, and by the learner for
    /// sequences that came from deserialization.
    ///
    pub fn validate(&self) -> Result<()> {
        if self.times.is_empty() {
            return Err(CtHmmError::InvalidSequence(
                "a sequence needs at least one observation".to_string(),
            ));
        }
        if self.times.len() != self.values.len() {
            return Err(CtHmmError::InvalidSequence(format!(
                "{} timestamps but {} observations",
                self.times.len(),
                self.values.len()
            )));
        }
        if self.times.iter().any(|t| !t.is_finite()) {
            return Err(CtHmmError::InvalidSequence(
                "timestamps must be finite".to_string(),
            ));
        }
        if let Some(i) = (1..self.times.len()).find(|&i| self.times[i] <= self.times[i - 1]) {
            return Err(CtHmmError::InvalidSequence(format!(
                "timestamps must be strictly increasing (t[{}]={} <= t[{}]={})",
                i,
                self.times[i],
                i - 1,
                self.times[i - 1]
            )));
        }
        let dim = self.values[0].len();
        if dim == 0 {
            return Err(CtHmmError::InvalidSequence(
                "observations must have at least one marker".to_string(),
            ));
        }
        for x in self.values.iter() {
            if x.len() != dim {
                return Err(CtHmmError::DimensionMismatch {
                    what: "observation vector",
                    expected: dim,
                    actual: x.len(),
                });
            }
            if x.iter().any(|v| !v.is_finite()) {
                return Err(CtHmmError::InvalidSequence(
                    "observation values must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }
    /// number of observations
    pub fn len(&self) -> usize {
        self.times.len()
    }
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
    /// number of markers of each observation
    pub fn n_markers(&self) -> usize {
        self.values.first().map_or(0, |x| x.len())
    }
    pub fn times(&self) -> &[f64] {
        &self.times
    }
    pub fn time(&self, i: usize) -> f64 {
        self.times[i]
    }
    pub fn value(&self, i: usize) -> &[f64] {
        &self.values[i]
    }
    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }
    ///
    /// iterator of `t[i+1] - t[i]`
    ///
    pub fn gaps(&self) -> impl Iterator<Item = f64> + '_ {
        self.times.windows(2).map(|w| w[1] - w[0])
    }
    ///
    /// `t[m-1] - t[0]`, the observed time span
    ///
    pub fn duration(&self) -> f64 {
        match (self.times.first(), self.times.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }
    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }
    pub fn is_censored(&self) -> bool {
        self.censored
    }
}

///
/// Sorted set of the distinct gaps in a dataset.
///
/// Gaps closer than a relative tolerance are merged into one entry
/// (represented by their mean) so that a transition kernel is computed once
/// per entry, instead of relying on exact floating point equality.
///
#[derive(Debug, Clone)]
pub struct GapSet {
    /// representative gap of each group
    gaps: Vec<f64>,
    /// `(min, max)` of the raw gaps merged into each group
    bounds: Vec<(f64, f64)>,
}

impl GapSet {
    ///
    /// Extract the gap set of the sequences, and the gap index of every step
    /// of every sequence (`indices[s][i]` is the entry of `t[i+1]-t[i]` of
    /// sequence `s`).
    ///
    pub fn from_sequences(sequences: &[Sequence], rel_tol: f64) -> (GapSet, Vec<Vec<usize>>) {
        let mut all: Vec<f64> = sequences.iter().flat_map(|s| s.gaps()).collect();
        all.sort_by(|a, b| a.total_cmp(b));

        let mut gaps = Vec::new();
        let mut bounds: Vec<(f64, f64)> = Vec::new();
        let mut group: Vec<f64> = Vec::new();
        for g in all {
            let start = group.first().copied();
            match start {
                Some(start) if g - start > rel_tol * g.abs() => {
                    bounds.push((start, *group.last().unwrap_or(&start)));
                    gaps.push(group.iter().sum::<f64>() / group.len() as f64);
                    group.clear();
                }
                _ => {}
            }
            group.push(g);
        }
        if let Some(&start) = group.first() {
            bounds.push((start, *group.last().unwrap_or(&start)));
            gaps.push(group.iter().sum::<f64>() / group.len() as f64);
        }
        let set = GapSet { gaps, bounds };

        let indices = sequences
            .iter()
            .map(|s| {
                s.gaps()
                    .map(|g| {
                        set.index_of(g)
                            .expect("every gap of the input lies within the bounds of its entry")
                    })
                    .collect()
            })
            .collect();
        (set, indices)
    }
    ///
    /// Entry index that contains the raw gap `g`, if any.
    ///
    pub fn index_of(&self, g: f64) -> Option<usize> {
        let i = self.bounds.partition_point(|&(_, hi)| hi < g);
        if i < self.bounds.len() && self.bounds[i].0 <= g {
            Some(i)
        } else {
            None
        }
    }
    pub fn len(&self) -> usize {
        self.gaps.len()
    }
    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }
    pub fn gap(&self, i: usize) -> f64 {
        self.gaps[i]
    }
    pub fn gaps(&self) -> &[f64] {
        &self.gaps
    }
}

//
// tests
//
