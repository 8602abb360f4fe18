//!
//! Composite state space and structural transition masks
//!
//! A composite state is a tuple of discrete levels, one per marker. States
//! are numbered in mixed radix with the first marker as the most significant
//! digit:
//!
//! ```text
//! radices = [2, 3]
//! index:   0      1      2      3      4      5
//! levels: (0,0)  (0,1)  (0,2)  (1,0)  (1,1)  (1,2)
//! ```
//!
use crate::error::{CtHmmError, Result};
use itertools::Itertools;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

///
/// Named template of allowed transitions
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    /// every pair of distinct states
    FullyConnected,
    /// every marker keeps its level or goes up by exactly one
    ForwardStepwise,
    /// no marker goes down
    ForwardAny,
}

impl Topology {
    ///
    /// Is the transition `from -> to` allowed by this topology?
    /// `from == to` is never a transition.
    ///
    pub fn allows(&self, from: &[usize], to: &[usize]) -> bool {
        if from == to {
            return false;
        }
        match self {
            Topology::FullyConnected => true,
            Topology::ForwardStepwise => from.iter().zip(to).all(|(&a, &b)| b == a || b == a + 1),
            Topology::ForwardAny => from.iter().zip(to).all(|(&a, &b)| b >= a),
        }
    }
}

impl FromStr for Topology {
    type Err = CtHmmError;
    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace(|c: char| c == '_' || c == '-', " ");
        match key.as_str() {
            "fully connected" | "fc" => Ok(Topology::FullyConnected),
            "forward stepwise" | "forward step" => Ok(Topology::ForwardStepwise),
            "forward any" => Ok(Topology::ForwardAny),
            _ => Err(CtHmmError::StructuralConfig(format!(
                "unknown topology `{}`; must be `fully connected`, `forward stepwise` or `forward any`",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Topology::FullyConnected => "fully connected",
            Topology::ForwardStepwise => "forward stepwise",
            Topology::ForwardAny => "forward any",
        };
        write!(f, "{}", name)
    }
}

///
/// Mixed-radix mapping between state indices and per-marker levels,
/// computed once.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSpace {
    /// number of levels of each marker
    radices: Vec<usize>,
    /// `levels[s]` is the tuple of state `s`
    levels: Vec<Vec<usize>>,
}

impl StateSpace {
    pub fn new(radices: Vec<usize>) -> Result<StateSpace> {
        if radices.is_empty() {
            return Err(CtHmmError::StructuralConfig(
                "at least one marker is required".to_string(),
            ));
        }
        if let Some(m) = radices.iter().position(|&r| r == 0) {
            return Err(CtHmmError::StructuralConfig(format!(
                "marker {} has no levels",
                m
            )));
        }
        // multi_cartesian_product iterates with the last marker fastest
        let levels: Vec<Vec<usize>> = radices
            .iter()
            .map(|&r| 0..r)
            .multi_cartesian_product()
            .collect();
        Ok(StateSpace { radices, levels })
    }
    /// number of composite states `n`
    pub fn n_states(&self) -> usize {
        self.levels.len()
    }
    pub fn n_markers(&self) -> usize {
        self.radices.len()
    }
    pub fn radices(&self) -> &[usize] {
        &self.radices
    }
    ///
    /// levels of each marker in state `s`
    ///
    pub fn levels(&self, s: usize) -> &[usize] {
        &self.levels[s]
    }
    ///
    /// state index of a level tuple
    ///
    pub fn index(&self, levels: &[usize]) -> Option<usize> {
        if levels.len() != self.radices.len() {
            return None;
        }
        levels
            .iter()
            .zip(self.radices.iter())
            .try_fold(0, |acc, (&l, &r)| if l < r { Some(acc * r + l) } else { None })
    }
    ///
    /// `mask[i, j]` is true iff the transition `i -> j` is allowed
    ///
    pub fn mask(&self, topology: Topology) -> Array2<bool> {
        let n = self.n_states();
        Array2::from_shape_fn((n, n), |(i, j)| {
            topology.allows(self.levels(i), self.levels(j))
        })
    }
}

//
// tests
//
