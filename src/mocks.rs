//!
//! Mock models and sequences for testing
//!
use crate::model::{ModelState, ObservationModel, RateMatrix, StateSpace, Topology};
use crate::sequence::Sequence;
use ndarray::{arr1, arr2, Array1};

///
/// Symmetric two-state chain
///
/// ```text
/// Q = [[-1, 1], [1, -1]]   pi0 = [0.5, 0.5]
/// state 0 ~ N(0, 0.5^2)    state 1 ~ N(1, 0.5^2)
/// ```
///
pub fn mock_two_state() -> ModelState {
    let emission = ObservationModel::new(vec![vec![0.0, 1.0]], vec![vec![0.5, 0.5]]).unwrap();
    let mask = emission.space().mask(Topology::FullyConnected);
    let rate = RateMatrix::new(arr2(&[[-1.0, 1.0], [1.0, -1.0]]), mask).unwrap();
    ModelState::new(rate, arr1(&[0.5, 0.5]), emission).unwrap()
}

///
/// observations `0.1, 0.9, 0.2` at times `0, 1, 2`
///
pub fn mock_two_state_sequence() -> Sequence {
    Sequence::univariate(vec![0.0, 1.0, 2.0], vec![0.1, 0.9, 0.2]).unwrap()
}

///
/// Three-state chain whose eigenvalues are `0, -3, -3`
///
pub fn mock_three_state() -> ModelState {
    let emission =
        ObservationModel::new(vec![vec![0.0, 1.0, 2.0]], vec![vec![0.5, 0.5, 0.5]]).unwrap();
    let mask = emission.space().mask(Topology::FullyConnected);
    let q = arr2(&[[-2.0, 1.0, 1.0], [1.0, -2.0, 1.0], [1.0, 1.0, -2.0]]);
    let rate = RateMatrix::new(q, mask).unwrap();
    ModelState::new(rate, Array1::from_elem(3, 1.0 / 3.0), emission).unwrap()
}

///
/// Two binary markers under the forward stepwise topology
///
/// ```text
/// (0,0) -> (0,1), (1,0), (1,1)
/// (0,1) -> (1,1)
/// (1,0) -> (1,1)
/// (1,1) is absorbing
/// ```
///
pub fn mock_stepwise() -> ModelState {
    let space = StateSpace::new(vec![2, 2]).unwrap();
    let mask = space.mask(Topology::ForwardStepwise);
    let q = arr2(&[
        [-0.6, 0.3, 0.2, 0.1],
        [0.0, -0.4, 0.0, 0.4],
        [0.0, 0.0, -0.5, 0.5],
        [0.0, 0.0, 0.0, 0.0],
    ]);
    let rate = RateMatrix::new(q, mask).unwrap();
    let emission = ObservationModel::new(
        vec![vec![0.0, 1.0], vec![0.0, 2.0]],
        vec![vec![0.3, 0.3], vec![0.5, 0.5]],
    )
    .unwrap();
    ModelState::new(rate, arr1(&[0.7, 0.1, 0.1, 0.1]), emission).unwrap()
}
