//!
//! Prediction of the state and the observation at a future time
//!
use super::forward::Forward;
use crate::error::{CtHmmError, Result};
use crate::model::{transition_kernel, ModelState};
use ndarray::Array1;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// `P(state at time | x)`
    pub state_probs: Array1<f64>,
    /// expected value of each marker
    pub expected: Vec<f64>,
}

///
/// Predict at `time` from the forward result of a sequence whose last
/// observation is at `last_time`.
///
/// ```text
/// state_probs = alpha_last exp(Q (time - last_time))
/// ```
///
pub fn predict(model: &ModelState, forward: &Forward, last_time: f64, time: f64) -> Result<Prediction> {
    let dt = time - last_time;
    if !(dt >= 0.0) || !time.is_finite() {
        return Err(CtHmmError::InvalidSequence(format!(
            "prediction time {} is before the last observation at {}",
            time, last_time
        )));
    }
    let alpha = forward.last();
    let state_probs = if dt == 0.0 {
        alpha.to_owned()
    } else {
        alpha.dot(&transition_kernel(model.q(), dt)?)
    };
    let expected = model.emission.expected_value(state_probs.view());
    Ok(Prediction {
        state_probs,
        expected,
    })
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::Posterior;
    use crate::mocks::{mock_two_state, mock_two_state_sequence};
    use crate::model::KernelCache;
    use crate::sequence::{GapSet, GAP_REL_TOL};
    use approx::assert_abs_diff_eq;

    #[test]
    fn predict_from_last_observation() {
        let model = mock_two_state();
        let seq = mock_two_state_sequence();
        let (gaps, indices) = GapSet::from_sequences(&[seq.clone()], GAP_REL_TOL);
        let kernels = KernelCache::build(model.q(), &gaps).unwrap();
        let post = Posterior::new(&model, &kernels, &seq, &indices[0]).unwrap();
        let last = seq.time(seq.len() - 1);

        // at the last observation: the filtered distribution itself
        let now = predict(&model, post.forward(), last, last).unwrap();
        assert_eq!(now.state_probs, post.forward().last().to_owned());

        // far future: stationary distribution of the symmetric chain
        let far = predict(&model, post.forward(), last, last + 100.0).unwrap();
        assert_abs_diff_eq!(far.state_probs[0], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(far.expected[0], 0.5, epsilon = 1e-9);

        let soon = predict(&model, post.forward(), last, last + 0.1).unwrap();
        assert_abs_diff_eq!(soon.state_probs.sum(), 1.0, epsilon = 1e-12);

        assert!(matches!(
            predict(&model, post.forward(), last, last - 1.0),
            Err(CtHmmError::InvalidSequence(_))
        ));
    }
}
