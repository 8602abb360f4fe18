//!
//! Probability and density values kept in log space
//!
//! Used by the backward recursion, where the sum over next states is taken
//! with log-sum-exp so that the densities of distant observations do not
//! underflow.
//!

///
/// Wrapper of f64 that holds `log p` of a non-negative value `p`.
///
/// `p` is usually a probability but densities (`p > 1`) are allowed.
///
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Prob(f64);

///
/// short-hand of `Prob::from_prob`
///
pub fn p(p: f64) -> Prob {
    Prob::from_prob(p)
}

///
/// short-hand of `Prob::from_log_prob`
///
pub fn lp(lp: f64) -> Prob {
    Prob::from_log_prob(lp)
}

impl Prob {
    ///
    /// From a value in linear space.
    ///
    pub fn from_prob(value: f64) -> Prob {
        Prob(value.ln())
    }
    ///
    /// From a value already in log space.
    ///
    pub fn from_log_prob(log_value: f64) -> Prob {
        Prob(log_value)
    }
    ///
    /// Get the value in linear space
    pub fn to_value(self) -> f64 {
        self.0.exp()
    }
    ///
    /// Get the log value
    pub fn to_log_value(self) -> f64 {
        self.0
    }
    ///
    /// `p` is NaN. Only produced from NaN inputs or `log` of negative values.
    ///
    pub fn is_nan(self) -> bool {
        self.0.is_nan()
    }
    ///
    /// prob=0.0
    ///
    pub fn zero() -> Prob {
        Prob(f64::NEG_INFINITY)
    }
}

/// Addition of two values `px + py` in log space
///
/// If `px > py`:
///
/// ```text
/// log(exp(x) + exp(y))
///  = x + log(1 + exp(y-x))
/// ```
impl std::ops::Add for Prob {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        let x = self.0;
        let y = other.0;
        let (x, y) = if x >= y { (x, y) } else { (y, x) };
        if y == f64::NEG_INFINITY {
            // x + 0 = x
            Prob(x)
        } else if x == y {
            // x + x = 2x
            Prob(x + 2f64.ln())
        } else {
            Prob(x + (y - x).exp().ln_1p())
        }
    }
}

/// Multiplication `px * py` in log space
impl std::ops::Mul for Prob {
    type Output = Self;
    fn mul(self, other: Self) -> Self {
        Prob(self.0 + other.0)
    }
}

/// Division `px / py` in log space
impl std::ops::Div for Prob {
    type Output = Self;
    fn div(self, other: Self) -> Self {
        Prob(self.0 - other.0)
    }
}

impl std::iter::Sum for Prob {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Prob::zero(), |a, b| a + b)
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn prob_add_mul() {
        assert_eq!(p(0.0) + p(1.0), p(1.0));
        assert_eq!(p(0.0) * p(1.0), p(0.0));
        assert_abs_diff_eq!((p(0.3) + p(0.3)).0, p(0.6).0, epsilon = 1e-12);
        assert_abs_diff_eq!((p(0.3) * p(0.3)).0, p(0.09).0, epsilon = 1e-12);
        assert_abs_diff_eq!((p(0.5) + p(0.00001)).0, p(0.50001).0, epsilon = 1e-12);
        assert_abs_diff_eq!((p(0.3) / p(0.6)).to_value(), 0.5, epsilon = 1e-12);
    }
    #[test]
    fn prob_sum() {
        let xs: Vec<Prob> = vec![];
        let sum: Prob = xs.into_iter().sum();
        assert_eq!(sum, p(0.0));
        assert_eq!(sum.to_value(), 0.0);

        let xs = vec![p(0.1), p(0.1), p(0.1)];
        let sum: Prob = xs.into_iter().sum();
        assert_relative_eq!(sum.to_value(), 0.3, max_relative = 1e-12);
    }
    #[test]
    fn prob_log_sum_exp_without_underflow() {
        // exp(-1000) underflows in linear space but the sum is still exact
        let xs = vec![lp(-1000.0), lp(-1000.0), lp(-1001.0)];
        let sum: Prob = xs.into_iter().sum();
        let expected = -1000.0 + (2.0 + (-1.0f64).exp()).ln();
        assert_abs_diff_eq!(sum.to_log_value(), expected, epsilon = 1e-10);
    }
    #[test]
    fn prob_densities_above_one() {
        let x = p(2.5) * p(4.0);
        assert_relative_eq!(x.to_value(), 10.0, max_relative = 1e-12);
        let y = p(2.5) + p(4.0);
        assert_relative_eq!(y.to_value(), 6.5, max_relative = 1e-12);
    }
    #[test]
    fn prob_nan_propagates() {
        let nan = lp(f64::NAN);
        assert!((nan + p(0.5)).is_nan());
        assert!((p(0.5) + nan).is_nan());
        assert!(p(-1.0).is_nan());
        assert!(!p(0.0).is_nan());
    }
}
