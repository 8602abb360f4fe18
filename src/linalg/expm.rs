//!
//! Matrix exponential
//!
//! Padé approximant of degree 13 with scaling and squaring
//! (Higham, "The scaling and squaring method for the matrix exponential
//! revisited", 2005).
//!
//! ```text
//! exp(A) = (exp(A / 2^s))^(2^s)
//! exp(B) ~ (V - U)^{-1} (V + U)     (|B|_1 <= theta_13)
//! ```
//!
use crate::error::{CtHmmError, Result};
use ndarray::Array2;
use ndarray_linalg::{Inverse, OperationNorm};

/// coefficients `b_0..b_13` of the [13/13] Padé approximant
const PADE13: [f64; 14] = [
    64764752532480000.0,
    32382376266240000.0,
    7771770303897600.0,
    1187353796428800.0,
    129060195264000.0,
    10559470521600.0,
    670442572800.0,
    33522128640.0,
    1323241920.0,
    40840800.0,
    960960.0,
    16380.0,
    182.0,
    1.0,
];

/// largest 1-norm for which the [13/13] approximant is accurate to double precision
const THETA13: f64 = 5.371920351148152;

///
/// Compute `exp(a)` of a square real matrix.
///
pub fn expm(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(CtHmmError::DimensionMismatch {
            what: "expm input columns",
            expected: n,
            actual: a.ncols(),
        });
    }
    if n == 0 {
        return Ok(Array2::zeros((0, 0)));
    }
    if !super::all_finite(a) {
        return Err(CtHmmError::NumericalInstability(
            "non-finite entry in the argument of expm".to_string(),
        ));
    }

    let norm = a
        .opnorm_one()
        .map_err(|e| CtHmmError::NumericalInstability(format!("1-norm in expm: {}", e)))?;
    let s = if norm > THETA13 {
        (norm / THETA13).log2().ceil() as i32
    } else {
        0
    };
    let scale = 2f64.powi(s);
    let a = a.mapv(|x| x / scale);

    let b = &PADE13;
    let ident: Array2<f64> = Array2::eye(n);
    let a2 = a.dot(&a);
    let a4 = a2.dot(&a2);
    let a6 = a4.dot(&a2);

    // odd part
    let u_inner = &a6 * b[13] + &a4 * b[11] + &a2 * b[9];
    let u_outer = a6.dot(&u_inner) + &a6 * b[7] + &a4 * b[5] + &a2 * b[3] + &ident * b[1];
    let u = a.dot(&u_outer);
    // even part
    let v_inner = &a6 * b[12] + &a4 * b[10] + &a2 * b[8];
    let v = a6.dot(&v_inner) + &a6 * b[6] + &a4 * b[4] + &a2 * b[2] + &ident * b[0];

    let numer = &v + &u;
    let denom = &v - &u;
    let denom_inv = denom
        .inv()
        .map_err(|e| CtHmmError::SingularMatrix(format!("Padé denominator in expm: {}", e)))?;
    let mut r = denom_inv.dot(&numer);

    for _ in 0..s {
        r = r.dot(&r);
    }

    if !super::all_finite(&r) {
        return Err(CtHmmError::NumericalInstability(format!(
            "expm overflowed (1-norm of argument = {})",
            norm
        )));
    }
    Ok(r)
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, Array2};

    fn assert_matrix_eq(a: &Array2<f64>, b: &Array2<f64>, epsilon: f64) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = epsilon);
        }
    }

    #[test]
    fn expm_of_zero_is_identity() {
        let z: Array2<f64> = Array2::zeros((3, 3));
        assert_matrix_eq(&expm(&z).unwrap(), &Array2::eye(3), 1e-15);
    }
    #[test]
    fn expm_of_diagonal() {
        let a = arr2(&[[1.0, 0.0], [0.0, -2.0]]);
        let e = expm(&a).unwrap();
        assert_matrix_eq(
            &e,
            &arr2(&[[1f64.exp(), 0.0], [0.0, (-2f64).exp()]]),
            1e-13,
        );
    }
    #[test]
    fn expm_of_two_state_generator() {
        // Q = [[-a, a], [b, -b]]
        // exp(Qt) = 1/(a+b) [[b + a e, a - a e], [b - b e, a + b e]]  (e = exp(-(a+b)t))
        let (a, b, t): (f64, f64, f64) = (0.7, 0.2, 3.0);
        let q = arr2(&[[-a, a], [b, -b]]);
        let e = (-(a + b) * t).exp();
        let expected = arr2(&[
            [(b + a * e) / (a + b), (a - a * e) / (a + b)],
            [(b - b * e) / (a + b), (a + b * e) / (a + b)],
        ]);
        assert_matrix_eq(&expm(&(q * t)).unwrap(), &expected, 1e-13);
    }
    #[test]
    fn expm_of_nilpotent() {
        // exp([[0, 1], [0, 0]]) = [[1, 1], [0, 1]]
        let a = arr2(&[[0.0, 1.0], [0.0, 0.0]]);
        assert_matrix_eq(&expm(&a).unwrap(), &arr2(&[[1.0, 1.0], [0.0, 1.0]]), 1e-14);
    }
    #[test]
    fn expm_large_norm_uses_squaring() {
        // rows of exp(Qt) sum to one even when |Qt| >> theta_13
        let q = arr2(&[[-3.0, 2.0, 1.0], [0.5, -1.0, 0.5], [4.0, 4.0, -8.0]]);
        let e = expm(&(q * 50.0)).unwrap();
        for row in e.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-10);
        }
    }
    #[test]
    fn expm_rejects_nan() {
        let a = arr2(&[[f64::NAN, 0.0], [0.0, 0.0]]);
        assert!(matches!(
            expm(&a),
            Err(CtHmmError::NumericalInstability(_))
        ));
    }
}
