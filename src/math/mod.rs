//! Mathematical utilities shared by the state-space operators

pub mod matrix;

use nalgebra::{Complex, DMatrix};

use crate::error::{LtiError, LtiResult};

pub use matrix::{csc_from_dense, SysMatrix};

pub type Mat = DMatrix<f64>;
/// Complex dense matrix, used by the frequency-response evaluation
pub type CMat = DMatrix<Complex<f64>>;

/// Lift a real dense matrix into complex arithmetic
pub fn to_complex(m: &Mat) -> CMat {
    m.map(|x| Complex::new(x, 0.0))
}

/// Solve `A X = B` for dense real matrices via LU factorisation
///
/// `context` names the calling operation in the error message.
pub fn lu_solve(a: Mat, b: &Mat, context: &str) -> LtiResult<Mat> {
    a.lu()
        .solve(b)
        .ok_or_else(|| LtiError::SingularMatrix(context.to_string()))
}

/// Solve `A X = B` for dense complex matrices via LU factorisation
pub fn lu_solve_complex(a: CMat, b: &CMat, context: &str) -> LtiResult<CMat> {
    a.lu()
        .solve(b)
        .ok_or_else(|| LtiError::SingularMatrix(context.to_string()))
}

/// Largest absolute entry-wise difference between two complex matrices
pub fn max_abs_diff_complex(a: &CMat, b: &CMat) -> f64 {
    debug_assert_eq!(a.shape(), b.shape());
    let mut err = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        err = err.max((x - y).norm());
    }
    err
}
