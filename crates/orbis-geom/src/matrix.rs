//! Checked matrix helpers over `glam::DMat4`.

use glam::{DMat4, DVec3};

use crate::error::GeomError;

/// Inverse of `m`, or `NumericDegenerate` when `m` is singular or not finite.
pub fn try_inverse(m: &DMat4) -> Result<DMat4, GeomError> {
    let mut out = DMat4::IDENTITY;
    invert_into(m, &mut out)?;
    Ok(out)
}

/// Write the inverse of `m` into `out`. `out` is untouched on error.
pub fn invert_into(m: &DMat4, out: &mut DMat4) -> Result<(), GeomError> {
    if !m.is_finite() {
        return Err(GeomError::NumericDegenerate(
            "matrix has non-finite components".to_string(),
        ));
    }
    let det = m.determinant();
    if det.abs() < f64::EPSILON * f64::EPSILON || !det.is_finite() {
        return Err(GeomError::NumericDegenerate(format!(
            "matrix is singular (determinant {det})"
        )));
    }
    *out = m.inverse();
    Ok(())
}

/// Write `a * b` into `out`.
pub fn multiply_into(a: &DMat4, b: &DMat4, out: &mut DMat4) {
    *out = *a * *b;
}

/// Translation component of an affine matrix.
pub fn translation(m: &DMat4) -> DVec3 {
    m.w_axis.truncate()
}
