//! Fatal numeric checks.
//!
//! A non-finite stress, velocity or deformation gradient means the constitutive
//! model or the time step has gone unstable. Nothing downstream can repair
//! that, so every check panics with the name of the offending quantity.

use glam::{Mat3, Vec3};

/// Smallest |det| accepted for a deformation gradient.
pub const SINGULAR_DETERMINANT: f32 = 1e-12;

#[inline]
#[track_caller]
pub fn assert_finite(value: f32, what: &str) {
    assert!(value.is_finite(), "{what} is not finite: {value}");
}

#[inline]
#[track_caller]
pub fn assert_finite_vec3(value: Vec3, what: &str) {
    assert!(value.is_finite(), "{what} is not finite: {value}");
}

#[inline]
#[track_caller]
pub fn assert_finite_mat3(value: Mat3, what: &str) {
    assert!(value.is_finite(), "{what} is not finite: {value}");
}

/// Finite and invertible.
#[inline]
#[track_caller]
pub fn assert_non_singular(value: Mat3, what: &str) {
    assert_finite_mat3(value, what);
    let det = value.determinant();
    assert!(
        det.is_finite() && det.abs() > SINGULAR_DETERMINANT,
        "{what} is singular (det = {det}): {value}"
    );
}
