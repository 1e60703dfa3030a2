//! 3D cubic B-spline kernel functions for MPM transfers.
//!
//! All functions take distances measured in cells, i.e. `position / H - node`.
//! The kernel support is |x| < 2. The 5x5x5 neighborhood scan around a
//! particle produces per-axis distances strictly inside (-3, 3); the band
//! 2 <= |x| < 3 evaluates to exactly zero. Anything at or beyond 3 means the
//! caller's scan radius and the kernel disagree, which is a programming error.

use glam::Vec3;

/// Half-width of the kernel support, in cells.
pub const KERNEL_SUPPORT: f32 = 2.0;

/// Half-width (in cells) of the cube scanned around a particle's base cell.
pub const NEIGHBORHOOD_RADIUS: i32 = 2;

/// Largest |distance| a 5x5x5 scan can produce (exclusive).
const MAX_SCAN_DISTANCE: f32 = (NEIGHBORHOOD_RADIUS + 1) as f32;

#[inline]
#[track_caller]
fn check_domain(x: f32) {
    assert!(
        x.abs() < MAX_SCAN_DISTANCE,
        "kernel evaluated at {x}, outside the scanned neighborhood"
    );
}

/// 1D cubic B-spline weight N(x).
#[inline]
#[track_caller]
pub fn cubic_bspline_1d(x: f32) -> f32 {
    check_domain(x);
    let ax = x.abs();
    let x2 = x * x;
    if ax < 1.0 {
        0.5 * ax * x2 - x2 + 2.0 / 3.0
    } else if ax < KERNEL_SUPPORT {
        -ax * x2 / 6.0 + x2 - 2.0 * ax + 4.0 / 3.0
    } else {
        0.0
    }
}

/// Derivative dN/dx. Zero at x = 0 (no sign term survives there).
#[inline]
#[track_caller]
pub fn cubic_bspline_1d_derivative(x: f32) -> f32 {
    check_domain(x);
    let ax = x.abs();
    if ax < 1.0 {
        1.5 * x * ax - 2.0 * x
    } else if ax < KERNEL_SUPPORT {
        -0.5 * x * ax + 2.0 * x - 2.0 * x.signum()
    } else {
        0.0
    }
}

/// 3D weight: tensor product of the axis weights.
#[inline]
#[track_caller]
pub fn cubic_bspline_3d(delta: Vec3) -> f32 {
    cubic_bspline_1d(delta.x) * cubic_bspline_1d(delta.y) * cubic_bspline_1d(delta.z)
}

/// Gradient of the 3D weight with respect to world position.
///
/// `delta` is in cells, so the chain rule contributes `1 / cell_size`.
#[inline]
#[track_caller]
pub fn cubic_bspline_3d_gradient(delta: Vec3, cell_size: f32) -> Vec3 {
    let (nx, ny, nz) = (
        cubic_bspline_1d(delta.x),
        cubic_bspline_1d(delta.y),
        cubic_bspline_1d(delta.z),
    );
    let (dx, dy, dz) = (
        cubic_bspline_1d_derivative(delta.x),
        cubic_bspline_1d_derivative(delta.y),
        cubic_bspline_1d_derivative(delta.z),
    );
    Vec3::new(dx * ny * nz, nx * dy * nz, nx * ny * dz) / cell_size
}
