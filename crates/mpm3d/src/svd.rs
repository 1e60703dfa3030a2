//! 3x3 singular value decomposition.
//!
//! `A = U * diag(S) * V^T` with U, V orthogonal and S non-negative, sorted
//! largest first. The decomposition runs in f64:
//!
//! 1. Cyclic Jacobi on the symmetric matrix `A^T A` gives V and the squared
//!    singular values. Sweeps are capped at [`MAX_JACOBI_SWEEPS`].
//! 2. The columns of `A V` are `sigma_i * u_i`. A Gram-Schmidt pass plus a cross
//!    product turns them into an orthonormal U.
//!
//! Rank-deficient input never divides by a vanishing column: any singular
//! value below `SINGULAR_EPSILON * sigma_max` gets an arbitrary orthonormal
//! completion for its U column. The result is deterministic for a given input.

use glam::{DMat3, DVec3, Mat3, Vec3};

/// Upper bound on Jacobi sweeps. 3x3 input converges in well under ten.
pub const MAX_JACOBI_SWEEPS: usize = 24;

/// Jacobi stops once the squared off-diagonal norm drops below this fraction
/// of the squared diagonal norm.
const JACOBI_TOLERANCE: f64 = 1e-28;

/// Singular values below this fraction of the largest are treated as zero.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Result of [`svd3`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Svd3 {
    pub u: Mat3,
    /// Singular values, largest first.
    pub s: Vec3,
    pub v: Mat3,
}

impl Svd3 {
    /// `U * diag(S) * V^T`.
    pub fn reconstruct(&self) -> Mat3 {
        self.u * Mat3::from_diagonal(self.s) * self.v.transpose()
    }

    /// Orthogonal polar factor `U * V^T`.
    pub fn rotation(&self) -> Mat3 {
        self.u * self.v.transpose()
    }
}

/// Decompose a 3x3 matrix.
pub fn svd3(a: Mat3) -> Svd3 {
    let a = a.as_dmat3();
    let (_, mut v) = symmetric_eigen(a.transpose() * a);

    // Keep V a proper rotation; the sign lands on U / S instead.
    if v.determinant() < 0.0 {
        v.z_axis = -v.z_axis;
    }

    let (u, s) = orthonormalize_columns(a * v);
    Svd3 {
        u: u.as_mat3(),
        s: s.as_vec3(),
        v: v.as_mat3(),
    }
}

/// Rotation part of the polar decomposition `A = R * P`.
///
/// `R` is always proper. For inverted `A` the reflection is moved into `P`
/// along the smallest singular direction.
pub fn polar_rotation(a: Mat3) -> Mat3 {
    let mut svd = svd3(a);
    if svd.u.determinant() < 0.0 {
        svd.u.z_axis = -svd.u.z_axis;
    }
    svd.rotation()
}

/// Eigen-decomposition of a symmetric matrix. Returns the eigenvalues in
/// descending order and the matching unit eigenvectors as columns.
fn symmetric_eigen(m: DMat3) -> (DVec3, DMat3) {
    let mut a = m;
    let mut v = DMat3::IDENTITY;

    for _ in 0..MAX_JACOBI_SWEEPS {
        let off = a.col(1)[0].powi(2) + a.col(2)[0].powi(2) + a.col(2)[1].powi(2);
        let diag = a.col(0)[0].powi(2) + a.col(1)[1].powi(2) + a.col(2)[2].powi(2);
        if off <= JACOBI_TOLERANCE * diag {
            break;
        }
        for (p, q) in [(0, 1), (0, 2), (1, 2)] {
            if let Some(rotation) = jacobi_rotation(&a, p, q) {
                a = rotation.transpose() * a * rotation;
                v = v * rotation;
            }
        }
    }

    let mut pairs = [
        (a.col(0)[0], v.col(0)),
        (a.col(1)[1], v.col(1)),
        (a.col(2)[2], v.col(2)),
    ];
    pairs.sort_by(|lhs, rhs| rhs.0.total_cmp(&lhs.0));

    (
        DVec3::new(pairs[0].0, pairs[1].0, pairs[2].0),
        DMat3::from_cols(pairs[0].1, pairs[1].1, pairs[2].1),
    )
}

/// Plane rotation that zeroes the (p, q) entry of a symmetric matrix.
fn jacobi_rotation(a: &DMat3, p: usize, q: usize) -> Option<DMat3> {
    let apq = a.col(q)[p];
    if apq == 0.0 {
        return None;
    }
    let theta = (a.col(q)[q] - a.col(p)[p]) / (2.0 * apq);
    let t = if theta.abs() > 1e150 {
        0.5 / theta
    } else {
        let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
        sign / (theta.abs() + (theta * theta + 1.0).sqrt())
    };
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    // Column-major: cols[col][row]
    let mut cols = DMat3::IDENTITY.to_cols_array_2d();
    cols[p][p] = c;
    cols[q][q] = c;
    cols[q][p] = s;
    cols[p][q] = -s;
    Some(DMat3::from_cols_array_2d(&cols))
}

/// QR of a matrix whose columns are already (nearly) orthogonal and sorted by
/// length. Returns the orthogonal factor and the non-negative diagonal.
fn orthonormalize_columns(b: DMat3) -> (DMat3, DVec3) {
    let s0 = b.x_axis.length();
    let tolerance = SINGULAR_EPSILON * s0;

    let u0 = if s0 > 0.0 { b.x_axis / s0 } else { DVec3::X };

    let r1 = b.y_axis - u0 * u0.dot(b.y_axis);
    let s1 = r1.length();
    let (u1, s1) = if s1 > tolerance && s1 > 0.0 {
        (r1 / s1, s1)
    } else {
        (any_perpendicular(u0), 0.0)
    };

    let mut u2 = u0.cross(u1);
    let mut s2 = u2.dot(b.z_axis);
    if s2 < 0.0 {
        u2 = -u2;
        s2 = -s2;
    }
    if s2 <= tolerance {
        s2 = 0.0;
    }

    // Equal singular values can come out of the QR an ulp out of order
    let s1 = s1.min(s0);
    let s2 = s2.min(s1);
    (DMat3::from_cols(u0, u1, u2), DVec3::new(s0, s1, s2))
}

/// Some unit vector orthogonal to the unit vector `n`.
fn any_perpendicular(n: DVec3) -> DVec3 {
    let axis = if n.x.abs() <= n.y.abs() && n.x.abs() <= n.z.abs() {
        DVec3::X
    } else if n.y.abs() <= n.z.abs() {
        DVec3::Y
    } else {
        DVec3::Z
    };
    n.cross(axis).normalize()
}
