//! Math primitives for the edmd event-driven molecular dynamics engine.
//!
//! Provides the `Vec3`/`Mat3` aliases used throughout the workspace, the
//! Rodrigues rotation used by rotating-body intersection tests, and the
//! boundary-condition wrap applied to pair separations.

pub mod boundary;
pub mod histogram;

pub use boundary::BoundaryCondition;
pub use histogram::Histogram;

/// 3D vector alias.
pub type Vec3 = nalgebra::Vector3<f64>;
/// 3x3 matrix alias.
pub type Mat3 = nalgebra::Matrix3<f64>;

/// Cross-product matrix: [v]x such that [v]x w = v x w.
#[inline]
pub fn skew(v: &Vec3) -> Mat3 {
    Mat3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Rotation matrix for a rotation of angle |w| about the axis w/|w|.
///
/// Returns the identity for |w| below 1e-12, where the axis is undefined.
pub fn rodrigues(w: &Vec3) -> Mat3 {
    let theta = w.norm();
    if theta < 1e-12 {
        return Mat3::identity();
    }
    let k = skew(&(w / theta));
    Mat3::identity() + k * theta.sin() + k * k * (1.0 - theta.cos())
}

/// Rotation by `angle` radians about the z axis.
pub fn rotation_z(angle: f64) -> Mat3 {
    let (s, c) = angle.sin_cos();
    Mat3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}
