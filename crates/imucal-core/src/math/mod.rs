//! Mathematical type aliases and time utilities.

use nalgebra::{Isometry3, Matrix3, Point2, Point3, Vector2, Vector3};

pub mod lie;

pub use lie::{quat_exp, quat_log};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;

/// Timestamp in integer nanoseconds.
pub type TimeNs = i64;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: f64 = 1e9;

/// Convert a nanosecond timestamp to seconds.
#[inline]
pub fn ns_to_s(t_ns: TimeNs) -> Real {
    t_ns as Real / NANOS_PER_SEC
}

/// Convert seconds to a nanosecond timestamp (rounded to nearest).
#[inline]
pub fn s_to_ns(t_s: Real) -> TimeNs {
    (t_s * NANOS_PER_SEC).round() as TimeNs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_conversion_round_trip() {
        assert_eq!(s_to_ns(ns_to_s(1_234_567_891)), 1_234_567_891);
        assert_eq!(s_to_ns(0.1), 100_000_000);
        assert_eq!(s_to_ns(-0.005), -5_000_000);
    }
}
