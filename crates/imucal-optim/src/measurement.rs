//! Measurement records consumed by the joint estimator.

use imucal_core::{TimeNs, Vec2, Vec3};

/// One residual-producing observation.
///
/// Registration order does not matter; the assembled problem is identical
/// for any permutation of the same measurement set.
#[derive(Debug, Clone)]
pub enum Measurement {
    /// A detected corner at a camera-clock timestamp.
    Reprojection {
        t_ns: TimeNs,
        track_id: usize,
        uv: Vec2,
        /// Inverse pixel variance.
        weight: f64,
    },
    /// A gyroscope reading at an IMU-clock timestamp.
    Gyroscope {
        t_ns: TimeNs,
        value: Vec3,
        /// Inverse variance (`1 / var_so3`).
        weight: f64,
    },
    /// An accelerometer reading at an IMU-clock timestamp.
    Accelerometer {
        t_ns: TimeNs,
        value: Vec3,
        /// Inverse variance (`1 / var_r3`).
        weight: f64,
    },
}
