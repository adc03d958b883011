//! The calibration state refined by the joint optimization.

use crate::{Iso3, Real, Vec3};
use serde::{Deserialize, Serialize};

/// All non-knot parameters of the joint problem.
///
/// The spline knots live in the trajectory; this struct carries the scalar
/// and low-dimensional blocks. Gravity magnitude is unconstrained and its
/// norm is a useful convergence diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationState {
    /// Rigid transform mapping camera-frame points into the IMU frame.
    pub imu_from_cam: Iso3,
    /// Camera-to-IMU clock offset in seconds (`t_imu + offset = t_cam`).
    pub time_offset_s: Real,
    /// Gyroscope bias in rad/s.
    pub gyro_bias: Vec3,
    /// Accelerometer bias in m/s^2.
    pub accel_bias: Vec3,
    /// Gravity vector in the world frame, m/s^2.
    pub gravity: Vec3,
}

impl CalibrationState {
    /// World pose of the IMU implied by a camera pose and the extrinsics.
    pub fn world_from_imu(&self, world_from_cam: &Iso3) -> Iso3 {
        world_from_cam * self.imu_from_cam.inverse()
    }
}
