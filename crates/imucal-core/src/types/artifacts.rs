//! Serialized artifacts produced by earlier calibration stages.

use crate::{Real, Vec3};
use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};

/// Spline knot spacings and per-axis measurement variances.
///
/// `var_so3` weights gyroscope residuals, `var_r3` accelerometer residuals;
/// residuals are scaled by `sqrt(1 / var)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplineWeighting {
    pub var_so3: Real,
    pub var_r3: Real,
    pub dt_so3_s: Real,
    pub dt_r3_s: Real,
}

/// Static IMU bias estimates from a standstill recording.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImuBiasInit {
    pub gyro_bias: Vec3,
    pub accel_bias: Vec3,
}

impl Default for ImuBiasInit {
    fn default() -> Self {
        Self {
            gyro_bias: Vec3::zeros(),
            accel_bias: Vec3::zeros(),
        }
    }
}

/// Rough IMU-to-camera alignment from gyro/visual rotation matching.
///
/// Seeds the extrinsic rotation and the camera-to-IMU time offset; both are
/// refined by the joint optimization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoughAlignment {
    pub imu_from_cam_rotation: UnitQuaternion<Real>,
    pub time_offset_s: Real,
}
