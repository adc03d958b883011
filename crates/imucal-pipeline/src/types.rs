//! Serde-faced pipeline types.

use imucal_core::{
    CalibrationState, CornerObservation, ImuBiasInit, LandmarkTable, PinholeIntrinsics,
    RoughAlignment, SplineWeighting, TelemetryStream, TimestampedPose,
};
use imucal_optim::TerminationReason;
use serde::{Deserialize, Serialize};

/// Everything the calibration consumes, typically loaded from JSON
/// artifacts of the preceding pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationInput {
    /// Camera poses from the prior intrinsic calibration, camera clock.
    pub poses: Vec<TimestampedPose>,
    /// Corner tracks per frame, camera clock.
    pub corners: Vec<CornerObservation>,
    /// Locked triangulated landmarks the track ids point into.
    pub landmarks: LandmarkTable,
    /// Locked pinhole intrinsics.
    pub intrinsics: PinholeIntrinsics,
    /// Raw accelerometer/gyroscope streams, IMU clock.
    pub telemetry: TelemetryStream,
    /// Spline spacings and measurement variances.
    pub weighting: SplineWeighting,
    /// Static bias estimates.
    pub bias: ImuBiasInit,
    /// Rough rotation alignment and time offset seed.
    pub alignment: RoughAlignment,
}

/// Per-row readout correction for rolling-shutter sensors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RollingShutterConfig {
    /// Full-frame readout time in seconds.
    pub readout_s: f64,
    /// Sensor height in pixel rows.
    pub image_rows: u32,
}

/// Tunables of the calibration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Truncate the calibration window this many seconds after the first
    /// pose. `None` keeps everything.
    pub max_duration_s: Option<f64>,
    /// B-spline order of both splines.
    pub order: usize,
    /// Keep every n-th IMU sample.
    pub imu_stride: usize,
    /// Refine the camera-to-IMU time offset.
    pub optimize_time_offset: bool,
    /// Per-row corner time correction; `None` treats frames as global
    /// shutter.
    pub rolling_shutter: Option<RollingShutterConfig>,
    /// Cap on outer optimization iterations.
    pub max_iterations: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_duration_s: None,
            order: 5,
            imu_stride: 1,
            optimize_time_offset: true,
            rolling_shutter: None,
            max_iterations: 40,
        }
    }
}

/// How many measurements of each kind entered the problem.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MeasurementCounts {
    pub num_frames: usize,
    pub num_corners: usize,
    pub num_gyro: usize,
    pub num_accel: usize,
}

/// Serializable mirror of the estimator's termination reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationKind {
    Converged,
    MaxIterations,
    NumericalFailure,
}

impl From<TerminationReason> for TerminationKind {
    fn from(reason: TerminationReason) -> Self {
        match reason {
            TerminationReason::Converged => Self::Converged,
            TerminationReason::MaxIterations => Self::MaxIterations,
            TerminationReason::NumericalFailure => Self::NumericalFailure,
        }
    }
}

/// Serializable mirror of the optimization summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeSummaryReport {
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub termination: TerminationKind,
}

/// Final calibration report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub state: CalibrationState,
    /// Gravity magnitude in m/s^2; a plausibility diagnostic.
    pub gravity_norm: f64,
    pub mean_reprojection_px: f64,
    pub counts: MeasurementCounts,
    /// Calibration window length in seconds.
    pub duration_s: f64,
    pub summary: OptimizeSummaryReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = CalibrationConfig::default();
        assert_eq!(config.order, 5);
        assert_eq!(config.imu_stride, 1);
        assert!(config.optimize_time_offset);
        assert!(config.rolling_shutter.is_none());
    }

    #[test]
    fn config_deserializes_with_partial_fields() {
        let config: CalibrationConfig =
            serde_json::from_str(r#"{"max_duration_s": 10.0, "imu_stride": 2}"#).unwrap();
        assert_eq!(config.max_duration_s, Some(10.0));
        assert_eq!(config.imu_stride, 2);
        assert_eq!(config.order, 5);
    }
}
