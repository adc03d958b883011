//! One-call IMU-to-camera calibration pipeline.
//!
//! Wraps the initializer and joint estimator behind serde-friendly input,
//! config, and report types so the whole calibration can be driven from
//! JSON artifacts.

pub mod run;
pub mod types;

pub use run::run_imu_camera_calibration;
pub use types::{
    CalibrationConfig, CalibrationInput, CalibrationReport, MeasurementCounts,
    OptimizeSummaryReport, RollingShutterConfig, TerminationKind,
};
