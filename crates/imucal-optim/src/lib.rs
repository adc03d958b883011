//! Joint continuous-time IMU-to-camera calibration on tiny-solver.
//!
//! The optimization refines spline knots, IMU-from-camera extrinsics, the
//! camera-to-IMU time offset, IMU biases, and gravity against reprojection,
//! gyroscope, and accelerometer residuals. Residual functors are generic
//! over `nalgebra::RealField` so tiny-solver's dual numbers supply the
//! Jacobians.

pub mod diagnostics;
pub mod estimator;
pub mod factors;
pub mod init;
pub mod measurement;
pub mod params;
pub mod problem;

pub use diagnostics::mean_reprojection;
pub use estimator::{
    JointEstimator, OptimizeOptions, OptimizeSummary, Phase, TerminationReason,
};
pub use init::{initialize, InitConfig, InitError, SeededState, GRAVITY_SEED_TOLERANCE_NS};
pub use measurement::Measurement;
pub use problem::{build_joint_problem, JointSolveOptions, RobustLoss};
