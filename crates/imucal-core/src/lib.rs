//! Core primitives for continuous-time IMU-to-camera calibration.
//!
//! This crate contains:
//! - linear algebra and time type aliases (`Real`, `Vec3`, `Iso3`, `TimeNs`),
//! - SO(3) exp/log helpers generic over the scalar type,
//! - a locked pinhole camera model,
//! - observation / telemetry / artifact types,
//! - uniform cumulative B-spline trajectories on SO(3) x R^3,
//! - deterministic synthetic rig data for tests.
//!
//! Frame conventions: `world_from_imu = world_from_cam * imu_from_cam^-1`,
//! and `world_from_cam(t) = world_from_imu(t) * imu_from_cam`.

/// Linear algebra and time aliases, Lie-group helpers.
pub mod math;
/// Locked pinhole camera intrinsics.
pub mod camera;
/// Observation, telemetry, artifact, and state types.
pub mod types;
/// Uniform cumulative B-spline trajectory representation.
pub mod spline;
/// Deterministic synthetic datasets for tests.
pub mod synthetic;

pub use camera::*;
pub use math::*;
pub use spline::*;
pub use types::*;
