//! Deterministic synthetic rig data for tests.
//!
//! Builds a ground-truth spline trajectory, a landmark wall in front of the
//! camera, projected corner tracks, and IMU telemetry consistent with the
//! trajectory, extrinsics, biases, gravity, and clock offset. Because the
//! ground truth is itself a spline with the same order and knot spacing, a
//! noiseless fit can reach machine-precision residuals.

use crate::{
    quat_exp, s_to_ns, CalibrationState, CornerObservation, ImuSample, Iso3, LandmarkTable,
    PinholeIntrinsics, Pt3, Real, TelemetryStream, TimeNs, TimestampedPose, TrackObservation,
    Trajectory, Vec3,
};
use anyhow::{Context, Result};
use nalgebra::{Translation3, UnitQuaternion};

/// Scenario parameters for synthetic data generation.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub start_ns: TimeNs,
    pub end_ns: TimeNs,
    pub dt_so3_ns: i64,
    pub dt_r3_ns: i64,
    pub order: usize,
    /// Camera frame period in nanoseconds.
    pub cam_period_ns: i64,
    /// IMU sample period in nanoseconds (shared by accel and gyro).
    pub imu_period_ns: i64,
    pub intrinsics: PinholeIntrinsics,
    pub imu_from_cam: Iso3,
    /// Camera-to-IMU clock offset in seconds; IMU timestamps are recorded
    /// on the IMU clock (`t_imu = t_cam - offset`).
    pub time_offset_s: Real,
    pub gravity: Vec3,
    pub gyro_bias: Vec3,
    pub accel_bias: Vec3,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            start_ns: 0,
            end_ns: 5_000_000_000,
            dt_so3_ns: 100_000_000,
            dt_r3_ns: 100_000_000,
            order: 5,
            cam_period_ns: 50_000_000,
            imu_period_ns: 5_000_000,
            intrinsics: PinholeIntrinsics::new(500.0, 500.0, 320.0, 240.0),
            imu_from_cam: Iso3::from_parts(
                Translation3::new(0.015, -0.005, 0.002),
                UnitQuaternion::from_euler_angles(0.02, -0.015, 0.01),
            ),
            time_offset_s: 0.005,
            gravity: Vec3::new(0.0, 0.0, -9.81),
            gyro_bias: Vec3::new(0.002, -0.001, 0.0015),
            accel_bias: Vec3::new(0.01, -0.02, 0.015),
        }
    }
}

/// A fully generated scenario plus its ground truth.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub config: SyntheticConfig,
    pub trajectory: Trajectory,
    pub landmarks: LandmarkTable,
    pub poses: Vec<TimestampedPose>,
    pub corners: Vec<CornerObservation>,
    pub telemetry: TelemetryStream,
    pub ground_truth: CalibrationState,
}

impl SyntheticDataset {
    pub fn generate(config: SyntheticConfig) -> Result<Self> {
        let trajectory = ground_truth_trajectory(&config)?;
        let landmarks = landmark_wall()?;

        let mut poses = Vec::new();
        let mut corners = Vec::new();
        let mut t = config.start_ns;
        while t <= config.end_ns {
            let world_from_imu = trajectory.pose(t)?;
            let world_from_cam = world_from_imu * config.imu_from_cam;

            let mut tracks = Vec::with_capacity(landmarks.len());
            for (track_id, landmark) in landmarks.points.iter().enumerate() {
                let in_cam = world_from_cam.inverse_transform_point(landmark);
                if let Some(uv) = config.intrinsics.project_point(&in_cam) {
                    tracks.push(TrackObservation { track_id, uv });
                }
            }
            poses.push(TimestampedPose {
                t_ns: t,
                cam_id: 0,
                world_from_cam,
            });
            corners.push(CornerObservation {
                t_ns: t,
                cam_id: 0,
                corners: tracks,
            });
            t += config.cam_period_ns;
        }

        let offset_ns = s_to_ns(config.time_offset_s);
        let mut accel = Vec::new();
        let mut gyro = Vec::new();
        let mut t = config.start_ns;
        while t <= config.end_ns {
            let rot = trajectory.so3().evaluate(t)?;
            let omega_body = trajectory.angular_velocity_body(t)?;
            let accel_world = trajectory.linear_acceleration_world(t)?;

            // Sensor readings carry IMU-clock timestamps.
            let t_imu = t - offset_ns;
            gyro.push(ImuSample {
                t_ns: t_imu,
                value: omega_body + config.gyro_bias,
            });
            accel.push(ImuSample {
                t_ns: t_imu,
                value: rot.inverse_transform_vector(&(accel_world + config.gravity))
                    + config.accel_bias,
            });
            t += config.imu_period_ns;
        }

        let ground_truth = CalibrationState {
            imu_from_cam: config.imu_from_cam,
            time_offset_s: config.time_offset_s,
            gyro_bias: config.gyro_bias,
            accel_bias: config.accel_bias,
            gravity: config.gravity,
        };

        Ok(Self {
            telemetry: TelemetryStream::new(accel, gyro).context("synthetic telemetry")?,
            config,
            trajectory,
            landmarks,
            poses,
            corners,
            ground_truth,
        })
    }
}

/// Smooth wobble trajectory defined directly by its knots.
fn ground_truth_trajectory(config: &SyntheticConfig) -> Result<Trajectory> {
    let mut trajectory = Trajectory::initialize(
        config.start_ns,
        config.end_ns,
        config.dt_so3_ns,
        config.dt_r3_ns,
        config.order,
    )?;

    for i in 0..trajectory.so3().num_knots() {
        let x = i as Real;
        let axis = Vec3::new(
            0.10 * (0.40 * x).sin(),
            0.08 * (0.30 * x).cos(),
            0.05 * (0.20 * x + 1.0).sin(),
        );
        trajectory.so3_mut().set_knot(i, quat_exp(&axis));
    }
    for i in 0..trajectory.r3().num_knots() {
        let x = i as Real;
        trajectory.r3_mut().set_knot(
            i,
            Vec3::new(
                0.25 * (0.25 * x).sin(),
                0.20 * (0.20 * x).cos() - 0.20,
                0.10 * (0.15 * x).sin(),
            ),
        );
    }
    Ok(trajectory)
}

/// 5x4 landmark wall two meters in front of the rig.
fn landmark_wall() -> Result<LandmarkTable> {
    let mut points = Vec::new();
    for j in 0..4 {
        for i in 0..5 {
            points.push(Pt3::new(
                -0.8 + 0.4 * i as Real,
                -0.6 + 0.4 * j as Real,
                2.0,
            ));
        }
    }
    LandmarkTable::new(points)
}
