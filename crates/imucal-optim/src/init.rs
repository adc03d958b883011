//! Initialization of the joint problem: window selection, knot seeding,
//! and gravity seeding.

use imucal_core::{
    s_to_ns, CalibrationState, ImuBiasInit, Iso3, RoughAlignment, SplineError, SplineWeighting,
    TelemetryStream, TimeNs, TimestampedPose, Trajectory, Vec3,
};
use nalgebra::Translation3;
use thiserror::Error;

/// Maximum camera/accelerometer timestamp distance for gravity seeding.
pub const GRAVITY_SEED_TOLERANCE_NS: i64 = 3_000_000;

/// Fatal preconditions of the initializer.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("no camera poses in the calibration window")]
    NoPoses,
    #[error(
        "no accelerometer sample within {GRAVITY_SEED_TOLERANCE_NS} ns of any camera pose; \
         cannot seed gravity"
    )]
    GravitySeedUnavailable,
    #[error(transparent)]
    Spline(#[from] SplineError),
}

/// Inputs of the initializer besides the observations themselves.
#[derive(Debug, Clone)]
pub struct InitConfig {
    pub order: usize,
    pub weighting: SplineWeighting,
    pub bias: ImuBiasInit,
    pub alignment: RoughAlignment,
}

/// A seeded trajectory and state, ready for measurement registration.
#[derive(Debug, Clone)]
pub struct SeededState {
    pub trajectory: Trajectory,
    pub state: CalibrationState,
    pub start_ns: TimeNs,
    pub end_ns: TimeNs,
}

/// Seed the trajectory and state from external poses and raw telemetry.
///
/// Poses must already be restricted to the calibration window and sorted by
/// time; telemetry timestamps are on the IMU clock. Rotation and translation
/// knots are overwritten from the nearest-in-time pose composed with the
/// rough alignment. Gravity is seeded from the first pose that has an
/// accelerometer sample within [`GRAVITY_SEED_TOLERANCE_NS`], assuming the
/// rig is near-static there; failing to find one is fatal.
pub fn initialize(
    poses: &[TimestampedPose],
    telemetry: &TelemetryStream,
    config: &InitConfig,
) -> Result<SeededState, InitError> {
    if poses.is_empty() {
        return Err(InitError::NoPoses);
    }
    let start_ns = poses.first().map(|p| p.t_ns).unwrap_or(0);
    let end_ns = poses.last().map(|p| p.t_ns).unwrap_or(0);

    let imu_from_cam = Iso3::from_parts(
        Translation3::identity(),
        config.alignment.imu_from_cam_rotation,
    );
    let cam_from_imu = imu_from_cam.inverse();

    let mut trajectory = Trajectory::initialize(
        start_ns,
        end_ns,
        s_to_ns(config.weighting.dt_so3_s),
        s_to_ns(config.weighting.dt_r3_s),
        config.order,
    )?;

    // Overwrite the identity knots from the nearest pose in time.
    for i in 0..trajectory.so3().num_knots() {
        let t_knot = start_ns + i as i64 * trajectory.so3().dt_ns();
        let pose = nearest_pose(poses, t_knot);
        let world_from_imu = pose.world_from_cam * cam_from_imu;
        trajectory.so3_mut().set_knot(i, world_from_imu.rotation);
    }
    for i in 0..trajectory.r3().num_knots() {
        let t_knot = start_ns + i as i64 * trajectory.r3().dt_ns();
        let pose = nearest_pose(poses, t_knot);
        let world_from_imu = pose.world_from_cam * cam_from_imu;
        trajectory
            .r3_mut()
            .set_knot(i, world_from_imu.translation.vector);
    }

    let offset_ns = s_to_ns(config.alignment.time_offset_s);
    let gravity = seed_gravity(poses, telemetry, offset_ns, &cam_from_imu, &config.bias)?;
    log::debug!(
        "seeded gravity {:?} (norm {:.3})",
        gravity,
        gravity.norm()
    );

    Ok(SeededState {
        trajectory,
        state: CalibrationState {
            imu_from_cam,
            time_offset_s: config.alignment.time_offset_s,
            gyro_bias: config.bias.gyro_bias,
            accel_bias: config.bias.accel_bias,
            gravity,
        },
        start_ns,
        end_ns,
    })
}

fn nearest_pose(poses: &[TimestampedPose], t_ns: TimeNs) -> &TimestampedPose {
    let idx = poses.partition_point(|p| p.t_ns < t_ns);
    let after = poses.get(idx);
    let before = idx.checked_sub(1).and_then(|i| poses.get(i));
    match (before, after) {
        (Some(b), Some(a)) => {
            if (t_ns - b.t_ns) <= (a.t_ns - t_ns) {
                b
            } else {
                a
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => unreachable!("poses checked non-empty"),
    }
}

/// `g = R_world_imu * (a_meas - b_a)` at the first pose with a close-enough
/// accelerometer sample. Accelerometer timestamps are compared on the
/// camera clock using the seed time offset.
fn seed_gravity(
    poses: &[TimestampedPose],
    telemetry: &TelemetryStream,
    offset_ns: i64,
    cam_from_imu: &Iso3,
    bias: &ImuBiasInit,
) -> Result<Vec3, InitError> {
    for pose in poses {
        if let Some(sample) = nearest_accel(telemetry, pose.t_ns - offset_ns) {
            if (sample.t_ns + offset_ns - pose.t_ns).abs() < GRAVITY_SEED_TOLERANCE_NS {
                let world_from_imu = pose.world_from_cam * cam_from_imu;
                return Ok(world_from_imu.rotation * (sample.value - bias.accel_bias));
            }
        }
    }
    Err(InitError::GravitySeedUnavailable)
}

fn nearest_accel(
    telemetry: &TelemetryStream,
    t_ns: TimeNs,
) -> Option<&imucal_core::ImuSample> {
    let samples = &telemetry.accel;
    if samples.is_empty() {
        return None;
    }
    let idx = samples.partition_point(|s| s.t_ns < t_ns);
    let after = samples.get(idx);
    let before = idx.checked_sub(1).and_then(|i| samples.get(i));
    match (before, after) {
        (Some(b), Some(a)) => {
            if (t_ns - b.t_ns) <= (a.t_ns - t_ns) {
                Some(b)
            } else {
                Some(a)
            }
        }
        (b, a) => b.or(a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use imucal_core::{ImuSample, PinholeIntrinsics};
    use nalgebra::UnitQuaternion;

    fn config() -> InitConfig {
        InitConfig {
            order: 5,
            weighting: SplineWeighting {
                var_so3: 1e-4,
                var_r3: 2e-3,
                dt_so3_s: 0.1,
                dt_r3_s: 0.1,
            },
            bias: ImuBiasInit::default(),
            alignment: RoughAlignment {
                imu_from_cam_rotation: UnitQuaternion::from_euler_angles(0.02, -0.01, 0.03),
                time_offset_s: 0.0,
            },
        }
    }

    fn static_poses(n: usize, period_ns: i64) -> Vec<TimestampedPose> {
        (0..n)
            .map(|i| TimestampedPose {
                t_ns: i as i64 * period_ns,
                cam_id: 0,
                world_from_cam: Iso3::translation(0.0, 0.0, 0.1 * i as f64),
            })
            .collect()
    }

    #[test]
    fn fails_without_poses() {
        let telemetry = TelemetryStream::new(vec![], vec![]).unwrap();
        assert!(matches!(
            initialize(&[], &telemetry, &config()),
            Err(InitError::NoPoses)
        ));
    }

    #[test]
    fn fails_without_close_accel_sample() {
        let poses = static_poses(11, 100_000_000);
        // Accel samples 50 ms away from every pose timestamp.
        let accel: Vec<ImuSample> = (0..10)
            .map(|i| ImuSample {
                t_ns: 50_000_000 + i * 100_000_000,
                value: Vec3::new(0.0, 0.0, 9.81),
            })
            .collect();
        let telemetry = TelemetryStream::new(accel, vec![]).unwrap();
        assert!(matches!(
            initialize(&poses, &telemetry, &config()),
            Err(InitError::GravitySeedUnavailable)
        ));
    }

    #[test]
    fn seeds_gravity_from_first_matching_sample() {
        let poses = static_poses(11, 100_000_000);
        let accel = vec![ImuSample {
            t_ns: 1_000_000,
            value: Vec3::new(0.0, 0.0, 9.81),
        }];
        let telemetry = TelemetryStream::new(accel, vec![]).unwrap();
        let seeded = initialize(&poses, &telemetry, &config()).unwrap();

        let expected = (poses[0].world_from_cam
            * Iso3::from_parts(
                Translation3::identity(),
                config().alignment.imu_from_cam_rotation,
            )
            .inverse())
        .rotation
            * Vec3::new(0.0, 0.0, 9.81);
        assert_relative_eq!(seeded.state.gravity, expected, epsilon = 1e-12);
    }

    #[test]
    fn seeded_trajectory_covers_window_and_tracks_poses() {
        let data = imucal_core::synthetic::SyntheticDataset::generate(
            imucal_core::synthetic::SyntheticConfig {
                intrinsics: PinholeIntrinsics::new(500.0, 500.0, 320.0, 240.0),
                ..Default::default()
            },
        )
        .unwrap();
        // Telemetry shifted to the camera clock with the true offset so the
        // initializer sees well-aligned data.
        let offset_ns = s_to_ns(data.config.time_offset_s);
        let accel: Vec<ImuSample> = data
            .telemetry
            .accel
            .iter()
            .map(|s| ImuSample {
                t_ns: s.t_ns + offset_ns,
                value: s.value,
            })
            .collect();
        let telemetry = TelemetryStream::new(accel, data.telemetry.gyro.clone()).unwrap();

        let cfg = InitConfig {
            order: 5,
            weighting: SplineWeighting {
                var_so3: 1e-4,
                var_r3: 2e-3,
                dt_so3_s: 0.1,
                dt_r3_s: 0.1,
            },
            bias: ImuBiasInit::default(),
            alignment: RoughAlignment {
                imu_from_cam_rotation: data.config.imu_from_cam.rotation,
                time_offset_s: 0.0,
            },
        };
        let seeded = initialize(&data.poses, &telemetry, &cfg).unwrap();
        assert_eq!(seeded.trajectory.so3().num_knots(), 55);
        assert!(seeded.trajectory.pose(seeded.end_ns).is_ok());

        // The seeded spline stays within a coarse bound of each pose.
        for pose in data.poses.iter().step_by(20) {
            let seeded_pose = seeded.trajectory.pose(pose.t_ns).unwrap();
            let expected = pose.world_from_cam
                * Iso3::from_parts(
                    Translation3::identity(),
                    cfg.alignment.imu_from_cam_rotation,
                )
                .inverse();
            assert!(
                (seeded_pose.translation.vector - expected.translation.vector).norm() < 0.5
            );
        }
    }
}
