//! The end-to-end calibration run.

use crate::types::{
    CalibrationConfig, CalibrationInput, CalibrationReport, MeasurementCounts,
    OptimizeSummaryReport,
};
use anyhow::{ensure, Result};
use imucal_core::{ns_to_s, s_to_ns, CornerObservation, TimeNs, TimestampedPose};
use imucal_optim::{
    initialize, InitConfig, JointEstimator, JointSolveOptions, Measurement, OptimizeOptions,
};

/// Run the full IMU-to-camera calibration.
///
/// Selects the calibration window from the pose timestamps (optionally
/// truncated by `max_duration_s`), seeds the trajectory and state, registers
/// all in-window measurements, optimizes, and reports the refined state with
/// its mean reprojection error.
pub fn run_imu_camera_calibration(
    input: &CalibrationInput,
    config: &CalibrationConfig,
) -> Result<CalibrationReport> {
    ensure!(config.imu_stride >= 1, "imu_stride must be at least 1");
    ensure!(!input.poses.is_empty(), "input contains no camera poses");

    let mut poses: Vec<TimestampedPose> = input.poses.clone();
    poses.sort_by_key(|p| p.t_ns);

    let start_ns = poses[0].t_ns;
    let mut end_ns = poses[poses.len() - 1].t_ns;
    if let Some(max_s) = config.max_duration_s {
        end_ns = end_ns.min(start_ns + s_to_ns(max_s));
        poses.retain(|p| p.t_ns <= end_ns);
    }
    ensure!(end_ns > start_ns, "calibration window is empty");

    let init_config = InitConfig {
        order: config.order,
        weighting: input.weighting,
        bias: input.bias,
        alignment: input.alignment,
    };
    let seeded = initialize(&poses, &input.telemetry, &init_config)?;

    let mut estimator = JointEstimator::new(input.landmarks.clone(), input.intrinsics);
    estimator.seed(seeded)?;

    // Keep IMU samples one knot spacing clear of the window edges so
    // time-offset updates cannot push them out of the spline domain.
    let offset_ns = s_to_ns(input.alignment.time_offset_s);
    let guard_ns = s_to_ns(input.weighting.dt_so3_s.max(input.weighting.dt_r3_s));
    let imu_window = (start_ns + guard_ns)..=(end_ns - guard_ns);

    let mut counts = MeasurementCounts::default();
    let corners_in_window: Vec<CornerObservation> = input
        .corners
        .iter()
        .filter(|c| c.t_ns >= start_ns && c.t_ns <= end_ns)
        .cloned()
        .collect();

    for frame in &corners_in_window {
        counts.num_frames += 1;
        for track in &frame.corners {
            let t_ns = corner_time_ns(frame.t_ns, track.uv.y, config);
            estimator.add_measurement(Measurement::Reprojection {
                t_ns,
                track_id: track.track_id,
                uv: track.uv,
                weight: 1.0,
            })?;
            counts.num_corners += 1;
        }
    }

    let gyro_weight = 1.0 / input.weighting.var_so3;
    for sample in input.telemetry.gyro.iter().step_by(config.imu_stride) {
        if imu_window.contains(&(sample.t_ns + offset_ns)) {
            estimator.add_measurement(Measurement::Gyroscope {
                t_ns: sample.t_ns,
                value: sample.value,
                weight: gyro_weight,
            })?;
            counts.num_gyro += 1;
        }
    }
    let accel_weight = 1.0 / input.weighting.var_r3;
    for sample in input.telemetry.accel.iter().step_by(config.imu_stride) {
        if imu_window.contains(&(sample.t_ns + offset_ns)) {
            estimator.add_measurement(Measurement::Accelerometer {
                t_ns: sample.t_ns,
                value: sample.value,
                weight: accel_weight,
            })?;
            counts.num_accel += 1;
        }
    }

    let duration_s = ns_to_s(end_ns - start_ns);
    log::info!(
        "calibrating over {:.2} s: {} frames, {} corners, {} gyro, {} accel",
        duration_s,
        counts.num_frames,
        counts.num_corners,
        counts.num_gyro,
        counts.num_accel
    );

    let opts = OptimizeOptions {
        max_iterations: config.max_iterations,
        solve: JointSolveOptions {
            optimize_time_offset: config.optimize_time_offset,
            ..JointSolveOptions::default()
        },
        ..OptimizeOptions::default()
    };
    let summary = estimator.optimize(&opts)?;
    // The diagnostic evaluates the same per-row corrected times the
    // residuals were built with.
    let diagnostic_corners = shutter_corrected(&corners_in_window, config);
    let mean_reprojection_px = estimator.mean_reprojection(&diagnostic_corners)?;

    let state = estimator
        .state()
        .expect("estimator state exists after optimization")
        .clone();
    log::info!(
        "result: offset {:.4} ms, |g| {:.3} m/s^2, mean reprojection {:.3} px",
        state.time_offset_s * 1e3,
        state.gravity.norm(),
        mean_reprojection_px
    );

    Ok(CalibrationReport {
        gravity_norm: state.gravity.norm(),
        state,
        mean_reprojection_px,
        counts,
        duration_s,
        summary: OptimizeSummaryReport {
            iterations: summary.iterations,
            initial_cost: summary.initial_cost,
            final_cost: summary.final_cost,
            termination: summary.termination.into(),
        },
    })
}

/// Corner observation time, optionally corrected for the sensor row being
/// read out later within the frame.
fn corner_time_ns(frame_t_ns: TimeNs, row: f64, config: &CalibrationConfig) -> TimeNs {
    match config.rolling_shutter {
        Some(rs) if rs.image_rows > 0 => {
            frame_t_ns + s_to_ns(rs.readout_s * row / rs.image_rows as f64)
        }
        _ => frame_t_ns,
    }
}

/// With a rolling shutter configured, split every frame into per-corner
/// observations at their row-corrected times; global-shutter frames pass
/// through untouched.
fn shutter_corrected(
    corners: &[CornerObservation],
    config: &CalibrationConfig,
) -> Vec<CornerObservation> {
    if config.rolling_shutter.is_none() {
        return corners.to_vec();
    }
    corners
        .iter()
        .flat_map(|frame| {
            frame.corners.iter().map(|track| CornerObservation {
                t_ns: corner_time_ns(frame.t_ns, track.uv.y, config),
                cam_id: frame.cam_id,
                corners: vec![*track],
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RollingShutterConfig, TerminationKind};
    use imucal_core::synthetic::{SyntheticConfig, SyntheticDataset};
    use imucal_core::{ImuBiasInit, RoughAlignment, SplineWeighting};

    fn synthetic_input() -> CalibrationInput {
        let data = SyntheticDataset::generate(SyntheticConfig::default()).unwrap();
        CalibrationInput {
            poses: data.poses.clone(),
            corners: data.corners.clone(),
            landmarks: data.landmarks.clone(),
            intrinsics: data.config.intrinsics,
            telemetry: data.telemetry.clone(),
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
        }
    }

    #[test]
    fn full_pipeline_reaches_subpixel_reprojection() {
        let input = synthetic_input();
        let config = CalibrationConfig {
            imu_stride: 2,
            max_iterations: 15,
            ..CalibrationConfig::default()
        };
        let report = run_imu_camera_calibration(&input, &config).unwrap();

        assert_ne!(report.summary.termination, TerminationKind::NumericalFailure);
        assert!(
            report.mean_reprojection_px < 1.0,
            "mean reprojection {} px",
            report.mean_reprojection_px
        );
        assert!(report.counts.num_frames > 0);
        assert!(report.counts.num_gyro > 0);
        assert!(report.counts.num_accel > 0);
        assert!((report.duration_s - 5.0).abs() < 1e-9);
        assert!((report.gravity_norm - 9.81).abs() < 0.3);
        // The 5 ms clock offset is recovered from a zero seed.
        assert!((report.state.time_offset_s - 0.005).abs() < 1e-3);
    }

    #[test]
    fn max_duration_truncates_the_window() {
        let input = synthetic_input();
        let config = CalibrationConfig {
            max_duration_s: Some(2.0),
            imu_stride: 4,
            max_iterations: 5,
            ..CalibrationConfig::default()
        };
        let report = run_imu_camera_calibration(&input, &config).unwrap();
        assert!((report.duration_s - 2.0).abs() < 1e-9);
        // 2 s at 20 Hz inclusive.
        assert_eq!(report.counts.num_frames, 41);
    }

    #[test]
    fn imu_stride_subsamples_telemetry() {
        let input = synthetic_input();
        let base = CalibrationConfig {
            max_duration_s: Some(1.0),
            max_iterations: 1,
            ..CalibrationConfig::default()
        };
        let strided = CalibrationConfig {
            imu_stride: 2,
            ..base.clone()
        };
        let full = run_imu_camera_calibration(&input, &base).unwrap();
        let half = run_imu_camera_calibration(&input, &strided).unwrap();
        assert!(half.counts.num_gyro * 2 <= full.counts.num_gyro + 2);
        assert!(half.counts.num_gyro >= full.counts.num_gyro / 2 - 2);
    }

    #[test]
    fn rolling_shutter_shifts_corner_times() {
        let config = CalibrationConfig {
            rolling_shutter: Some(RollingShutterConfig {
                readout_s: 1.0 / 30.0,
                image_rows: 480,
            }),
            ..CalibrationConfig::default()
        };
        let t = corner_time_ns(1_000_000_000, 240.0, &config);
        // Half the frame height is read out half a readout later.
        assert_eq!(t, 1_000_000_000 + s_to_ns(0.5 / 30.0));

        let gs = CalibrationConfig::default();
        assert_eq!(corner_time_ns(1_000_000_000, 240.0, &gs), 1_000_000_000);
    }

    #[test]
    fn diagnostic_corners_share_the_rolling_shutter_correction() {
        use imucal_core::{TrackObservation, Vec2};

        let frame = CornerObservation {
            t_ns: 1_000_000_000,
            cam_id: 0,
            corners: vec![
                TrackObservation {
                    track_id: 0,
                    uv: Vec2::new(100.0, 0.0),
                },
                TrackObservation {
                    track_id: 1,
                    uv: Vec2::new(200.0, 480.0),
                },
            ],
        };
        let config = CalibrationConfig {
            rolling_shutter: Some(RollingShutterConfig {
                readout_s: 1.0 / 30.0,
                image_rows: 480,
            }),
            ..CalibrationConfig::default()
        };

        // Each corner becomes its own observation at its row-corrected time.
        let corrected = shutter_corrected(std::slice::from_ref(&frame), &config);
        assert_eq!(corrected.len(), 2);
        assert_eq!(corrected[0].t_ns, 1_000_000_000);
        assert_eq!(corrected[1].t_ns, 1_000_000_000 + s_to_ns(1.0 / 30.0));
        assert_eq!(corrected[0].corners.len(), 1);
        assert_eq!(corrected[1].corners[0].track_id, 1);

        // Global shutter leaves frames untouched.
        let gs = shutter_corrected(std::slice::from_ref(&frame), &CalibrationConfig::default());
        assert_eq!(gs.len(), 1);
        assert_eq!(gs[0].corners.len(), 2);
    }

    #[test]
    fn rejects_zero_stride() {
        let input = synthetic_input();
        let config = CalibrationConfig {
            imu_stride: 0,
            ..CalibrationConfig::default()
        };
        assert!(run_imu_camera_calibration(&input, &config).is_err());
    }
}
