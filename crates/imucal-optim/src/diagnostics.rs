//! Read-only quality metrics for a fitted calibration.

use anyhow::{bail, Context, Result};
use imucal_core::{
    CalibrationState, CornerObservation, LandmarkTable, PinholeIntrinsics, Trajectory,
};

/// Mean pixel-space reprojection error over the supplied corner set.
///
/// Corner timestamps outside the trajectory domain are a contract violation
/// and reported as errors. Returns 0.0 for an empty corner set.
pub fn mean_reprojection(
    trajectory: &Trajectory,
    state: &CalibrationState,
    landmarks: &LandmarkTable,
    intrinsics: &PinholeIntrinsics,
    corners: &[CornerObservation],
) -> Result<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;

    for frame in corners {
        let world_from_imu = trajectory
            .pose(frame.t_ns)
            .with_context(|| format!("corner frame at {} ns", frame.t_ns))?;
        let world_from_cam = world_from_imu * state.imu_from_cam;

        for track in &frame.corners {
            let landmark = landmarks
                .get(track.track_id)
                .with_context(|| format!("track id {} not in landmark table", track.track_id))?;
            let in_cam = world_from_cam.inverse_transform_point(landmark);
            let Some(uv) = intrinsics.project_point(&in_cam) else {
                bail!(
                    "landmark {} behind camera at {} ns (z = {:.6})",
                    track.track_id,
                    frame.t_ns,
                    in_cam.z
                );
            };
            sum += (track.uv - uv).norm();
            count += 1;
        }
    }

    if count == 0 {
        return Ok(0.0);
    }
    Ok(sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use imucal_core::synthetic::{SyntheticConfig, SyntheticDataset};

    #[test]
    fn exact_data_has_zero_error() {
        let data = SyntheticDataset::generate(SyntheticConfig::default()).unwrap();
        let err = mean_reprojection(
            &data.trajectory,
            &data.ground_truth,
            &data.landmarks,
            &data.config.intrinsics,
            &data.corners,
        )
        .unwrap();
        assert_relative_eq!(err, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn perturbed_extrinsics_increase_error() {
        let data = SyntheticDataset::generate(SyntheticConfig::default()).unwrap();
        let mut state = data.ground_truth.clone();
        state.imu_from_cam.translation.vector.x += 0.01;
        let err = mean_reprojection(
            &data.trajectory,
            &state,
            &data.landmarks,
            &data.config.intrinsics,
            &data.corners,
        )
        .unwrap();
        assert!(err > 0.5, "expected visible error, got {err}");
    }

    #[test]
    fn out_of_domain_corner_is_an_error() {
        let data = SyntheticDataset::generate(SyntheticConfig::default()).unwrap();
        let mut corners = data.corners.clone();
        corners[0].t_ns = -1_000_000_000;
        let result = mean_reprojection(
            &data.trajectory,
            &data.ground_truth,
            &data.landmarks,
            &data.config.intrinsics,
            &corners,
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_corner_set_yields_zero() {
        let data = SyntheticDataset::generate(SyntheticConfig::default()).unwrap();
        let err = mean_reprojection(
            &data.trajectory,
            &data.ground_truth,
            &data.landmarks,
            &data.config.intrinsics,
            &[],
        )
        .unwrap();
        assert_eq!(err, 0.0);
    }
}
