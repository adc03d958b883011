//! Reprojection residual through the spline trajectory.

use super::{knot_quat, r3_eval, so3_eval, SplineBases};
use imucal_core::{PinholeIntrinsics, Pt3, Vec2};
use nalgebra::{DVector, RealField, Vector2, Vector3};
use std::sync::Arc;
use tiny_solver::factors::Factor;

/// Project a camera-frame point through locked pinhole intrinsics.
///
/// Same model as `PinholeIntrinsics::project_point`; behind-camera masking
/// happens when observations are selected, not here.
pub(crate) fn project_pinhole<T: RealField>(
    k: &PinholeIntrinsics,
    pc: &Vector3<T>,
) -> Vector2<T> {
    let x = pc.x.clone() / pc.z.clone();
    let y = pc.y.clone() / pc.z.clone();
    Vector2::new(
        x * T::from_f64(k.fx).unwrap() + T::from_f64(k.cx).unwrap(),
        y * T::from_f64(k.fy).unwrap() + T::from_f64(k.cy).unwrap(),
    )
}

/// One observed corner tied to the trajectory at a fixed camera-clock time.
///
/// Parameter blocks: `order` rotation knots, `order` translation knots, and
/// the 7D `imu_from_cam` extrinsics. Corner timestamps live on the camera
/// clock, so the time offset does not enter here.
#[derive(Debug, Clone)]
pub struct SplineReprojFactor {
    pub landmark: Pt3,
    pub uv: Vec2,
    pub weight: f64,
    /// Normalized position within the rotation-spline segment.
    pub u_so3: f64,
    /// Normalized position within the translation-spline segment.
    pub u_r3: f64,
    pub intrinsics: PinholeIntrinsics,
    pub bases: Arc<SplineBases>,
}

impl<T: RealField> Factor<T> for SplineReprojFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let n = self.bases.order();
        debug_assert_eq!(params.len(), 2 * n + 1, "knot windows plus extrinsics");
        let (so3_knots, rest) = params.split_at(n);
        let (r3_knots, rest) = rest.split_at(n);
        let extr = &rest[0];

        let rot_wi = so3_eval(&self.bases, so3_knots, T::from_f64(self.u_so3).unwrap());
        let pos_wi = r3_eval(
            &self.bases,
            r3_knots,
            T::from_f64(self.u_r3).unwrap(),
            0,
            1.0,
        );

        // imu_from_cam as [qx, qy, qz, qw, tx, ty, tz]
        let rot_ic = knot_quat(&DVector::from_row_slice(&[
            extr[0].clone(),
            extr[1].clone(),
            extr[2].clone(),
            extr[3].clone(),
        ]));
        let pos_ic = Vector3::new(extr[4].clone(), extr[5].clone(), extr[6].clone());

        let landmark = Vector3::new(
            T::from_f64(self.landmark.x).unwrap(),
            T::from_f64(self.landmark.y).unwrap(),
            T::from_f64(self.landmark.z).unwrap(),
        );

        // world_from_cam = world_from_imu * imu_from_cam; project its inverse.
        let in_imu = rot_wi.inverse_transform_vector(&(landmark - pos_wi));
        let in_cam = rot_ic.inverse_transform_vector(&(in_imu - pos_ic));

        let proj = project_pinhole(&self.intrinsics, &in_cam);
        let sqrt_w = T::from_f64(self.weight.sqrt()).unwrap();
        let ru = (T::from_f64(self.uv.x).unwrap() - proj.x.clone()) * sqrt_w.clone();
        let rv = (T::from_f64(self.uv.y).unwrap() - proj.y.clone()) * sqrt_w;
        nalgebra::dvector![ru, rv]
    }
}
