//! Gyroscope and accelerometer residuals.
//!
//! IMU timestamps are mapped onto the camera clock through the optimizable
//! time offset: each factor stores the normalized segment position `u0`
//! computed at the seed offset `offset0_s`, and shifts it by
//! `(offset - offset0) / dt` during evaluation. The knot window itself is
//! fixed at construction; offset corrections are expected to stay well below
//! one knot spacing.

use super::{knot_vec3, r3_eval, so3_eval_with_vel, SplineBases};
use imucal_core::Vec3;
use nalgebra::{DVector, RealField, Vector3};
use std::sync::Arc;
use tiny_solver::factors::Factor;

/// One gyroscope reading.
///
/// Parameter blocks: `order` rotation knots, the 3D gyro bias, and the 1D
/// time offset in seconds.
#[derive(Debug, Clone)]
pub struct GyroFactor {
    pub measured: Vec3,
    /// `1 / var_so3`; residuals are scaled by its square root.
    pub weight: f64,
    pub u0: f64,
    /// `1 / dt` of the rotation spline, in 1/seconds.
    pub inv_dt_so3: f64,
    /// Seed time offset the knot window was chosen with.
    pub offset0_s: f64,
    pub bases: Arc<SplineBases>,
}

impl<T: RealField> Factor<T> for GyroFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let n = self.bases.order();
        debug_assert_eq!(params.len(), n + 2, "knot window, bias, time offset");
        let (so3_knots, rest) = params.split_at(n);
        let bias = knot_vec3(&rest[0]);
        let offset = rest[1][0].clone();

        let u = T::from_f64(self.u0).unwrap()
            + (offset - T::from_f64(self.offset0_s).unwrap())
                * T::from_f64(self.inv_dt_so3).unwrap();
        let (_, vel) = so3_eval_with_vel(&self.bases, so3_knots, u, self.inv_dt_so3);

        let sqrt_w = T::from_f64(self.weight.sqrt()).unwrap();
        let r = (vel + bias
            - Vector3::new(
                T::from_f64(self.measured.x).unwrap(),
                T::from_f64(self.measured.y).unwrap(),
                T::from_f64(self.measured.z).unwrap(),
            ))
            * sqrt_w;
        nalgebra::dvector![r.x.clone(), r.y.clone(), r.z.clone()]
    }
}

/// One accelerometer reading.
///
/// Parameter blocks: `order` rotation knots, `order` translation knots, the
/// 3D accel bias, the 3D gravity vector, and the 1D time offset.
#[derive(Debug, Clone)]
pub struct AccelFactor {
    pub measured: Vec3,
    /// `1 / var_r3`; residuals are scaled by its square root.
    pub weight: f64,
    pub u0_so3: f64,
    pub u0_r3: f64,
    pub inv_dt_so3: f64,
    pub inv_dt_r3: f64,
    pub offset0_s: f64,
    pub bases: Arc<SplineBases>,
}

impl<T: RealField> Factor<T> for AccelFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let n = self.bases.order();
        debug_assert_eq!(
            params.len(),
            2 * n + 3,
            "knot windows, bias, gravity, time offset"
        );
        let (so3_knots, rest) = params.split_at(n);
        let (r3_knots, rest) = rest.split_at(n);
        let bias = knot_vec3(&rest[0]);
        let gravity = knot_vec3(&rest[1]);
        let offset = rest[2][0].clone();

        let delta = offset - T::from_f64(self.offset0_s).unwrap();
        let u_so3 = T::from_f64(self.u0_so3).unwrap()
            + delta.clone() * T::from_f64(self.inv_dt_so3).unwrap();
        let u_r3 =
            T::from_f64(self.u0_r3).unwrap() + delta * T::from_f64(self.inv_dt_r3).unwrap();

        let (rot_wi, _) = so3_eval_with_vel(&self.bases, so3_knots, u_so3, self.inv_dt_so3);
        let accel_world = r3_eval(&self.bases, r3_knots, u_r3, 2, self.inv_dt_r3);

        let specific_force = rot_wi.inverse_transform_vector(&(accel_world + gravity));
        let sqrt_w = T::from_f64(self.weight.sqrt()).unwrap();
        let r = (specific_force + bias
            - Vector3::new(
                T::from_f64(self.measured.x).unwrap(),
                T::from_f64(self.measured.y).unwrap(),
                T::from_f64(self.measured.z).unwrap(),
            ))
            * sqrt_w;
        nalgebra::dvector![r.x.clone(), r.y.clone(), r.z.clone()]
    }
}
