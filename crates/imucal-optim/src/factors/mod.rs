//! Residual factors for the joint calibration problem.
//!
//! All factors evaluate the cumulative B-splines generically over the scalar
//! type so tiny-solver's forward-mode autodiff differentiates through the
//! spline, the Lie-group maps, and the projection.

use imucal_core::{blend_coeffs, blending_matrix, power_basis, quat_exp, quat_log};
use nalgebra::{DMatrix, DVector, RealField, UnitQuaternion, Vector3};

pub mod imu;
pub mod reprojection;

pub use imu::{AccelFactor, GyroFactor};
pub use reprojection::SplineReprojFactor;

/// Precomputed cumulative blending matrix, shared by all factors of a
/// problem via `Arc`.
#[derive(Debug, Clone)]
pub struct SplineBases {
    order: usize,
    cumulative: DMatrix<f64>,
}

impl SplineBases {
    pub fn new(order: usize) -> Self {
        Self {
            order,
            cumulative: blending_matrix(order, true),
        }
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Cumulative blending coefficients, differentiated `derivative` times
    /// with respect to the normalized segment position.
    pub fn coeffs<T: RealField>(&self, derivative: usize, u: T) -> Vec<T> {
        let p = power_basis(self.order, derivative, u);
        blend_coeffs(&self.cumulative, &p)
    }
}

/// Read a unit quaternion from a 4D `[qx, qy, qz, qw]` parameter block.
pub(crate) fn knot_quat<T: RealField>(block: &DVector<T>) -> UnitQuaternion<T> {
    let q = nalgebra::Quaternion::from_parts(
        block[3].clone(),
        Vector3::new(block[0].clone(), block[1].clone(), block[2].clone()),
    );
    UnitQuaternion::from_quaternion(q)
}

/// Read a 3-vector from a parameter block.
pub(crate) fn knot_vec3<T: RealField>(block: &DVector<T>) -> Vector3<T> {
    Vector3::new(block[0].clone(), block[1].clone(), block[2].clone())
}

/// Evaluate the rotation spline over one knot window.
pub(crate) fn so3_eval<T: RealField>(
    bases: &SplineBases,
    knots: &[DVector<T>],
    u: T,
) -> UnitQuaternion<T> {
    let coeffs = bases.coeffs(0, u);
    let mut rot = knot_quat(&knots[0]);
    for j in 1..bases.order {
        let prev = knot_quat(&knots[j - 1]);
        let next = knot_quat(&knots[j]);
        let delta = quat_log(&(prev.inverse() * next));
        rot *= quat_exp(&(delta * coeffs[j].clone()));
    }
    rot
}

/// Evaluate the rotation spline and its body angular velocity over one knot
/// window. `inv_dt` is `1 / dt` in 1/seconds.
pub(crate) fn so3_eval_with_vel<T: RealField>(
    bases: &SplineBases,
    knots: &[DVector<T>],
    u: T,
    inv_dt: f64,
) -> (UnitQuaternion<T>, Vector3<T>) {
    let coeffs = bases.coeffs(0, u.clone());
    let dcoeffs = bases.coeffs(1, u);
    let inv_dt = T::from_f64(inv_dt).unwrap();

    let mut rot = knot_quat(&knots[0]);
    let mut vel = Vector3::zeros();
    for j in 1..bases.order {
        let prev = knot_quat(&knots[j - 1]);
        let next = knot_quat(&knots[j]);
        let delta = quat_log(&(prev.inverse() * next));
        rot *= quat_exp(&(delta.clone() * coeffs[j].clone()));
        let back = quat_exp(&(delta.clone() * -coeffs[j].clone()));
        vel = back * vel + delta * (dcoeffs[j].clone() * inv_dt.clone());
    }
    (rot, vel)
}

/// Evaluate the translation spline derivative over one knot window.
/// `derivative` 0 gives the position, 2 the acceleration.
pub(crate) fn r3_eval<T: RealField>(
    bases: &SplineBases,
    knots: &[DVector<T>],
    u: T,
    derivative: usize,
    inv_dt: f64,
) -> Vector3<T> {
    let coeffs = bases.coeffs(derivative, u);
    let scale = T::from_f64(inv_dt.powi(derivative as i32)).unwrap();

    let mut res = if derivative == 0 {
        knot_vec3(&knots[0])
    } else {
        Vector3::zeros()
    };
    for j in 1..bases.order {
        let diff = knot_vec3(&knots[j]) - knot_vec3(&knots[j - 1]);
        res += diff * (coeffs[j].clone() * scale.clone());
    }
    res
}
