//! Uniform cumulative B-spline on SO(3).

use super::{blending, domain_end_ns, locate, SplineError};
use crate::math::{quat_exp, quat_log, Real, TimeNs, Vec3, NANOS_PER_SEC};
use nalgebra::{DMatrix, UnitQuaternion};

/// Rotation spline with unit-quaternion knots.
///
/// Evaluation follows the cumulative form
/// `R(u) = R_s * prod_j exp(c_j(u) * log(R_{s+j-1}^-1 R_{s+j}))`.
#[derive(Debug, Clone)]
pub struct So3Spline {
    t0_ns: TimeNs,
    dt_ns: i64,
    order: usize,
    knots: Vec<UnitQuaternion<Real>>,
    blending: DMatrix<f64>,
}

impl So3Spline {
    pub fn new(t0_ns: TimeNs, dt_ns: i64, order: usize) -> Result<Self, SplineError> {
        if order < 2 {
            return Err(SplineError::InvalidOrder(order));
        }
        if dt_ns <= 0 {
            return Err(SplineError::InvalidSpacing(dt_ns));
        }
        Ok(Self {
            t0_ns,
            dt_ns,
            order,
            knots: Vec::new(),
            blending: blending::blending_matrix(order, true),
        })
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    #[inline]
    pub fn dt_ns(&self) -> i64 {
        self.dt_ns
    }

    /// Knot spacing in seconds.
    #[inline]
    pub fn dt_s(&self) -> Real {
        self.dt_ns as Real / NANOS_PER_SEC
    }

    #[inline]
    pub fn num_knots(&self) -> usize {
        self.knots.len()
    }

    #[inline]
    pub fn knot(&self, idx: usize) -> Option<&UnitQuaternion<Real>> {
        self.knots.get(idx)
    }

    pub fn set_knot(&mut self, idx: usize, q: UnitQuaternion<Real>) {
        self.knots[idx] = q;
    }

    pub fn push_knot(&mut self, q: UnitQuaternion<Real>) {
        self.knots.push(q);
    }

    /// Inclusive lower bound of the valid domain.
    #[inline]
    pub fn min_time_ns(&self) -> TimeNs {
        self.t0_ns
    }

    /// Exclusive upper bound of the valid domain.
    #[inline]
    pub fn max_time_ns(&self) -> TimeNs {
        domain_end_ns(self.t0_ns, self.dt_ns, self.knots.len(), self.order)
    }

    /// Segment index and normalized in-segment position for a timestamp.
    pub fn segment(&self, t_ns: TimeNs) -> Result<(usize, f64), SplineError> {
        locate(t_ns, self.t0_ns, self.dt_ns, self.knots.len(), self.order)
    }

    /// Append knots (each set to `knot`) until the domain covers `t_ns`.
    ///
    /// Idempotent: does nothing if `t_ns` is already covered.
    pub fn extend_to(&mut self, t_ns: TimeNs, knot: UnitQuaternion<Real>) {
        while self.knots.len() < self.order || self.max_time_ns() <= t_ns {
            self.knots.push(knot);
        }
    }

    /// Rotation at `t_ns`.
    pub fn evaluate(&self, t_ns: TimeNs) -> Result<UnitQuaternion<Real>, SplineError> {
        let (s, u) = self.segment(t_ns)?;
        let p = blending::power_basis(self.order, 0, u);
        let coeffs = blending::blend_coeffs(&self.blending, &p);

        let mut rot = self.knots[s];
        for j in 1..self.order {
            let delta = quat_log(&(self.knots[s + j - 1].inverse() * self.knots[s + j]));
            rot *= quat_exp(&(delta * coeffs[j]));
        }
        Ok(rot)
    }

    /// Angular velocity at `t_ns`, expressed in the body frame.
    pub fn velocity_body(&self, t_ns: TimeNs) -> Result<Vec3, SplineError> {
        let (s, u) = self.segment(t_ns)?;
        let p0 = blending::power_basis(self.order, 0, u);
        let p1 = blending::power_basis(self.order, 1, u);
        let coeffs = blending::blend_coeffs(&self.blending, &p0);
        let dcoeffs = blending::blend_coeffs(&self.blending, &p1);
        let inv_dt = NANOS_PER_SEC / self.dt_ns as Real;

        let mut vel = Vec3::zeros();
        for j in 1..self.order {
            let delta = quat_log(&(self.knots[s + j - 1].inverse() * self.knots[s + j]));
            let rot = quat_exp(&(delta * -coeffs[j]));
            vel = rot * vel + delta * (dcoeffs[j] * inv_dt);
        }
        Ok(vel)
    }
}
