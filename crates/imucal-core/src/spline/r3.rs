//! Uniform cumulative B-spline on R^3.

use super::{blending, domain_end_ns, locate, SplineError};
use crate::math::{Real, TimeNs, Vec3, NANOS_PER_SEC};
use nalgebra::DMatrix;

/// Translation spline with 3-vector knots.
///
/// Uses the same cumulative form as the rotation spline, blending knot
/// differences: `p(u) = p_s + sum_j c_j(u) * (p_{s+j} - p_{s+j-1})`.
#[derive(Debug, Clone)]
pub struct R3Spline {
    t0_ns: TimeNs,
    dt_ns: i64,
    order: usize,
    knots: Vec<Vec3>,
    blending: DMatrix<f64>,
}

impl R3Spline {
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
    pub fn knot(&self, idx: usize) -> Option<&Vec3> {
        self.knots.get(idx)
    }

    pub fn set_knot(&mut self, idx: usize, v: Vec3) {
        self.knots[idx] = v;
    }

    pub fn push_knot(&mut self, v: Vec3) {
        self.knots.push(v);
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
    pub fn extend_to(&mut self, t_ns: TimeNs, knot: Vec3) {
        while self.knots.len() < self.order || self.max_time_ns() <= t_ns {
            self.knots.push(knot);
        }
    }

    fn derivative(&self, t_ns: TimeNs, order_d: usize) -> Result<Vec3, SplineError> {
        let (s, u) = self.segment(t_ns)?;
        let p = blending::power_basis(self.order, order_d, u);
        let coeffs = blending::blend_coeffs(&self.blending, &p);
        let inv_dt_pow = (NANOS_PER_SEC / self.dt_ns as Real).powi(order_d as i32);

        let mut res = if order_d == 0 {
            self.knots[s]
        } else {
            Vec3::zeros()
        };
        for j in 1..self.order {
            res += (self.knots[s + j] - self.knots[s + j - 1]) * (coeffs[j] * inv_dt_pow);
        }
        Ok(res)
    }

    /// Position at `t_ns`.
    pub fn evaluate(&self, t_ns: TimeNs) -> Result<Vec3, SplineError> {
        self.derivative(t_ns, 0)
    }

    /// First time derivative (velocity, m/s) at `t_ns`.
    pub fn velocity(&self, t_ns: TimeNs) -> Result<Vec3, SplineError> {
        self.derivative(t_ns, 1)
    }

    /// Second time derivative (acceleration, m/s^2) at `t_ns`.
    pub fn acceleration(&self, t_ns: TimeNs) -> Result<Vec3, SplineError> {
        self.derivative(t_ns, 2)
    }
}
