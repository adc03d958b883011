//! Combined SO(3) x R^3 continuous-time trajectory.

use super::{R3Spline, So3Spline, SplineError};
use crate::math::{Iso3, TimeNs, Vec3};
use nalgebra::{Translation3, UnitQuaternion};

/// Continuous-time pose of the IMU in the world frame.
///
/// Rotation and translation use independent knot spacings; the valid domain
/// of the trajectory is the intersection of the two spline domains.
#[derive(Debug, Clone)]
pub struct Trajectory {
    so3: So3Spline,
    r3: R3Spline,
}

impl Trajectory {
    /// Allocate both splines over `[start_ns, end_ns]`.
    ///
    /// Each spline gets `ceil((end - start) / dt) + order` knots, which
    /// guarantees the domain covers the closed window. Rotation knots start
    /// as identity, translation knots as zero.
    pub fn initialize(
        start_ns: TimeNs,
        end_ns: TimeNs,
        dt_so3_ns: i64,
        dt_r3_ns: i64,
        order: usize,
    ) -> Result<Self, SplineError> {
        if end_ns <= start_ns {
            return Err(SplineError::EmptyWindow { start_ns, end_ns });
        }
        let mut so3 = So3Spline::new(start_ns, dt_so3_ns, order)?;
        let mut r3 = R3Spline::new(start_ns, dt_r3_ns, order)?;

        let span = end_ns - start_ns;
        for _ in 0..knot_count(span, dt_so3_ns, order) {
            so3.push_knot(UnitQuaternion::identity());
        }
        for _ in 0..knot_count(span, dt_r3_ns, order) {
            r3.push_knot(Vec3::zeros());
        }
        Ok(Self { so3, r3 })
    }

    #[inline]
    pub fn so3(&self) -> &So3Spline {
        &self.so3
    }

    #[inline]
    pub fn so3_mut(&mut self) -> &mut So3Spline {
        &mut self.so3
    }

    #[inline]
    pub fn r3(&self) -> &R3Spline {
        &self.r3
    }

    #[inline]
    pub fn r3_mut(&mut self) -> &mut R3Spline {
        &mut self.r3
    }

    /// Inclusive lower bound of the joint domain.
    pub fn min_time_ns(&self) -> TimeNs {
        self.so3.min_time_ns().max(self.r3.min_time_ns())
    }

    /// Exclusive upper bound of the joint domain.
    pub fn max_time_ns(&self) -> TimeNs {
        self.so3.max_time_ns().min(self.r3.max_time_ns())
    }

    /// Grow both splines until their domains cover `t_ns`, replicating the
    /// last knot of each. Idempotent.
    pub fn extend_to(&mut self, t_ns: TimeNs) {
        let last_rot = self
            .so3
            .knot(self.so3.num_knots().wrapping_sub(1))
            .copied()
            .unwrap_or_else(UnitQuaternion::identity);
        let last_pos = self
            .r3
            .knot(self.r3.num_knots().wrapping_sub(1))
            .copied()
            .unwrap_or_else(Vec3::zeros);
        self.so3.extend_to(t_ns, last_rot);
        self.r3.extend_to(t_ns, last_pos);
    }

    /// World-from-IMU pose at `t_ns`.
    pub fn pose(&self, t_ns: TimeNs) -> Result<Iso3, SplineError> {
        let rot = self.so3.evaluate(t_ns)?;
        let pos = self.r3.evaluate(t_ns)?;
        Ok(Iso3::from_parts(Translation3::from(pos), rot))
    }

    /// Angular velocity at `t_ns` in the IMU body frame.
    pub fn angular_velocity_body(&self, t_ns: TimeNs) -> Result<Vec3, SplineError> {
        self.so3.velocity_body(t_ns)
    }

    /// Linear acceleration at `t_ns` in the world frame (gravity excluded).
    pub fn linear_acceleration_world(&self, t_ns: TimeNs) -> Result<Vec3, SplineError> {
        self.r3.acceleration(t_ns)
    }
}

fn knot_count(span_ns: i64, dt_ns: i64, order: usize) -> usize {
    let segments = (span_ns + dt_ns - 1) / dt_ns;
    segments as usize + order
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn five_second_window_allocates_55_knots() {
        let traj = Trajectory::initialize(0, 5_000_000_000, 100_000_000, 100_000_000, 5).unwrap();
        assert_eq!(traj.so3().num_knots(), 55);
        assert_eq!(traj.r3().num_knots(), 55);
        // The closed window is covered, including the end point.
        assert!(traj.pose(5_000_000_000).is_ok());
    }

    #[test]
    fn fresh_trajectory_is_identity() {
        let traj = Trajectory::initialize(0, 1_000_000_000, 100_000_000, 50_000_000, 4).unwrap();
        let pose = traj.pose(500_000_000).unwrap();
        assert_relative_eq!(pose.translation.vector.norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(pose.rotation.angle(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(
            traj.angular_velocity_body(500_000_000).unwrap().norm(),
            0.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            traj.linear_acceleration_world(500_000_000).unwrap().norm(),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn rejects_empty_window() {
        assert!(matches!(
            Trajectory::initialize(100, 100, 10, 10, 5),
            Err(SplineError::EmptyWindow { .. })
        ));
    }

    #[test]
    fn independent_knot_spacings() {
        let traj = Trajectory::initialize(0, 1_000_000_000, 200_000_000, 100_000_000, 5).unwrap();
        assert_eq!(traj.so3().num_knots(), 10);
        assert_eq!(traj.r3().num_knots(), 15);
        // Joint domain is the intersection of both spline domains.
        assert_eq!(traj.max_time_ns(), traj.so3().max_time_ns().min(traj.r3().max_time_ns()));
    }

    #[test]
    fn extend_to_grows_both_splines() {
        let mut traj = Trajectory::initialize(0, 1_000_000_000, 100_000_000, 100_000_000, 5).unwrap();
        let target = traj.max_time_ns() + 300_000_000;
        traj.extend_to(target);
        assert!(traj.max_time_ns() > target);
        assert!(traj.pose(target).is_ok());

        let so3_knots = traj.so3().num_knots();
        traj.extend_to(target);
        assert_eq!(traj.so3().num_knots(), so3_knots);
    }
}
