//! SO(3) exponential and logarithm maps generic over the scalar type.
//!
//! These are used both at `f64` (trajectory evaluation, seeding) and at
//! dual-number scalars inside residual functors, so the small-angle branches
//! use truncated Taylor series instead of nalgebra's axis extraction, which
//! returns exact zeros (and hence zero derivatives) near the identity.

use nalgebra::{Quaternion, RealField, UnitQuaternion, Vector3};

/// Below this squared angle the exp/log maps switch to their Taylor forms.
const SMALL_ANGLE_SQ: f64 = 1e-14;

/// Exponential map from a rotation vector to a unit quaternion.
pub fn quat_exp<T: RealField>(v: &Vector3<T>) -> UnitQuaternion<T> {
    let theta_sq = v.norm_squared();
    let small = T::from_f64(SMALL_ANGLE_SQ).unwrap();
    let half = T::from_f64(0.5).unwrap();

    let (w, k) = if theta_sq < small {
        // cos(t/2) ~ 1 - t^2/8, sin(t/2)/t ~ 1/2 - t^2/48
        let w = T::one() - theta_sq.clone() * T::from_f64(1.0 / 8.0).unwrap();
        let k = half - theta_sq * T::from_f64(1.0 / 48.0).unwrap();
        (w, k)
    } else {
        let theta = theta_sq.sqrt();
        let half_theta = theta.clone() * half;
        (half_theta.clone().cos(), half_theta.sin() / theta)
    };

    let q = Quaternion::from_parts(w, v * k);
    UnitQuaternion::new_normalize(q)
}

/// Logarithm map from a unit quaternion to a rotation vector.
///
/// Always returns the short rotation (angle in `[0, pi]`).
pub fn quat_log<T: RealField>(q: &UnitQuaternion<T>) -> Vector3<T> {
    let mut w = q.scalar();
    let mut vec = q.vector().clone_owned();
    if w < T::zero() {
        w = -w;
        vec = -vec;
    }

    let n_sq = vec.norm_squared();
    let small = T::from_f64(SMALL_ANGLE_SQ).unwrap();
    let two = T::from_f64(2.0).unwrap();

    let k = if n_sq < small {
        // 2 * atan(n/w) / n ~ 2/w - 2 n^2 / (3 w^3)
        let w3 = w.clone() * w.clone() * w.clone();
        two.clone() / w - two * n_sq / (T::from_f64(3.0).unwrap() * w3)
    } else {
        let n = n_sq.sqrt();
        let angle = n.clone().atan2(w) * two;
        angle / n
    };

    vec * k
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn exp_log_round_trip() {
        let cases = [
            Vector3::new(0.3, -0.2, 0.5),
            Vector3::new(1.5, 0.0, 0.0),
            Vector3::new(-0.01, 0.02, -0.005),
            Vector3::new(3.0, 0.1, -0.2),
        ];
        for v in cases {
            let q = quat_exp(&v);
            let back = quat_log(&q);
            assert_relative_eq!(back, v, epsilon = 1e-12);
        }
    }

    #[test]
    fn exp_log_near_identity() {
        let v = Vector3::new(1e-9, -2e-9, 3e-10);
        let q = quat_exp(&v);
        let back = quat_log(&q);
        assert_relative_eq!(back, v, epsilon = 1e-16);
    }

    #[test]
    fn exp_matches_nalgebra_scaled_axis() {
        let v = Vector3::new(0.4, -0.7, 0.1);
        let q = quat_exp(&v);
        let reference = UnitQuaternion::from_scaled_axis(v);
        assert_relative_eq!(q.angle_to(&reference), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn log_takes_short_path() {
        // A quaternion with negative scalar part represents the same rotation.
        let v = Vector3::new(0.2, 0.1, -0.3);
        let q = quat_exp(&v);
        let flipped = UnitQuaternion::new_unchecked(-q.into_inner());
        assert_relative_eq!(quat_log(&flipped), v, epsilon = 1e-12);
    }
}
