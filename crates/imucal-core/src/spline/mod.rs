//! Uniform cumulative B-spline trajectory on SO(3) x R^3.
//!
//! Rotation and translation are represented by two independent uniform
//! B-splines in cumulative form. The rotation spline blends in the Lie
//! algebra (exp/log), never by interpolating quaternion components.
//!
//! A spline of order `N` with `K` knots, first knot time `t0`, and spacing
//! `dt` is defined on the half-open interval `[t0, t0 + (K - N + 1) * dt)`.
//! Evaluation outside that interval is an error, never a clamp.

use crate::TimeNs;
use thiserror::Error;

pub mod blending;
pub mod r3;
pub mod so3;
pub mod trajectory;

pub use blending::{blend_coeffs, blending_matrix, power_basis};
pub use r3::R3Spline;
pub use so3::So3Spline;
pub use trajectory::Trajectory;

/// Errors from spline construction and evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SplineError {
    /// Requested timestamp lies outside the valid half-open domain.
    #[error("timestamp {t_ns} ns outside spline domain [{min_ns}, {max_ns}) ns")]
    OutOfDomain {
        t_ns: TimeNs,
        min_ns: TimeNs,
        max_ns: TimeNs,
    },
    /// Spline order must be at least 2 (linear).
    #[error("spline order must be at least 2, got {0}")]
    InvalidOrder(usize),
    /// Knot spacing must be a positive number of nanoseconds.
    #[error("knot spacing must be positive, got {0} ns")]
    InvalidSpacing(i64),
    /// The requested time window is empty.
    #[error("time window is empty: start {start_ns} ns, end {end_ns} ns")]
    EmptyWindow { start_ns: TimeNs, end_ns: TimeNs },
}

/// Exclusive upper bound of the valid domain for a knot vector of the given
/// size. Splines with fewer than `order` knots have an empty domain.
pub(crate) fn domain_end_ns(t0_ns: TimeNs, dt_ns: i64, num_knots: usize, order: usize) -> TimeNs {
    if num_knots < order {
        return t0_ns;
    }
    t0_ns + (num_knots - order + 1) as i64 * dt_ns
}

/// Map a timestamp to its knot segment index and the normalized position
/// `u` in `[0, 1)` within that segment.
pub(crate) fn locate(
    t_ns: TimeNs,
    t0_ns: TimeNs,
    dt_ns: i64,
    num_knots: usize,
    order: usize,
) -> Result<(usize, f64), SplineError> {
    let max_ns = domain_end_ns(t0_ns, dt_ns, num_knots, order);
    if t_ns < t0_ns || t_ns >= max_ns {
        return Err(SplineError::OutOfDomain {
            t_ns,
            min_ns: t0_ns,
            max_ns,
        });
    }
    let rel = t_ns - t0_ns;
    let idx = (rel / dt_ns) as usize;
    let u = (rel % dt_ns) as f64 / dt_ns as f64;
    Ok((idx, u))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_maps_segment_boundaries() {
        // 7 knots, order 5: domain is [100, 100 + 3 * 10).
        let (idx, u) = locate(100, 100, 10, 7, 5).unwrap();
        assert_eq!((idx, u), (0, 0.0));
        let (idx, u) = locate(115, 100, 10, 7, 5).unwrap();
        assert_eq!((idx, u), (1, 0.5));
        let (idx, u) = locate(129, 100, 10, 7, 5).unwrap();
        assert_eq!((idx, u), (2, 0.9));
    }

    #[test]
    fn locate_rejects_out_of_domain() {
        assert!(matches!(
            locate(99, 100, 10, 7, 5),
            Err(SplineError::OutOfDomain { .. })
        ));
        // The exclusive upper bound itself is out of domain.
        assert!(matches!(
            locate(130, 100, 10, 7, 5),
            Err(SplineError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn short_knot_vector_has_empty_domain() {
        assert_eq!(domain_end_ns(100, 10, 4, 5), 100);
        assert!(locate(100, 100, 10, 4, 5).is_err());
    }
}
