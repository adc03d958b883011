//! Locked pinhole camera intrinsics.
//!
//! The calibration treats the camera model as the output of a prior intrinsic
//! calibration: it is read, never optimized.

use crate::{Pt3, Real, Vec2};
use serde::{Deserialize, Serialize};

/// Depth below which a point counts as behind the camera.
pub const MIN_PROJECTION_DEPTH: Real = 1e-9;

/// Pinhole intrinsics `[fx, fy, cx, cy]`, zero skew, no distortion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinholeIntrinsics {
    pub fx: Real,
    pub fy: Real,
    pub cx: Real,
    pub cy: Real,
}

impl PinholeIntrinsics {
    pub fn new(fx: Real, fy: Real, cx: Real, cy: Real) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Project a camera-frame point to pixel coordinates.
    ///
    /// Returns `None` for points at or behind the camera plane.
    pub fn project_point(&self, p: &Pt3) -> Option<Vec2> {
        if p.z <= MIN_PROJECTION_DEPTH {
            return None;
        }
        Some(Vec2::new(
            self.fx * p.x / p.z + self.cx,
            self.fy * p.y / p.z + self.cy,
        ))
    }
}
