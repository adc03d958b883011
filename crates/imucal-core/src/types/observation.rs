//! Camera-side observation types.
//!
//! Poses and corner detections come from a prior intrinsic calibration of the
//! camera; they are immutable inputs here.

use crate::{Iso3, Pt3, TimeNs, Vec2};
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// A camera pose at a known timestamp, expressed as `world_from_cam`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedPose {
    /// Frame timestamp in nanoseconds (camera clock).
    pub t_ns: TimeNs,
    /// Camera identifier within the rig.
    pub cam_id: u32,
    /// Rigid transform mapping camera-frame points into the world frame.
    pub world_from_cam: Iso3,
}

/// One detected 2D corner tied to a landmark in the [`LandmarkTable`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrackObservation {
    /// Index into the landmark table.
    pub track_id: usize,
    /// Pixel observation.
    pub uv: Vec2,
}

/// All corner detections of one camera frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CornerObservation {
    /// Frame timestamp in nanoseconds (camera clock).
    pub t_ns: TimeNs,
    /// Camera identifier within the rig.
    pub cam_id: u32,
    /// Detected corners.
    pub corners: Vec<TrackObservation>,
}

/// Fixed table of triangulated 3D landmarks in the world frame.
///
/// Landmark geometry is locked: `track_id` values in corner observations
/// index into `points` and must stay in range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkTable {
    pub points: Vec<Pt3>,
}

impl LandmarkTable {
    pub fn new(points: Vec<Pt3>) -> Result<Self> {
        ensure!(!points.is_empty(), "landmark table must not be empty");
        Ok(Self { points })
    }

    #[inline]
    pub fn get(&self, track_id: usize) -> Option<&Pt3> {
        self.points.get(track_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_table_rejects_empty() {
        assert!(LandmarkTable::new(Vec::new()).is_err());
    }

    #[test]
    fn landmark_lookup() {
        let table = LandmarkTable::new(vec![Pt3::new(1.0, 2.0, 3.0)]).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get(0).is_some());
        assert!(table.get(1).is_none());
    }

    #[test]
    fn pose_serde_round_trip() {
        let pose = TimestampedPose {
            t_ns: 12_500_000,
            cam_id: 0,
            world_from_cam: Iso3::translation(0.1, -0.2, 1.5),
        };
        let json = serde_json::to_string(&pose).unwrap();
        let back: TimestampedPose = serde_json::from_str(&json).unwrap();
        assert_eq!(back.t_ns, pose.t_ns);
    }
}
