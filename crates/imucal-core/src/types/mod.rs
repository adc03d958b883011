//! Canonical data types exchanged between calibration stages.

pub mod artifacts;
pub mod imu;
pub mod observation;
pub mod state;

pub use artifacts::{ImuBiasInit, RoughAlignment, SplineWeighting};
pub use imu::{ImuSample, TelemetryStream};
pub use observation::{CornerObservation, LandmarkTable, TimestampedPose, TrackObservation};
pub use state::CalibrationState;
