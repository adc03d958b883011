//! Raw inertial telemetry.

use crate::{TimeNs, Vec3};
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// One accelerometer or gyroscope reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImuSample {
    /// Sample timestamp in nanoseconds (IMU clock).
    pub t_ns: TimeNs,
    /// Measured value: rad/s for gyro, m/s^2 for accel.
    pub value: Vec3,
}

/// Accelerometer and gyroscope streams at their native (possibly different)
/// rates. Each stream must be strictly increasing in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryStream {
    pub accel: Vec<ImuSample>,
    pub gyro: Vec<ImuSample>,
}

impl TelemetryStream {
    pub fn new(accel: Vec<ImuSample>, gyro: Vec<ImuSample>) -> Result<Self> {
        ensure_monotonic(&accel, "accelerometer")?;
        ensure_monotonic(&gyro, "gyroscope")?;
        Ok(Self { accel, gyro })
    }
}

fn ensure_monotonic(samples: &[ImuSample], label: &str) -> Result<()> {
    for pair in samples.windows(2) {
        ensure!(
            pair[0].t_ns < pair[1].t_ns,
            "{} stream timestamps must be strictly increasing: {} then {}",
            label,
            pair[0].t_ns,
            pair[1].t_ns
        );
    }
    Ok(())
}
