//! types/reading.rs
//!
//! Raw samples coming out of the sensor capabilities and the SensorReading
//! snapshot assembled from them once per sampling cycle.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A three-axis vector in device units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean magnitude.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Raw photodiode counts from the pulse oximeter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpticalSample {
    pub ir: u32,
    pub red: u32,
}

/// One accelerometer + gyroscope read.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionSample {
    pub accel: Vector3,
    pub gyro: Vector3,
}

/// Snapshot of one sampling cycle. Built once and never mutated.
#[derive(Clone, Debug)]
pub struct SensorReading {
    /// Capture time, sent on the wire as RFC 3339.
    pub timestamp: DateTime<Utc>,
    pub heart_rate: u32,
    pub spo2: u32,
    pub accel: Vector3,
    pub gyro: Vector3,
}

impl SensorReading {
    pub fn new(heart_rate: u32, spo2: u32, motion: MotionSample) -> Self {
        Self {
            timestamp: Utc::now(),
            heart_rate,
            spo2,
            accel: motion.accel,
            gyro: motion.gyro,
        }
    }

    /// ISO-8601 timestamp with microsecond precision, e.g. `2024-05-01T10:15:30.123456Z`.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}
