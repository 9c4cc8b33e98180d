//! types/record.rs
//!
//! TelemetryRecord is the unit of transmission, logging and mirroring. It is the
//! flattened SensorReading plus the alert strings of that cycle. The mirror and
//! history sinks store projections of it (`RealtimeSnapshot`, `HistoryEntry`).

use serde::{Deserialize, Serialize};

use super::reading::SensorReading;

/// Wire value standing in for an absent warning.
pub const NO_WARNING: &str = "None";

/// Column order of the wire object and of the durable log header.
pub const FIELD_NAMES: [&str; 12] = [
    "Timestamp",
    "HeartRate",
    "SpO2",
    "AccelX",
    "AccelY",
    "AccelZ",
    "GyroX",
    "GyroY",
    "GyroZ",
    "FallDetected",
    "BPWarning",
    "FallWarning",
];

/// Encodes `Option<String>` as the `"None"` sentinel so the field is never omitted.
mod warning_sentinel {
    use super::NO_WARNING;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(NO_WARNING))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(if raw == NO_WARNING { None } else { Some(raw) })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "HeartRate")]
    pub heart_rate: u32,
    #[serde(rename = "SpO2")]
    pub spo2: u32,
    #[serde(rename = "AccelX")]
    pub accel_x: f64,
    #[serde(rename = "AccelY")]
    pub accel_y: f64,
    #[serde(rename = "AccelZ")]
    pub accel_z: f64,
    #[serde(rename = "GyroX")]
    pub gyro_x: f64,
    #[serde(rename = "GyroY")]
    pub gyro_y: f64,
    #[serde(rename = "GyroZ")]
    pub gyro_z: f64,
    #[serde(rename = "FallDetected")]
    pub fall_detected: bool,
    #[serde(rename = "BPWarning", with = "warning_sentinel")]
    pub bp_warning: Option<String>,
    #[serde(rename = "FallWarning", with = "warning_sentinel")]
    pub fall_warning: Option<String>,
}

impl TelemetryRecord {
    pub fn from_reading(
        reading: &SensorReading,
        fall_detected: bool,
        bp_warning: Option<&str>,
        fall_warning: Option<&str>,
    ) -> Self {
        Self {
            timestamp: reading.timestamp_iso(),
            heart_rate: reading.heart_rate,
            spo2: reading.spo2,
            accel_x: reading.accel.x,
            accel_y: reading.accel.y,
            accel_z: reading.accel.z,
            gyro_x: reading.gyro.x,
            gyro_y: reading.gyro.y,
            gyro_z: reading.gyro.z,
            fall_detected,
            bp_warning: bp_warning.map(str::to_string),
            fall_warning: fall_warning.map(str::to_string),
        }
    }

    /// Warning text as it appears on the wire.
    pub fn bp_warning_text(&self) -> &str {
        self.bp_warning.as_deref().unwrap_or(NO_WARNING)
    }

    pub fn fall_warning_text(&self) -> &str {
        self.fall_warning.as_deref().unwrap_or(NO_WARNING)
    }

    pub fn snapshot(&self) -> RealtimeSnapshot {
        RealtimeSnapshot {
            heart_rate: self.heart_rate,
            spo2: self.spo2,
            fall_detected: self.fall_detected,
            bp_warning: self.bp_warning.clone(),
            fall_warning: self.fall_warning.clone(),
        }
    }

    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            heart_rate: self.heart_rate,
            spo2: self.spo2,
            accel_x: self.accel_x,
            accel_y: self.accel_y,
            accel_z: self.accel_z,
            gyro_x: self.gyro_x,
            gyro_y: self.gyro_y,
            gyro_z: self.gyro_z,
            fall_detected: self.fall_detected,
            bp_warning: self.bp_warning.clone(),
            fall_warning: self.fall_warning.clone(),
        }
    }
}

/// Latest-state slot kept by the real-time mirror.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RealtimeSnapshot {
    #[serde(rename = "HeartRate")]
    pub heart_rate: u32,
    #[serde(rename = "SpO2")]
    pub spo2: u32,
    #[serde(rename = "FallDetected")]
    pub fall_detected: bool,
    #[serde(rename = "BPWarning", with = "warning_sentinel")]
    pub bp_warning: Option<String>,
    #[serde(rename = "FallWarning", with = "warning_sentinel")]
    pub fall_warning: Option<String>,
}

/// Keyed-history entry; the timestamp lives in the key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "HeartRate")]
    pub heart_rate: u32,
    #[serde(rename = "SpO2")]
    pub spo2: u32,
    #[serde(rename = "AccelX")]
    pub accel_x: f64,
    #[serde(rename = "AccelY")]
    pub accel_y: f64,
    #[serde(rename = "AccelZ")]
    pub accel_z: f64,
    #[serde(rename = "GyroX")]
    pub gyro_x: f64,
    #[serde(rename = "GyroY")]
    pub gyro_y: f64,
    #[serde(rename = "GyroZ")]
    pub gyro_z: f64,
    #[serde(rename = "FallDetected")]
    pub fall_detected: bool,
    #[serde(rename = "BPWarning", with = "warning_sentinel")]
    pub bp_warning: Option<String>,
    #[serde(rename = "FallWarning", with = "warning_sentinel")]
    pub fall_warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::reading::{MotionSample, Vector3};

    fn sample() -> TelemetryRecord {
        let reading = SensorReading::new(
            45,
            97,
            MotionSample {
                accel: Vector3::new(0.1, -9.7, 0.3),
                gyro: Vector3::new(1.5, 0.0, -2.25),
            },
        );
        TelemetryRecord::from_reading(&reading, true, Some("low"), None)
    }

    #[test]
    fn test_absent_warning_serializes_as_sentinel() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["FallWarning"], "None");
        assert_eq!(json["BPWarning"], "low");
        assert_eq!(json["FallDetected"], true);
        assert_eq!(json.as_object().unwrap().len(), FIELD_NAMES.len());
        for name in FIELD_NAMES {
            assert!(json.get(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn test_sentinel_deserializes_to_none() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["BPWarning"] = "None".into();
        let record: TelemetryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.bp_warning, None);
        assert_eq!(record.bp_warning_text(), "None");
    }

    #[test]
    fn test_projections_drop_fields() {
        let record = sample();
        let snapshot = serde_json::to_value(record.snapshot()).unwrap();
        assert_eq!(snapshot.as_object().unwrap().len(), 5);
        assert_eq!(snapshot["HeartRate"], 45);

        let entry = serde_json::to_value(record.history_entry()).unwrap();
        assert!(entry.get("Timestamp").is_none());
        assert_eq!(entry.as_object().unwrap().len(), 11);
        assert_eq!(entry["GyroZ"], -2.25);
    }
}
