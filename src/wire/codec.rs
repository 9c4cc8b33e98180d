//! JSON body codec for one TelemetryRecord.

use chrono::{DateTime, NaiveDateTime};

use crate::error::{Result, VitalinkError};
use crate::types::TelemetryRecord;

/// Serialize a record to its JSON body.
///
/// serde_json writes NaN and infinities as `null`, which no collector accepts,
/// so non-finite motion values are refused here.
pub fn encode(record: &TelemetryRecord) -> Result<Vec<u8>> {
    let motion = [
        ("AccelX", record.accel_x),
        ("AccelY", record.accel_y),
        ("AccelZ", record.accel_z),
        ("GyroX", record.gyro_x),
        ("GyroY", record.gyro_y),
        ("GyroZ", record.gyro_z),
    ];
    if let Some((field, value)) = motion.iter().find(|(_, v)| !v.is_finite()) {
        return Err(VitalinkError::Serialization(format!(
            "{} is not a finite number: {}",
            field, value
        )));
    }

    serde_json::to_vec(record).map_err(|e| VitalinkError::Serialization(e.to_string()))
}

/// Parse and validate a JSON body. Any failure is `MalformedRecord`.
pub fn decode(body: &[u8]) -> Result<TelemetryRecord> {
    let record: TelemetryRecord =
        serde_json::from_slice(body).map_err(|e| VitalinkError::MalformedRecord(e.to_string()))?;

    if !is_iso8601(&record.timestamp) {
        return Err(VitalinkError::MalformedRecord(format!(
            "Timestamp is not ISO-8601: {:?}",
            record.timestamp
        )));
    }

    Ok(record)
}

/// Accepts RFC 3339 as well as offset-less `YYYY-MM-DDTHH:MM:SS[.ffffff]`.
fn is_iso8601(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> TelemetryRecord {
        TelemetryRecord {
            timestamp: "2024-05-01T10:15:30.123456Z".into(),
            heart_rate: 45,
            spo2: 96,
            accel_x: 0.12,
            accel_y: -9.81,
            accel_z: 0.333333333333,
            gyro_x: 1.0e-3,
            gyro_y: 250.5,
            gyro_z: -0.1,
            fall_detected: true,
            bp_warning: Some("BP too low – Stay hydrated and consult a doctor if symptoms persist.".into()),
            fall_warning: None,
        }
    }

    #[test]
    fn test_round_trip_is_identity() {
        let original = record();
        let decoded = decode(&encode(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_non_finite_motion_is_not_encoded() {
        let mut glitched = record();
        glitched.accel_x = f64::NAN;
        let err = encode(&glitched).unwrap_err();
        assert!(matches!(err, VitalinkError::Serialization(ref m) if m.contains("AccelX")));

        let mut glitched = record();
        glitched.gyro_z = f64::NEG_INFINITY;
        assert!(matches!(encode(&glitched), Err(VitalinkError::Serialization(_))));

        let mut glitched = record();
        glitched.accel_z = f64::INFINITY;
        assert!(matches!(encode(&glitched), Err(VitalinkError::Serialization(_))));
    }

    #[test]
    fn test_accepts_offsetless_timestamp() {
        let mut body = serde_json::to_value(record()).unwrap();
        body["Timestamp"] = json!("2024-05-01T10:15:30.123456");
        let decoded = decode(&serde_json::to_vec(&body).unwrap()).unwrap();
        assert_eq!(decoded.timestamp, "2024-05-01T10:15:30.123456");
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let mut body = serde_json::to_value(record()).unwrap();
        body.as_object_mut().unwrap().remove("SpO2");
        let err = decode(&serde_json::to_vec(&body).unwrap()).unwrap_err();
        assert!(matches!(err, VitalinkError::MalformedRecord(_)));
    }

    #[test]
    fn test_wrong_type_is_malformed() {
        let mut body = serde_json::to_value(record()).unwrap();
        body["FallDetected"] = json!("yes");
        assert!(matches!(
            decode(&serde_json::to_vec(&body).unwrap()),
            Err(VitalinkError::MalformedRecord(_))
        ));

        let mut body = serde_json::to_value(record()).unwrap();
        body["BPWarning"] = json!(null);
        assert!(matches!(
            decode(&serde_json::to_vec(&body).unwrap()),
            Err(VitalinkError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        let mut body = serde_json::to_value(record()).unwrap();
        body["Timestamp"] = json!("yesterday");
        assert!(matches!(
            decode(&serde_json::to_vec(&body).unwrap()),
            Err(VitalinkError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(decode(b"{not json"), Err(VitalinkError::MalformedRecord(_))));
        assert!(matches!(decode(b""), Err(VitalinkError::MalformedRecord(_))));
    }
}
