//! Data model shared by the producer and the collector.

pub mod reading;
pub mod record;

pub use reading::{MotionSample, OpticalSample, SensorReading, Vector3};
pub use record::{HistoryEntry, RealtimeSnapshot, TelemetryRecord, FIELD_NAMES, NO_WARNING};
