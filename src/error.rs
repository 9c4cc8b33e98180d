//! Error types shared by the producer and the collector.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, VitalinkError>;

#[derive(Error, Debug)]
pub enum VitalinkError {
    /// A sensor could not be read (or did not answer in time). Fatal to the producer.
    #[error("Sensor unavailable ({sensor}): {reason}")]
    SensorUnavailable { sensor: &'static str, reason: String },

    /// The byte stream is broken. Fatal to the affected session or producer loop.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A framed record could not be decoded. Only that record is dropped.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// One sink rejected a write. The remaining sinks are still attempted.
    #[error("Sink write failure ({sink}): {reason}")]
    SinkWrite { sink: &'static str, reason: String },

    #[error("Frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Actuator error: {0}")]
    Actuator(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VitalinkError {
    /// Errors after which the record stream can still be trusted.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VitalinkError::MalformedRecord(_)
                | VitalinkError::SinkWrite { .. }
                | VitalinkError::Actuator(_)
        )
    }

    pub(crate) fn sink(sink: &'static str, reason: impl ToString) -> Self {
        VitalinkError::SinkWrite {
            sink,
            reason: reason.to_string(),
        }
    }
}
