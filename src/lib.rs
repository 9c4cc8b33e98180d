// Vitalink - Wearable Telemetry Pipeline

pub mod collector;
pub mod config;
pub mod devices;
pub mod error;
pub mod producer;
pub mod sinks;
pub mod types;
pub mod wire;

pub use error::{Result, VitalinkError};
