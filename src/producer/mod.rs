//! Edge side of the pipeline: sample, detect, alert, transmit.

pub mod alerts;
pub mod cycle;
pub mod fall;
pub mod link;
pub mod vitals;

pub use alerts::{AlertDescriptor, AlertEvaluator, AlertOutcome, AlertThresholds};
pub use cycle::{ProducerLoop, ProducerState, ProducerSummary, StopReason};
pub use fall::{FallDetector, FallDetectorState, DEFAULT_FALL_THRESHOLD};
pub use link::TelemetryLink;
pub use vitals::{PlaceholderVitals, Vitals, VitalsModel};
