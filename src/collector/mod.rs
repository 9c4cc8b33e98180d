//! Collector side: accept producer connections and fan records out to sinks.

pub mod server;
pub mod session;

pub use server::{CollectorServer, ServerStats};
pub use session::{Session, SessionEnd, SessionSummary};
