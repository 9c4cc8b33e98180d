//! Per-connection read loop.
//!
//! Frames are read one at a time and each decoded record is fully dispatched
//! before the next frame is read, so a connection's records reach the sinks in
//! the order they were sent.

use tokio::io::AsyncRead;
use uuid::Uuid;

use crate::error::VitalinkError;
use crate::sinks::SinkSet;
use crate::types::TelemetryRecord;
use crate::wire::{self, FrameReader};

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// Peer closed the stream between frames.
    PeerClosed,
    /// Transport error or unsynchronized framing; the connection was dropped.
    Aborted(VitalinkError),
}

#[derive(Debug)]
pub struct SessionSummary {
    pub id: Uuid,
    pub peer: String,
    /// Records decoded and dispatched.
    pub records: u64,
    /// Framed records that failed to decode.
    pub skipped: u64,
    /// Individual sink writes that failed.
    pub sink_failures: u64,
    pub end: SessionEnd,
}

pub struct Session<R> {
    id: Uuid,
    peer: String,
    reader: FrameReader<R>,
    sinks: SinkSet,
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(stream: R, peer: impl Into<String>, sinks: SinkSet) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer: peer.into(),
            reader: FrameReader::new(stream),
            sinks,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Consume the connection until it closes or breaks. Never panics on input.
    pub async fn run(mut self) -> SessionSummary {
        let mut records = 0;
        let mut skipped = 0;
        let mut sink_failures = 0;

        let end = loop {
            let record = match self.reader.next_frame().await {
                Ok(Some(frame)) => wire::decode(frame),
                Ok(None) => break SessionEnd::PeerClosed,
                Err(e) => break SessionEnd::Aborted(e),
            };

            match record {
                Ok(record) => {
                    log_received(&self.peer, &record);
                    let report = self.sinks.dispatch(&record).await;
                    sink_failures += report.failures() as u64;
                    records += 1;
                }
                Err(e) if e.is_recoverable() => {
                    skipped += 1;
                    log::warn!("[Session {}] Skipping record from {}: {}", self.id, self.peer, e);
                }
                Err(e) => break SessionEnd::Aborted(e),
            }
        };

        match &end {
            SessionEnd::PeerClosed => log::info!(
                "[Session {}] Peer {} disconnected after {} records ({} skipped)",
                self.id,
                self.peer,
                records,
                skipped
            ),
            SessionEnd::Aborted(e) => log::error!(
                "[Session {}] Dropping {} after {} records: {}",
                self.id,
                self.peer,
                records,
                e
            ),
        }

        SessionSummary {
            id: self.id,
            peer: self.peer,
            records,
            skipped,
            sink_failures,
            end,
        }
    }
}

fn log_received(peer: &str, record: &TelemetryRecord) {
    log::info!(
        "[Collector] Received data at {} from {}: HR={} SpO2={} fall={} | BP warning: {} | Fall warning: {}",
        record.timestamp,
        peer,
        record.heart_rate,
        record.spo2,
        record.fall_detected,
        record.bp_warning_text(),
        record.fall_warning_text(),
    );
}
