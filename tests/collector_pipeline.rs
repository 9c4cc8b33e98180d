//! Collector integration: real TCP connections, concurrent producers and
//! sink failure isolation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use vitalink::collector::{CollectorServer, ServerStats};
use vitalink::producer::TelemetryLink;
use vitalink::sinks::{DurableLog, MemoryHistory, MemoryLog, MemoryMirror, SinkSet};
use vitalink::types::TelemetryRecord;
use vitalink::wire;
use vitalink::{Result, VitalinkError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record(connection: u32, seq: u32) -> TelemetryRecord {
    TelemetryRecord {
        timestamp: format!("2024-05-01T10:{:02}:{:02}.000000Z", connection, seq),
        heart_rate: connection * 100 + seq,
        spo2: 97,
        accel_x: 0.1 * seq as f64,
        accel_y: 0.0,
        accel_z: 9.81,
        gyro_x: 0.0,
        gyro_y: 0.0,
        gyro_z: 0.0,
        fall_detected: false,
        bp_warning: None,
        fall_warning: None,
    }
}

struct Harness {
    addr: std::net::SocketAddr,
    stop: oneshot::Sender<()>,
    serving: JoinHandle<Result<ServerStats>>,
}

impl Harness {
    async fn start(sinks: SinkSet) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let server = CollectorServer::bind("127.0.0.1:0", sinks).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (stop, stop_rx) = oneshot::channel::<()>();
        let serving = tokio::spawn(server.serve_until(async move {
            let _ = stop_rx.await;
        }));
        Self { addr, stop, serving }
    }

    async fn stop(self) -> ServerStats {
        self.stop.send(()).unwrap();
        self.serving.await.unwrap().unwrap()
    }
}

async fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    for _ in 0..500 {
        if done() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

struct FailingLog;

#[async_trait]
impl DurableLog for FailingLog {
    async fn append(&self, _record: &TelemetryRecord) -> Result<()> {
        Err(VitalinkError::SinkWrite {
            sink: "failing_log",
            reason: "disk full".into(),
        })
    }

    fn name(&self) -> &'static str {
        "failing_log"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_producers_keep_per_connection_order() {
    const CONNECTIONS: u32 = 4;
    const PER_CONNECTION: u32 = 25;

    let log = Arc::new(MemoryLog::new());
    let mirror = Arc::new(MemoryMirror::new());
    let history = Arc::new(MemoryHistory::new());
    let harness = Harness::start(SinkSet::new(log.clone(), mirror.clone(), history.clone())).await;

    let mut producers = Vec::new();
    for connection in 0..CONNECTIONS {
        let addr = harness.addr.to_string();
        producers.push(tokio::spawn(async move {
            let mut link = TelemetryLink::connect(&addr, Duration::from_secs(5)).await.unwrap();
            for seq in 0..PER_CONNECTION {
                link.send(&record(connection, seq)).await.unwrap();
            }
            link.close().await.unwrap();
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    let total = (CONNECTIONS * PER_CONNECTION) as usize;
    wait_until("all records", || log.len() == total && history.len() == total).await;

    let keys = history.keys();
    assert_eq!(keys.len(), total);
    assert!(keys.contains(&"2024-05-01T10_03_24_000000Z".to_string()));

    let rows = log.records();
    for connection in 0..CONNECTIONS {
        let seqs: Vec<u32> = rows
            .iter()
            .filter(|r| r.heart_rate / 100 == connection)
            .map(|r| r.heart_rate % 100)
            .collect();
        assert_eq!(seqs, (0..PER_CONNECTION).collect::<Vec<_>>(), "connection {}", connection);
    }

    // The mirror holds the last record of whichever connection wrote last.
    let current = mirror.current().unwrap();
    let lasts: Vec<_> = (0..CONNECTIONS)
        .map(|c| record(c, PER_CONNECTION - 1).snapshot())
        .collect();
    assert!(lasts.contains(&current), "unexpected mirror value {:?}", current);
    assert_eq!(mirror.writes(), total as u64);

    sleep(Duration::from_millis(50)).await;
    let stats = harness.stop().await;
    assert_eq!(stats.connections, CONNECTIONS as u64);
    assert_eq!(stats.records, total as u64);
    assert_eq!(stats.sessions_aborted, 0);
}

#[tokio::test]
async fn malformed_record_skipped_over_tcp() {
    let log = Arc::new(MemoryLog::new());
    let sinks = SinkSet::new(
        log.clone(),
        Arc::new(MemoryMirror::new()),
        Arc::new(MemoryHistory::new()),
    );
    let harness = Harness::start(sinks).await;

    let mut stream = TcpStream::connect(harness.addr).await.unwrap();
    wire::write_frame(&mut stream, b"{not json").await.unwrap();
    wire::send_record(&mut stream, &record(1, 1)).await.unwrap();
    drop(stream);

    wait_until("good record", || log.len() == 1).await;
    assert_eq!(log.records(), vec![record(1, 1)]);

    // Give the session a moment to observe the close before stopping.
    sleep(Duration::from_millis(50)).await;
    let stats = harness.stop().await;
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.records, 1);
}

#[tokio::test]
async fn failing_log_does_not_block_other_sinks() {
    let mirror = Arc::new(MemoryMirror::new());
    let history = Arc::new(MemoryHistory::new());
    let harness = Harness::start(SinkSet::new(Arc::new(FailingLog), mirror.clone(), history.clone())).await;

    let mut link = TelemetryLink::connect(&harness.addr.to_string(), Duration::from_secs(5))
        .await
        .unwrap();
    link.send(&record(2, 0)).await.unwrap();
    link.send(&record(2, 1)).await.unwrap();
    link.close().await.unwrap();

    wait_until("history entries", || history.len() == 2).await;
    assert_eq!(mirror.current(), Some(record(2, 1).snapshot()));
    assert_eq!(
        history.get("2024-05-01T10_02_01_000000Z"),
        Some(record(2, 1).history_entry())
    );

    sleep(Duration::from_millis(50)).await;
    let stats = harness.stop().await;
    assert_eq!(stats.records, 2);
    assert_eq!(stats.sink_failures, 2);
}
