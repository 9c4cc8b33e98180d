//! Accept loop. Every connection gets its own task running a `Session`;
//! the only thing sessions share is the `SinkSet`.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};
use tokio::time::sleep;

use super::session::{Session, SessionEnd, SessionSummary};
use crate::error::{Result, VitalinkError};
use crate::sinks::SinkSet;

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Totals over finished sessions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub connections: u64,
    pub sessions_finished: u64,
    pub sessions_aborted: u64,
    pub records: u64,
    pub skipped: u64,
    pub sink_failures: u64,
}

impl ServerStats {
    fn absorb(&mut self, summary: &SessionSummary) {
        self.sessions_finished += 1;
        if matches!(summary.end, SessionEnd::Aborted(_)) {
            self.sessions_aborted += 1;
        }
        self.records += summary.records;
        self.skipped += summary.skipped;
        self.sink_failures += summary.sink_failures;
    }

    fn reap(&mut self, joined: std::result::Result<SessionSummary, JoinError>) {
        match joined {
            Ok(summary) => self.absorb(&summary),
            Err(e) if e.is_cancelled() => {
                log::debug!("[Collector] Session cancelled at shutdown");
            }
            Err(e) => {
                // A panicking session only takes itself down.
                log::error!("[Collector] Session task failed: {}", e);
                self.sessions_finished += 1;
                self.sessions_aborted += 1;
            }
        }
    }
}

pub struct CollectorServer {
    listener: TcpListener,
    sinks: SinkSet,
}

impl CollectorServer {
    pub async fn bind(addr: &str, sinks: SinkSet) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| VitalinkError::Transport(format!("failed to bind {}: {}", addr, e)))?;
        Ok(Self { listener, sinks })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves, then abort the sessions
    /// still open and return the totals of those that finished.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<ServerStats>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        log::info!("[Collector] Listening on {}", addr);

        let mut stats = ServerStats::default();
        let mut sessions: JoinSet<SessionSummary> = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    log::info!("[Collector] Shutting down, {} sessions open", sessions.len());
                    break;
                }
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    stats.reap(joined);
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            stats.connections += 1;
                            if let Err(e) = stream.set_nodelay(true) {
                                log::debug!("[Collector] TCP_NODELAY on {}: {}", peer, e);
                            }
                            let session = Session::new(stream, peer.to_string(), self.sinks.clone());
                            log::info!("[Collector] Connection from {} established (session {})", peer, session.id());
                            sessions.spawn(session.run());
                        }
                        Err(e) => {
                            log::warn!("[Collector] Failed to accept connection: {}", e);
                            sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }

        // Sessions that already finished still count; the rest are cut off.
        sessions.abort_all();
        while let Some(joined) = sessions.join_next().await {
            stats.reap(joined);
        }
        Ok(stats)
    }

    /// Accept connections forever.
    pub async fn serve(self) -> Result<ServerStats> {
        self.serve_until(std::future::pending()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::{MemoryHistory, MemoryLog, MemoryMirror};
    use crate::types::TelemetryRecord;
    use crate::wire;
    use std::sync::Arc;
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    fn record(hr: u32) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: format!("2024-05-01T10:00:{:02}Z", hr % 60),
            heart_rate: hr,
            spo2: 97,
            accel_x: 0.0,
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

    async fn wait_for(log: &MemoryLog, n: usize) {
        for _ in 0..200 {
            if log.len() >= n {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} records, have {}", n, log.len());
    }

    #[tokio::test]
    async fn test_broken_session_does_not_stop_server() {
        let log = Arc::new(MemoryLog::new());
        let sinks = SinkSet::new(
            log.clone(),
            Arc::new(MemoryMirror::new()),
            Arc::new(MemoryHistory::new()),
        );
        let server = CollectorServer::bind("127.0.0.1:0", sinks).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let serving = tokio::spawn(server.serve_until(async move {
            let _ = stop_rx.await;
        }));

        // First peer sends a bogus length and hangs up.
        let mut bad = TcpStream::connect(addr).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut bad, &[0xff; 4]).await.unwrap();
        drop(bad);

        // Second peer is healthy.
        let mut good = TcpStream::connect(addr).await.unwrap();
        wire::send_record(&mut good, &record(70)).await.unwrap();
        wire::send_record(&mut good, &record(71)).await.unwrap();
        wait_for(&log, 2).await;
        drop(good);

        sleep(Duration::from_millis(50)).await;
        stop_tx.send(()).unwrap();
        let stats = serving.await.unwrap().unwrap();
        assert_eq!(stats.connections, 2);
        assert_eq!(stats.records, 2);
        assert_eq!(stats.sessions_aborted, 1);
    }
}
