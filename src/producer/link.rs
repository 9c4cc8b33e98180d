//! The producer's connection to the collector.
//!
//! One link is owned by one producer run. It is closed explicitly on every
//! exit path of the loop; dropping it also closes the socket.

use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Result, VitalinkError};
use crate::types::TelemetryRecord;
use crate::wire;

pub struct TelemetryLink<S> {
    stream: S,
    peer: String,
    sent: u64,
}

impl TelemetryLink<TcpStream> {
    /// Connect to a collector, giving up after `connect_timeout`.
    pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| VitalinkError::Transport(format!("connect to {} timed out", addr)))?
            .map_err(|e| VitalinkError::Transport(format!("connect to {} failed: {}", addr, e)))?;
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("[Link] Failed to set TCP_NODELAY: {}", e);
        }
        log::info!("[Link] Connected to collector at {}", addr);
        Ok(Self::new(stream, addr))
    }

    /// `connect`, unless `shutdown` resolves first, in which case `Ok(None)`.
    pub async fn connect_until<F>(addr: &str, connect_timeout: Duration, shutdown: F) -> Result<Option<Self>>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = shutdown => {
                log::info!("[Link] Interrupted while connecting to {}", addr);
                Ok(None)
            }
            link = Self::connect(addr, connect_timeout) => link.map(Some),
        }
    }
}

impl<S> TelemetryLink<S>
where
    S: AsyncWrite + Unpin + Send,
{
    /// Wrap an already established stream.
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
            sent: 0,
        }
    }

    /// Send one record as one frame. Any error means the link is broken.
    pub async fn send(&mut self, record: &TelemetryRecord) -> Result<()> {
        wire::send_record(&mut self.stream, record).await?;
        self.sent += 1;
        Ok(())
    }

    pub fn records_sent(&self) -> u64 {
        self.sent
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Flush and shut down the write side so the collector sees a clean close.
    pub async fn close(mut self) -> Result<()> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| VitalinkError::Transport(format!("shutdown of {} failed: {}", self.peer, e)))?;
        log::info!("[Link] Closed connection to {} after {} records", self.peer, self.sent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::FrameReader;
    use tokio::io::duplex;

    fn record(hr: u32) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: "2024-05-01T10:15:30Z".into(),
            heart_rate: hr,
            spo2: 98,
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

    #[tokio::test]
    async fn test_send_then_close() {
        let (client, server) = duplex(1024);
        let mut link = TelemetryLink::new(client, "duplex");
        link.send(&record(70)).await.unwrap();
        link.send(&record(71)).await.unwrap();
        assert_eq!(link.records_sent(), 2);
        link.close().await.unwrap();

        let mut reader = FrameReader::new(server);
        let first = wire::decode(reader.next_frame().await.unwrap().unwrap()).unwrap();
        let second = wire::decode(reader.next_frame().await.unwrap().unwrap()).unwrap();
        assert_eq!((first.heart_rate, second.heart_rate), (70, 71));
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_to_dropped_peer_is_transport_error() {
        let (client, server) = duplex(1024);
        drop(server);
        let mut link = TelemetryLink::new(client, "duplex");
        assert!(matches!(
            link.send(&record(70)).await,
            Err(VitalinkError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_until_interrupted() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let link = TelemetryLink::connect_until(&addr, Duration::from_secs(2), std::future::ready(()))
            .await
            .unwrap();
        assert!(link.is_none());

        let link = TelemetryLink::connect_until(&addr, Duration::from_secs(2), std::future::pending())
            .await
            .unwrap();
        assert_eq!(link.unwrap().peer(), addr);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TelemetryLink::connect(&addr, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(VitalinkError::Transport(_))));
    }
}
