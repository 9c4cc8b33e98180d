//! Length-prefixed framing over a reliable byte stream.
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Body (variable)          │
//! │ Big-endian u32   │ JSON TelemetryRecord     │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! - A clean close between frames ends the stream normally.
//! - A close inside a frame, or a length above `MAX_FRAME_LEN`, means the
//!   stream can no longer be trusted to be aligned on frame boundaries.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, VitalinkError};

/// Largest accepted frame body (1 MiB).
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

const LEN_PREFIX: usize = 4;

/// Write one frame and flush it.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if body.len() > MAX_FRAME_LEN {
        return Err(VitalinkError::FrameTooLarge {
            size: body.len(),
            limit: MAX_FRAME_LEN,
        });
    }

    // Single buffer so a frame is never interleaved with a partial header.
    let mut frame = Vec::with_capacity(LEN_PREFIX + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(body);

    writer
        .write_all(&frame)
        .await
        .map_err(|e| VitalinkError::Transport(format!("write failed: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| VitalinkError::Transport(format!("flush failed: {}", e)))?;
    Ok(())
}

/// Reads frames from a byte stream, reusing one body buffer.
pub struct FrameReader<R> {
    inner: R,
    buffer: Vec<u8>,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(512),
        }
    }

    /// Next frame body, or `None` once the peer closed the stream cleanly.
    pub async fn next_frame(&mut self) -> Result<Option<&[u8]>> {
        let mut len_buf = [0u8; LEN_PREFIX];
        let mut filled = 0;
        while filled < LEN_PREFIX {
            let n = self
                .inner
                .read(&mut len_buf[filled..])
                .await
                .map_err(|e| VitalinkError::Transport(format!("read failed: {}", e)))?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(VitalinkError::Transport(format!(
                    "stream closed inside length prefix ({} of {} bytes)",
                    filled, LEN_PREFIX
                )));
            }
            filled += n;
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            return Err(VitalinkError::FrameTooLarge {
                size: len,
                limit: MAX_FRAME_LEN,
            });
        }

        self.buffer.clear();
        self.buffer.resize(len, 0);
        self.inner
            .read_exact(&mut self.buffer)
            .await
            .map_err(|e| VitalinkError::Transport(format!("stream closed inside frame body: {}", e)))?;

        Ok(Some(&self.buffer))
    }
}
