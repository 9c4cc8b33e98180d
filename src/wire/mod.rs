//! Wire protocol between producer and collector: one JSON record per
//! length-prefixed frame.

pub mod codec;
pub mod frame;

pub use codec::{decode, encode};
pub use frame::{write_frame, FrameReader, MAX_FRAME_LEN};

use tokio::io::AsyncWrite;

use crate::error::Result;
use crate::types::TelemetryRecord;

/// Encode a record and write it as one frame.
pub async fn send_record<W>(writer: &mut W, record: &TelemetryRecord) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = encode(record)?;
    write_frame(writer, &body).await
}
