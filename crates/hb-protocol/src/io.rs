//! Reading and writing frames on async streams.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::codec::HbCodec;
use crate::error::{ProtocolError, ProtocolResult};
use crate::message::HbMessage;

/// Read one frame.
///
/// Returns `Ok(None)` when the stream ends cleanly before a new frame
/// starts. A stream ending inside a frame is an error.
pub async fn read_message<R>(reader: &mut R, max: usize) -> ProtocolResult<Option<HbMessage>>
where
    R: AsyncRead + Unpin,
{
    let mut size = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        let n = reader.read(&mut size[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::Framing("stream ended inside length prefix".into()));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(size) as usize;
    if len < 1 {
        return Err(ProtocolError::Framing("zero-length frame".into()));
    }
    if len - 1 > max {
        return Err(ProtocolError::FrameTooLarge { size: len - 1, max });
    }

    let mut buffer = BytesMut::with_capacity(len);
    while buffer.len() < len {
        if reader.read_buf(&mut buffer).await? == 0 {
            return Err(ProtocolError::Framing(format!(
                "stream ended inside frame: have {}, need {}",
                buffer.len(),
                len
            )));
        }
    }
    let msg = HbCodec::decode_frame(buffer[0], &buffer[1..len])?;
    trace!(kind = msg.type_name(), len, "read frame");
    Ok(Some(msg))
}

/// Write one frame and flush.
pub async fn write_message<W>(writer: &mut W, msg: &HbMessage, max: usize) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = HbCodec::encode_with_limit(msg, max)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    trace!(kind = msg.type_name(), len = frame.len(), "wrote frame");
    Ok(())
}
