use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{HbMessage, MAX_MESSAGE_SIZE};

/// Codec for encoding/decoding hashback protocol messages.
pub struct HbCodec;

impl HbCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    pub fn encode(msg: &HbMessage) -> ProtocolResult<Vec<u8>> {
        Self::encode_with_limit(msg, MAX_MESSAGE_SIZE)
    }

    /// Encode, rejecting payloads above `max` bytes.
    pub fn encode_with_limit(msg: &HbMessage, max: usize) -> ProtocolResult<Vec<u8>> {
        let payload = Self::encode_payload(msg)?;
        if payload.len() > max {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = Vec::with_capacity(4 + 1 + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> ProtocolResult<(HbMessage, usize)> {
        Self::decode_with_limit(data, MAX_MESSAGE_SIZE)
    }

    pub fn decode_with_limit(data: &[u8], max: usize) -> ProtocolResult<(HbMessage, usize)> {
        if data.len() < 5 {
            return Err(ProtocolError::Framing("too short".into()));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&data[0..4]);
        let len = u32::from_be_bytes(len_bytes) as usize;
        if len < 1 {
            return Err(ProtocolError::Framing("zero-length frame".into()));
        }
        if len - 1 > max {
            return Err(ProtocolError::FrameTooLarge { size: len - 1, max });
        }
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::Framing(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = Self::decode_frame(data[4], &data[5..total])?;
        Ok((msg, total))
    }

    /// Decode the body of a frame whose length prefix was already consumed.
    pub fn decode_frame(tag: u8, payload: &[u8]) -> ProtocolResult<HbMessage> {
        let msg = Self::decode_payload(payload)?;
        if msg.type_tag() != tag {
            return Err(ProtocolError::TagMismatch(tag));
        }
        Ok(msg)
    }

    /// Encode payload only (no framing).
    pub fn encode_payload(msg: &HbMessage) -> ProtocolResult<Vec<u8>> {
        Ok(bincode::serialize(msg)?)
    }

    /// Decode payload only (no framing).
    pub fn decode_payload(data: &[u8]) -> ProtocolResult<HbMessage> {
        Ok(bincode::deserialize(data)?)
    }
}
