//! Stream framing for packets.
//!
//! Packets carry their own length in the cleartext header, so framing
//! only needs to peek at that field and wait for the full frame. The
//! codec deliberately hands frames around as raw bytes: decryption and
//! payload decoding happen later, once a key has been selected.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{CHECKSUM_SIZE, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::error::ProtocolError;

/// Tokio codec for packet framing.
pub struct PacketCodec {
    max_payload_size: usize,
}

impl PacketCodec {
    /// Create a new codec with default settings.
    pub fn new() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
        }
    }

    /// Create a codec with a custom max payload size.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PacketCodec {
    type Item = Vec<u8>;
    type Error = crate::Error;

    fn decode(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        // Need the cleartext header to know the frame size.
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let payload_len = usize::from(u16::from_le_bytes([src[2], src[3]]));

        if payload_len > self.max_payload_size {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: self.max_payload_size,
            }
            .into());
        }

        let total_len = HEADER_SIZE + payload_len + CHECKSUM_SIZE;

        // Wait for the complete frame.
        if src.len() < total_len {
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        Ok(Some(src.split_to(total_len).to_vec()))
    }
}

impl Encoder<Vec<u8>> for PacketCodec {
    type Error = crate::Error;

    fn encode(
        &mut self,
        item: Vec<u8>,
        dst: &mut BytesMut,
    ) -> std::result::Result<(), Self::Error> {
        if item.len() < HEADER_SIZE + CHECKSUM_SIZE {
            return Err(ProtocolError::MalformedPacket(format!(
                "frame of {} bytes cannot hold a packet",
                item.len()
            ))
            .into());
        }

        let payload_len = usize::from(u16::from_le_bytes([item[2], item[3]]));
        if payload_len > self.max_payload_size {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: self.max_payload_size,
            }
            .into());
        }
        if item.len() != HEADER_SIZE + payload_len + CHECKSUM_SIZE {
            return Err(ProtocolError::MalformedPacket(format!(
                "frame length {} does not match declared payload length {payload_len}",
                item.len()
            ))
            .into());
        }

        dst.reserve(item.len());
        dst.put_slice(&item);

        Ok(())
    }
}
