//! Wire protocol for location queries.
//!
//! Defines the binary packet format shared by requests and responses.
//!
//! ## Packet Format
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ Version (1) │ Reserved (1) │ Payload Len (2 LE) │ User ID (4 LE) │
//! ├────────────────────────────────────────────────────────────────┤
//! │                             IV (16)                            │
//! ├────────────────────────────────────────────────────────────────┤
//! │ Encrypted payload (Payload Len bytes):                         │
//! │   SW Version (1) │ MAC (6) │ Type (1) │ IP (16) │ Timestamp (8)│
//! │   Entries: [tag (1) │ count (1) │ data ...] ...    padding     │
//! ├────────────────────────────────────────────────────────────────┤
//! │ Checksum (2 LE)                                                │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The payload is padded with zero bytes up to a multiple of 16 so the
//! whole region can be block-encrypted in place; a decoder reads the
//! pad bytes as a terminating entry tag. The Fletcher-16 checksum
//! covers the plaintext header and payload.

mod checksum;
mod codec;
mod cursor;
mod packet;
mod records;
mod request;
mod response;

pub use checksum::{fletcher16, Fletcher16};
pub use codec::PacketCodec;
pub use packet::{peek_user_id, PacketHeader, PayloadHeader};
pub use request::{decode_request, encode_request, LocationRequest};
pub use response::{decode_response, encode_response, LocationResponse};

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ProtocolError, Result};

/// Cleartext packet header size in bytes.
pub const HEADER_SIZE: usize = 24;

/// Fixed payload header size in bytes.
pub const PAYLOAD_HEADER_SIZE: usize = 32;

/// Tag byte plus count byte ahead of every data entry.
pub const ENTRY_HEADER_SIZE: usize = 2;

/// Trailing checksum size in bytes.
pub const CHECKSUM_SIZE: usize = 2;

/// Initialization vector size in bytes.
pub const IV_SIZE: usize = 16;

/// Cipher block size. Payload lengths are always a multiple of this.
pub const BLOCK_SIZE: usize = 16;

/// Largest payload length the 16-bit header field can carry while
/// staying block aligned.
pub const MAX_PAYLOAD_SIZE: usize = 65520;

/// Bytes of padding that bring `len` up to a multiple of [`BLOCK_SIZE`].
#[must_use]
pub const fn padding_for(len: usize) -> usize {
    (BLOCK_SIZE - len % BLOCK_SIZE) % BLOCK_SIZE
}

/// Compute and store the trailing checksum of a fully written packet.
pub(crate) fn append_checksum(buf: &mut [u8], payload_len: usize) {
    let end = HEADER_SIZE + payload_len;
    let sum = fletcher16(&buf[..end]);
    LittleEndian::write_u16(&mut buf[end..end + CHECKSUM_SIZE], sum);
}

/// Validate framing and checksum, returning the packet header and the
/// payload region.
pub(crate) fn split_packet(buf: &[u8]) -> Result<(PacketHeader, &[u8])> {
    let header = PacketHeader::decode(buf)?;
    let payload_len = usize::from(header.payload_len);
    let total = HEADER_SIZE + payload_len + CHECKSUM_SIZE;
    if buf.len() < total {
        return Err(ProtocolError::ShortBuffer {
            needed: total,
            available: buf.len(),
        }
        .into());
    }

    let stored = LittleEndian::read_u16(&buf[HEADER_SIZE + payload_len..total]);
    if !checksum::verify(&buf[..HEADER_SIZE + payload_len], stored) {
        return Err(ProtocolError::ChecksumMismatch.into());
    }

    if payload_len < PAYLOAD_HEADER_SIZE {
        return Err(ProtocolError::MalformedPacket(format!(
            "payload length {payload_len} shorter than the payload header"
        ))
        .into());
    }

    Ok((header, &buf[HEADER_SIZE..HEADER_SIZE + payload_len]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_for() {
        assert_eq!(padding_for(0), 0);
        assert_eq!(padding_for(1), 15);
        assert_eq!(padding_for(15), 1);
        assert_eq!(padding_for(16), 0);
        assert_eq!(padding_for(33), 15);
        assert_eq!(padding_for(PAYLOAD_HEADER_SIZE), 0);
    }

    #[test]
    fn test_max_payload_is_block_aligned() {
        assert_eq!(MAX_PAYLOAD_SIZE % BLOCK_SIZE, 0);
        assert!(MAX_PAYLOAD_SIZE <= usize::from(u16::MAX));
    }

    #[test]
    fn test_split_packet_framing() {
        // 24-byte header + 32-byte payload + checksum.
        let mut buf = vec![0u8; HEADER_SIZE + PAYLOAD_HEADER_SIZE + CHECKSUM_SIZE];
        let header = PacketHeader {
            version: 1,
            payload_len: PAYLOAD_HEADER_SIZE as u16,
            user_id: 5,
            iv: [0u8; 16],
        };
        header.encode(&mut buf).unwrap();
        append_checksum(&mut buf, PAYLOAD_HEADER_SIZE);

        let (decoded, payload) = split_packet(&buf).unwrap();
        assert_eq!(decoded.user_id, 5);
        assert_eq!(payload.len(), PAYLOAD_HEADER_SIZE);

        // Truncating the checksum tail is a short buffer.
        let err = split_packet(&buf[..buf.len() - 1]).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Protocol(ProtocolError::ShortBuffer { .. })
        ));

        // Flipping a payload bit is a checksum mismatch.
        buf[HEADER_SIZE + 3] ^= 0x80;
        let err = split_packet(&buf).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Protocol(ProtocolError::ChecksumMismatch)
        ));
    }
}
