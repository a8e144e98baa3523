//! Packet and payload header structures.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::types::{HostIp, Mac, PayloadType};

use super::cursor::{ByteReader, ByteWriter};
use super::{HEADER_SIZE, PAYLOAD_HEADER_SIZE};

/// Cleartext packet header, identical for requests and responses.
///
/// The header is never encrypted: a server needs the user ID to select
/// the decryption key and the IV to run the cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    /// Protocol version, echoed between peers.
    pub version: u8,
    /// Payload bytes following the header, padding included, checksum
    /// excluded. Always a multiple of 16.
    pub payload_len: u16,
    /// Key registry ID of the sending user.
    pub user_id: u32,
    /// Initialization vector for the payload cipher.
    pub iv: [u8; 16],
}

impl PacketHeader {
    /// Encode the header into the first [`HEADER_SIZE`] bytes of `buf`.
    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        let mut writer = ByteWriter::new(buf);
        writer.write_u8(self.version)?;
        writer.write_u8(0)?; // reserved
        writer.write_u16_le(self.payload_len)?;
        writer.write_u32_le(self.user_id)?;
        writer.write_bytes(&self.iv)?;
        Ok(())
    }

    /// Decode a header from the start of `buf`.
    ///
    /// The version byte is not validated here; peers echo whatever
    /// version the caller put on the wire.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(buf);
        reader.ensure(HEADER_SIZE)?;
        let version = reader.read_u8()?;
        let _reserved = reader.read_u8()?;
        let payload_len = reader.read_u16_le()?;
        let user_id = reader.read_u32_le()?;
        let iv = reader.read_array()?;
        Ok(Self {
            version,
            payload_len,
            user_id,
            iv,
        })
    }
}

/// Read the user ID out of a packet without decoding anything else.
///
/// Servers call this before decryption to pick the right key.
pub fn peek_user_id(buf: &[u8]) -> Result<u32> {
    if buf.len() < HEADER_SIZE {
        return Err(ProtocolError::ShortBuffer {
            needed: HEADER_SIZE,
            available: buf.len(),
        }
        .into());
    }
    let mut reader = ByteReader::new(&buf[4..]);
    Ok(reader.read_u32_le()?)
}

/// Fixed header at the start of the encrypted payload region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadHeader {
    /// Software version of the sending side.
    pub sw_version: u8,
    /// Device MAC identifier.
    pub mac: Mac,
    /// What this payload carries.
    pub payload_type: PayloadType,
    /// Sender IP in the fixed 16-byte slot.
    pub ip: HostIp,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl PayloadHeader {
    /// Encode into the first [`PAYLOAD_HEADER_SIZE`] bytes of `buf`.
    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        let mut writer = ByteWriter::new(buf);
        writer.write_u8(self.sw_version)?;
        writer.write_bytes(self.mac.as_bytes())?;
        writer.write_u8(self.payload_type.as_u8())?;
        writer.write_bytes(self.ip.as_bytes())?;
        writer.write_u64_le(self.timestamp)?;
        Ok(())
    }

    /// Decode from the start of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(buf);
        reader.ensure(PAYLOAD_HEADER_SIZE)?;
        let sw_version = reader.read_u8()?;
        let mac = Mac::new(reader.read_array()?);
        let type_byte = reader.read_u8()?;
        let payload_type =
            PayloadType::from_u8(type_byte).ok_or(ProtocolError::UnknownPayloadType(type_byte))?;
        let ip = HostIp::new(reader.read_array()?);
        let timestamp = reader.read_u64_le()?;
        Ok(Self {
            sw_version,
            mac,
            payload_type,
            ip,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_header_round_trip() {
        let header = PacketHeader {
            version: 1,
            payload_len: 64,
            user_id: 0xDEAD_BEEF,
            iv: [7u8; 16],
        };

        let mut buf = [0u8; HEADER_SIZE];
        header.encode(&mut buf).unwrap();
        assert_eq!(buf[1], 0); // reserved byte stays zero

        let decoded = PacketHeader::decode(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_packet_header_layout() {
        let header = PacketHeader {
            version: 3,
            payload_len: 0x1234,
            user_id: 0x0A0B_0C0D,
            iv: [0xEE; 16],
        };

        let mut buf = [0u8; HEADER_SIZE];
        header.encode(&mut buf).unwrap();

        assert_eq!(buf[0], 3);
        assert_eq!(&buf[2..4], &[0x34, 0x12]); // little-endian length
        assert_eq!(&buf[4..8], &[0x0D, 0x0C, 0x0B, 0x0A]);
        assert_eq!(&buf[8..24], &[0xEE; 16]);
    }

    #[test]
    fn test_payload_header_round_trip() {
        let header = PayloadHeader {
            sw_version: 2,
            mac: Mac::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            payload_type: PayloadType::LocationRqAddr,
            ip: HostIp::from_ip("192.168.1.7".parse().unwrap()),
            timestamp: 1_700_000_000_123,
        };

        let mut buf = [0u8; PAYLOAD_HEADER_SIZE];
        header.encode(&mut buf).unwrap();

        let decoded = PayloadHeader::decode(&buf).unwrap();
        assert_eq!(decoded, header);
        // IPv4 sits left-justified in the slot.
        assert_eq!(&buf[8..12], &[192, 168, 1, 7]);
        assert_eq!(&buf[12..24], &[0u8; 12]);
    }

    #[test]
    fn test_payload_header_unknown_type() {
        let mut buf = [0u8; PAYLOAD_HEADER_SIZE];
        buf[7] = 42; // type byte
        let err = PayloadHeader::decode(&buf).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Protocol(ProtocolError::UnknownPayloadType(42))
        ));
    }

    #[test]
    fn test_short_buffers() {
        assert!(PacketHeader::decode(&[0u8; HEADER_SIZE - 1]).is_err());
        assert!(PayloadHeader::decode(&[0u8; PAYLOAD_HEADER_SIZE - 1]).is_err());
    }

    #[test]
    fn test_peek_user_id() {
        let header = PacketHeader {
            version: 1,
            payload_len: 48,
            user_id: 77_001,
            iv: [0u8; 16],
        };
        let mut buf = [0u8; HEADER_SIZE];
        header.encode(&mut buf).unwrap();

        assert_eq!(peek_user_id(&buf).unwrap(), 77_001);
        assert!(peek_user_id(&buf[..10]).is_err());
    }
}
