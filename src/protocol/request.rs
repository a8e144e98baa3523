//! Location request encoding and decoding.
//!
//! A request carries the device's beacon scan: WiFi access points, BLE
//! beacons, at most one cell technology, and GPS fixes. Entries for
//! empty categories are omitted from the wire entirely.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::types::{
    unix_millis, AccessPoint, BleBeacon, CdmaCell, CellScan, DataType, GpsFix, GsmCell, HostIp,
    LteCell, Mac, PayloadType, UmtsCell,
};
use crate::PROTOCOL_VERSION;

use super::cursor::{ByteReader, ByteWriter};
use super::packet::{PacketHeader, PayloadHeader};
use super::records::{entry_len, read_records, write_entry};
use super::{
    append_checksum, padding_for, split_packet, CHECKSUM_SIZE, HEADER_SIZE, MAX_PAYLOAD_SIZE,
    PAYLOAD_HEADER_SIZE,
};

/// A decoded location query from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRequest {
    /// Protocol version from the packet header.
    pub protocol_version: u8,
    /// Key registry ID of the sender.
    pub user_id: u32,
    /// Client software version.
    pub sw_version: u8,
    /// Device MAC identifier.
    pub mac: Mac,
    /// [`PayloadType::LocationRq`] or [`PayloadType::LocationRqAddr`].
    pub payload_type: PayloadType,
    /// Client IP, if the client knows it.
    pub ip: HostIp,
    /// Scan time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Observed WiFi access points.
    pub access_points: Vec<AccessPoint>,
    /// Observed BLE beacons.
    pub bles: Vec<BleBeacon>,
    /// Cell observations, at most one technology per request.
    pub cell: Option<CellScan>,
    /// GPS fixes.
    pub gps: Vec<GpsFix>,
}

impl LocationRequest {
    /// Create an empty coordinate-only request stamped with the current
    /// time.
    pub fn new(user_id: u32, mac: Mac) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            user_id,
            sw_version: 0,
            mac,
            payload_type: PayloadType::LocationRq,
            ip: HostIp::UNSPECIFIED,
            timestamp: unix_millis(),
            access_points: Vec::new(),
            bles: Vec::new(),
            cell: None,
            gps: Vec::new(),
        }
    }

    /// Total frame size [`encode_request`] will produce for this
    /// request, checksum included.
    pub fn encoded_len(&self) -> usize {
        let unpadded = PAYLOAD_HEADER_SIZE + self.entries_len();
        HEADER_SIZE + unpadded + padding_for(unpadded) + CHECKSUM_SIZE
    }

    fn entries_len(&self) -> usize {
        let mut len = 0;
        if !self.access_points.is_empty() {
            len += entry_len::<AccessPoint>(self.access_points.len());
        }
        if !self.bles.is_empty() {
            len += entry_len::<BleBeacon>(self.bles.len());
        }
        if let Some(cell) = &self.cell {
            if !cell.is_empty() {
                len += match cell {
                    CellScan::Gsm(cells) => entry_len::<GsmCell>(cells.len()),
                    CellScan::Cdma(cells) => entry_len::<CdmaCell>(cells.len()),
                    CellScan::Umts(cells) => entry_len::<UmtsCell>(cells.len()),
                    CellScan::Lte(cells) => entry_len::<LteCell>(cells.len()),
                };
            }
        }
        if !self.gps.is_empty() {
            len += entry_len::<GpsFix>(self.gps.len());
        }
        len
    }
}

/// Encode `request` into `buf` as a plaintext packet.
///
/// The payload region is padded to a multiple of 16 and the Fletcher-16
/// checksum is appended. Returns the total number of bytes written.
/// Encryption of the payload region happens separately.
pub fn encode_request(request: &LocationRequest, iv: &[u8; 16], buf: &mut [u8]) -> Result<usize> {
    if !request.payload_type.is_request() {
        return Err(ProtocolError::UnsupportedPayloadType(request.payload_type.as_u8()).into());
    }

    let unpadded = PAYLOAD_HEADER_SIZE + request.entries_len();
    let pad = padding_for(unpadded);
    let payload_len = unpadded + pad;
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload_len,
            max: MAX_PAYLOAD_SIZE,
        }
        .into());
    }

    let total = HEADER_SIZE + payload_len + CHECKSUM_SIZE;
    if buf.len() < total {
        return Err(ProtocolError::BufferTooSmall {
            needed: total,
            available: buf.len(),
        }
        .into());
    }

    let header = PacketHeader {
        version: request.protocol_version,
        payload_len: payload_len as u16,
        user_id: request.user_id,
        iv: *iv,
    };
    header.encode(&mut buf[..HEADER_SIZE])?;

    let payload_header = PayloadHeader {
        sw_version: request.sw_version,
        mac: request.mac,
        payload_type: request.payload_type,
        ip: request.ip,
        timestamp: request.timestamp,
    };
    payload_header.encode(&mut buf[HEADER_SIZE..HEADER_SIZE + PAYLOAD_HEADER_SIZE])?;

    // Entries land in a writer bounded to the payload region so a sizing
    // bug shows up as BufferTooSmall instead of silent corruption.
    let mut writer =
        ByteWriter::new(&mut buf[HEADER_SIZE + PAYLOAD_HEADER_SIZE..HEADER_SIZE + payload_len]);
    if !request.access_points.is_empty() {
        write_entry(&mut writer, &request.access_points)?;
    }
    if !request.bles.is_empty() {
        write_entry(&mut writer, &request.bles)?;
    }
    if let Some(cell) = &request.cell {
        if !cell.is_empty() {
            match cell {
                CellScan::Gsm(cells) => write_entry(&mut writer, cells)?,
                CellScan::Cdma(cells) => write_entry(&mut writer, cells)?,
                CellScan::Umts(cells) => write_entry(&mut writer, cells)?,
                CellScan::Lte(cells) => write_entry(&mut writer, cells)?,
            }
        }
    }
    if !request.gps.is_empty() {
        write_entry(&mut writer, &request.gps)?;
    }
    writer.fill(pad, DataType::Pad.as_u8())?;

    append_checksum(&mut buf[..total], payload_len);

    Ok(total)
}

/// Decode a plaintext request packet.
///
/// The buffer must hold the complete packet with the payload region
/// already decrypted. The checksum is verified before any entry is
/// parsed; on any error no partial request is returned.
pub fn decode_request(buf: &[u8]) -> Result<LocationRequest> {
    let (header, payload) = split_packet(buf)?;
    let payload_header = PayloadHeader::decode(payload)?;
    if !payload_header.payload_type.is_request() {
        return Err(
            ProtocolError::UnsupportedPayloadType(payload_header.payload_type.as_u8()).into(),
        );
    }

    let mut access_points = Vec::new();
    let mut bles = Vec::new();
    let mut cell = None;
    let mut gps = Vec::new();

    let mut reader = ByteReader::new(&payload[PAYLOAD_HEADER_SIZE..]);
    while reader.remaining() > 0 {
        let tag = reader.read_u8()?;
        match DataType::from_u8(tag) {
            // Padding terminates entry scanning.
            Some(DataType::Pad) => break,
            Some(DataType::AccessPoint) => {
                let count = reader.read_u8()?;
                access_points = read_records(&mut reader, count)?;
            }
            Some(DataType::Ble) => {
                let count = reader.read_u8()?;
                bles = read_records(&mut reader, count)?;
            }
            Some(DataType::Gsm) => {
                let count = reader.read_u8()?;
                cell = Some(CellScan::Gsm(read_records(&mut reader, count)?));
            }
            Some(DataType::Cdma) => {
                let count = reader.read_u8()?;
                cell = Some(CellScan::Cdma(read_records(&mut reader, count)?));
            }
            Some(DataType::Umts) => {
                let count = reader.read_u8()?;
                cell = Some(CellScan::Umts(read_records(&mut reader, count)?));
            }
            Some(DataType::Lte) => {
                let count = reader.read_u8()?;
                cell = Some(CellScan::Lte(read_records(&mut reader, count)?));
            }
            Some(DataType::Gps) => {
                let count = reader.read_u8()?;
                gps = read_records(&mut reader, count)?;
            }
            // Response-only tags are just as fatal here as junk bytes.
            _ => return Err(ProtocolError::UnknownDataType(tag).into()),
        }
    }

    Ok(LocationRequest {
        protocol_version: header.version,
        user_id: header.user_id,
        sw_version: payload_header.sw_version,
        mac: payload_header.mac,
        payload_type: payload_header.payload_type,
        ip: payload_header.ip,
        timestamp: payload_header.timestamp,
        access_points,
        bles,
        cell,
        gps,
    })
}
