//! Location response encoding and decoding.
//!
//! A successful response echoes the request's payload type, which
//! selects the entry family: coordinate-only responses carry a single
//! basic location entry, address responses add a distance-to-point
//! entry and one entry per nonempty address component. The failure
//! payload types carry no entries at all. Response entry count bytes
//! hold byte lengths, not record counts.

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::types::{
    unix_millis, DataType, HostIp, Location, Mac, PayloadType, ResolvedAddress, ResolvedIp,
};

use super::cursor::{ByteReader, ByteWriter};
use super::packet::{PacketHeader, PayloadHeader};
use super::records::WireRecord;
use super::request::LocationRequest;
use super::{
    append_checksum, padding_for, split_packet, CHECKSUM_SIZE, ENTRY_HEADER_SIZE, HEADER_SIZE,
    MAX_PAYLOAD_SIZE, PAYLOAD_HEADER_SIZE,
};

/// Wire length of a distance-to-point entry body.
const DIST_POINT_LEN: usize = 4;

/// A server's answer to a location request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResponse {
    /// Protocol version from the packet header.
    pub protocol_version: u8,
    /// Key registry ID the response is addressed to.
    pub user_id: u32,
    /// Server software version.
    pub sw_version: u8,
    /// Device MAC echoed from the request.
    pub mac: Mac,
    /// Echoed request type on success, or one of the failure codes.
    pub payload_type: PayloadType,
    /// Client IP slot, as resolved by the server.
    pub ip: HostIp,
    /// Response time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Resolved position. Present on successful responses.
    pub location: Option<Location>,
    /// Address data. Present when the request asked for it.
    pub address: Option<ResolvedAddress>,
}

impl LocationResponse {
    /// Build a successful response for `request`, echoing its payload
    /// type and identity fields.
    pub fn success(request: &LocationRequest, location: Location) -> Self {
        Self {
            protocol_version: request.protocol_version,
            user_id: request.user_id,
            sw_version: 0,
            mac: request.mac,
            payload_type: request.payload_type,
            ip: request.ip,
            timestamp: unix_millis(),
            location: Some(location),
            address: request
                .payload_type
                .wants_address()
                .then(ResolvedAddress::default),
        }
    }

    /// Build a failure response. `kind` should be one of the error
    /// payload types.
    pub fn failure(request: &LocationRequest, kind: PayloadType) -> Self {
        Self {
            protocol_version: request.protocol_version,
            user_id: request.user_id,
            sw_version: 0,
            mac: request.mac,
            payload_type: kind,
            ip: request.ip,
            timestamp: unix_millis(),
            location: None,
            address: None,
        }
    }

    /// True when the server reported a failure code.
    pub fn is_error(&self) -> bool {
        self.payload_type.is_error()
    }

    /// Total frame size [`encode_response`] will produce, checksum
    /// included. Fails on the same shape errors as encoding.
    pub fn encoded_len(&self) -> Result<usize> {
        let unpadded = PAYLOAD_HEADER_SIZE + entries_len(self)?;
        Ok(HEADER_SIZE + unpadded + padding_for(unpadded) + CHECKSUM_SIZE)
    }
}

/// The address string components in canonical wire order.
fn address_fields(address: &ResolvedAddress) -> [(DataType, &str); 11] {
    [
        (DataType::StreetNum, address.street_num.as_str()),
        (DataType::Address, address.address.as_str()),
        (DataType::City, address.city.as_str()),
        (DataType::State, address.state.as_str()),
        (DataType::StateCode, address.state_code.as_str()),
        (DataType::Metro1, address.metro1.as_str()),
        (DataType::Metro2, address.metro2.as_str()),
        (DataType::PostalCode, address.postal_code.as_str()),
        (DataType::County, address.county.as_str()),
        (DataType::Country, address.country.as_str()),
        (DataType::CountryCode, address.country_code.as_str()),
    ]
}

fn string_slot(address: &mut ResolvedAddress, tag: DataType) -> Option<&mut String> {
    Some(match tag {
        DataType::StreetNum => &mut address.street_num,
        DataType::Address => &mut address.address,
        DataType::City => &mut address.city,
        DataType::State => &mut address.state,
        DataType::StateCode => &mut address.state_code,
        DataType::Metro1 => &mut address.metro1,
        DataType::Metro2 => &mut address.metro2,
        DataType::PostalCode => &mut address.postal_code,
        DataType::County => &mut address.county,
        DataType::Country => &mut address.country,
        DataType::CountryCode => &mut address.country_code,
        _ => return None,
    })
}

/// Bytes the data entries of `response` will occupy on the wire,
/// padding excluded.
fn entries_len(response: &LocationResponse) -> Result<usize> {
    if !response.payload_type.is_request() {
        // Failure and bare-acknowledgement responses carry no entries.
        return Ok(0);
    }
    if response.location.is_none() {
        return Err(
            ProtocolError::MalformedPacket("success response without a location".into()).into(),
        );
    }

    let mut len = ENTRY_HEADER_SIZE + Location::SIZE;
    if response.payload_type.wants_address() {
        let address = response.address.as_ref().ok_or_else(|| {
            ProtocolError::MalformedPacket("address response without address data".into())
        })?;
        len += ENTRY_HEADER_SIZE + DIST_POINT_LEN;
        for (tag, value) in address_fields(address) {
            if value.is_empty() {
                continue;
            }
            if u8::try_from(value.len()).is_err() {
                return Err(ProtocolError::EntryOverflow {
                    tag: tag.as_u8(),
                    count: value.len(),
                }
                .into());
            }
            len += ENTRY_HEADER_SIZE + value.len();
        }
    }
    Ok(len)
}

/// Encode `response` into `buf` as a plaintext packet.
///
/// Same framing discipline as request encoding: the payload is padded
/// to a multiple of 16 and the computed length covers exactly the
/// entries that are written. Returns total bytes written.
pub fn encode_response(response: &LocationResponse, iv: &[u8; 16], buf: &mut [u8]) -> Result<usize> {
    if response.payload_type == PayloadType::ProbeRequest {
        return Err(ProtocolError::UnsupportedPayloadType(response.payload_type.as_u8()).into());
    }

    let unpadded = PAYLOAD_HEADER_SIZE + entries_len(response)?;
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
        version: response.protocol_version,
        payload_len: payload_len as u16,
        user_id: response.user_id,
        iv: *iv,
    };
    header.encode(&mut buf[..HEADER_SIZE])?;

    let payload_header = PayloadHeader {
        sw_version: response.sw_version,
        mac: response.mac,
        payload_type: response.payload_type,
        ip: response.ip,
        timestamp: response.timestamp,
    };
    payload_header.encode(&mut buf[HEADER_SIZE..HEADER_SIZE + PAYLOAD_HEADER_SIZE])?;

    let mut writer =
        ByteWriter::new(&mut buf[HEADER_SIZE + PAYLOAD_HEADER_SIZE..HEADER_SIZE + payload_len]);
    if let Some(location) = &response.location {
        if response.payload_type.is_request() {
            writer.write_u8(DataType::Basic.as_u8())?;
            writer.write_u8(Location::SIZE as u8)?;
            location.write(&mut writer)?;
        }
    }
    if response.payload_type.wants_address() {
        if let Some(address) = &response.address {
            writer.write_u8(DataType::DistPoint.as_u8())?;
            writer.write_u8(DIST_POINT_LEN as u8)?;
            writer.write_f32_le(address.distance_to_point)?;
            for (tag, value) in address_fields(address) {
                if value.is_empty() {
                    continue;
                }
                writer.write_u8(tag.as_u8())?;
                writer.write_u8(value.len() as u8)?;
                writer.write_bytes(value.as_bytes())?;
            }
        }
    }
    writer.fill(pad, DataType::Pad.as_u8())?;

    append_checksum(&mut buf[..total], payload_len);

    Ok(total)
}

/// Decode a plaintext response packet.
pub fn decode_response(buf: &[u8]) -> Result<LocationResponse> {
    let (header, payload) = split_packet(buf)?;
    let payload_header = PayloadHeader::decode(payload)?;
    if payload_header.payload_type == PayloadType::ProbeRequest {
        return Err(
            ProtocolError::UnsupportedPayloadType(payload_header.payload_type.as_u8()).into(),
        );
    }

    let mut ip = payload_header.ip;
    let mut location = None;
    let mut address = None;

    match payload_header.payload_type {
        PayloadType::LocationRq => {
            let mut reader = ByteReader::new(&payload[PAYLOAD_HEADER_SIZE..]);
            while reader.remaining() > 0 {
                let tag = reader.read_u8()?;
                match DataType::from_u8(tag) {
                    Some(DataType::Pad) => break,
                    Some(DataType::Basic) => {
                        let count = reader.read_u8()?;
                        if usize::from(count) != Location::SIZE {
                            return Err(
                                ProtocolError::InvalidEntryLength { tag, len: count }.into()
                            );
                        }
                        location = Some(Location::read(&mut reader)?);
                    }
                    _ => return Err(ProtocolError::UnknownDataType(tag).into()),
                }
            }
        }
        PayloadType::LocationRqAddr => {
            let mut acc = ResolvedAddress::default();
            let mut reader = ByteReader::new(&payload[PAYLOAD_HEADER_SIZE..]);
            while reader.remaining() > 0 {
                let tag = reader.read_u8()?;
                match DataType::from_u8(tag) {
                    Some(DataType::Pad) => break,
                    Some(DataType::Basic) => {
                        let count = reader.read_u8()?;
                        if usize::from(count) != Location::SIZE {
                            return Err(
                                ProtocolError::InvalidEntryLength { tag, len: count }.into()
                            );
                        }
                        location = Some(Location::read(&mut reader)?);
                    }
                    Some(DataType::DistPoint) => {
                        let count = reader.read_u8()?;
                        if usize::from(count) != DIST_POINT_LEN {
                            return Err(
                                ProtocolError::InvalidEntryLength { tag, len: count }.into()
                            );
                        }
                        acc.distance_to_point = reader.read_f32_le()?;
                    }
                    Some(DataType::Ipv4) => {
                        let count = reader.read_u8()?;
                        if usize::from(count) != 4 {
                            return Err(
                                ProtocolError::InvalidEntryLength { tag, len: count }.into()
                            );
                        }
                        let octets: [u8; 4] = reader.read_array()?;
                        ip.0[..4].copy_from_slice(&octets);
                        acc.ip = Some(ResolvedIp::V4(Ipv4Addr::from(octets)));
                    }
                    Some(DataType::Ipv6) => {
                        let count = reader.read_u8()?;
                        if usize::from(count) != 16 {
                            return Err(
                                ProtocolError::InvalidEntryLength { tag, len: count }.into()
                            );
                        }
                        let octets: [u8; 16] = reader.read_array()?;
                        ip.0.copy_from_slice(&octets);
                        acc.ip = Some(ResolvedIp::V6(Ipv6Addr::from(octets)));
                    }
                    Some(other) => match string_slot(&mut acc, other) {
                        Some(slot) => {
                            let count = reader.read_u8()?;
                            let bytes = reader.read_bytes(usize::from(count))?;
                            *slot = String::from_utf8_lossy(bytes).into_owned();
                        }
                        None => return Err(ProtocolError::UnknownDataType(tag).into()),
                    },
                    None => return Err(ProtocolError::UnknownDataType(tag).into()),
                }
            }
            address = Some(acc);
        }
        // Status-only responses carry no entries.
        _ => {}
    }

    Ok(LocationResponse {
        protocol_version: header.version,
        user_id: header.user_id,
        sw_version: payload_header.sw_version,
        mac: payload_header.mac,
        payload_type: payload_header.payload_type,
        ip,
        location,
        address,
        timestamp: payload_header.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr_request() -> LocationRequest {
        let mut request = LocationRequest::new(512, Mac::new([9, 8, 7, 6, 5, 4]));
        request.payload_type = PayloadType::LocationRqAddr;
        request
    }

    fn resolved() -> Location {
        Location {
            lat: 48.8584,
            lon: 2.2945,
            hpe: 30.0,
        }
    }

    #[test]
    fn test_basic_round_trip() {
        let request = LocationRequest::new(512, Mac::new([9, 8, 7, 6, 5, 4]));
        let response = LocationResponse::success(&request, resolved());

        let mut buf = vec![0u8; 256];
        let written = encode_response(&response, &[3u8; 16], &mut buf).unwrap();
        assert_eq!(written, response.encoded_len().unwrap());
        let decoded = decode_response(&buf[..written]).unwrap();

        assert_eq!(decoded, response);
        assert_eq!(decoded.payload_type, PayloadType::LocationRq);
    }

    #[test]
    fn test_address_round_trip_skips_empty_components() {
        let mut response = LocationResponse::success(&addr_request(), resolved());
        let address = response.address.as_mut().unwrap();
        address.distance_to_point = 12.5;
        address.city = "Paris".into();
        address.country = "France".into();
        address.country_code = "FR".into();

        let mut buf = vec![0u8; 512];
        let written = encode_response(&response, &[0u8; 16], &mut buf).unwrap();

        // No street number was set, so its tag must not appear anywhere
        // in the entry region.
        let payload = &buf[HEADER_SIZE + PAYLOAD_HEADER_SIZE..written - CHECKSUM_SIZE];
        assert!(!payload.contains(&DataType::StreetNum.as_u8()));

        let decoded = decode_response(&buf[..written]).unwrap();
        assert_eq!(decoded, response);
        let got = decoded.address.unwrap();
        assert_eq!(got.city, "Paris");
        assert!(got.street_num.is_empty());
        assert!(got.ip.is_none());
    }

    #[test]
    fn test_failure_response_has_no_entries() {
        let response = LocationResponse::failure(&addr_request(), PayloadType::LocationApiError);

        let mut buf = vec![0u8; 128];
        let written = encode_response(&response, &[0u8; 16], &mut buf).unwrap();

        // Payload header alone is already block aligned.
        let header = PacketHeader::decode(&buf[..written]).unwrap();
        assert_eq!(usize::from(header.payload_len), PAYLOAD_HEADER_SIZE);

        let decoded = decode_response(&buf[..written]).unwrap();
        assert!(decoded.is_error());
        assert!(decoded.location.is_none());
        assert!(decoded.address.is_none());
    }

    #[test]
    fn test_success_without_location_is_rejected() {
        let mut response = LocationResponse::success(&addr_request(), resolved());
        response.location = None;

        let mut buf = vec![0u8; 128];
        let err = encode_response(&response, &[0u8; 16], &mut buf).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Protocol(ProtocolError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_oversized_address_component() {
        let mut response = LocationResponse::success(&addr_request(), resolved());
        response.address.as_mut().unwrap().address = "x".repeat(300);

        let mut buf = vec![0u8; 1024];
        let err = encode_response(&response, &[0u8; 16], &mut buf).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Protocol(ProtocolError::EntryOverflow {
                tag: 10,
                count: 300
            })
        ));
    }

    #[test]
    fn test_probe_rejected_both_ways() {
        let mut response = LocationResponse::failure(&addr_request(), PayloadType::ProbeRequest);
        let mut buf = vec![0u8; 128];
        assert!(encode_response(&response, &[0u8; 16], &mut buf).is_err());

        // Hand-build a probe-typed frame and make sure decode rejects it.
        response.payload_type = PayloadType::LocationRqError;
        let written = encode_response(&response, &[0u8; 16], &mut buf).unwrap();
        buf[HEADER_SIZE + 7] = PayloadType::ProbeRequest.as_u8();
        append_checksum(&mut buf[..written], PAYLOAD_HEADER_SIZE);
        let err = decode_response(&buf[..written]).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Protocol(ProtocolError::UnsupportedPayloadType(2))
        ));
    }

    #[test]
    fn test_dist_point_length_is_strict() {
        let mut response = LocationResponse::success(&addr_request(), resolved());
        response.address.as_mut().unwrap().distance_to_point = 3.0;

        let mut buf = vec![0u8; 256];
        let written = encode_response(&response, &[0u8; 16], &mut buf).unwrap();

        // Corrupt the dist-point count byte: it follows the basic entry.
        let dist_count_at = HEADER_SIZE + PAYLOAD_HEADER_SIZE + ENTRY_HEADER_SIZE + 20 + 1;
        buf[dist_count_at] = 7;
        let header = PacketHeader::decode(&buf[..written]).unwrap();
        append_checksum(&mut buf[..written], usize::from(header.payload_len));

        let err = decode_response(&buf[..written]).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Protocol(ProtocolError::InvalidEntryLength { tag: 20, len: 7 })
        ));
    }
}
