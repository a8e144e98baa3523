//! Core types used throughout Trilat.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Device MAC address as carried in the payload header and in access
/// point records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Mac(pub [u8; 6]);

impl Mac {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl From<[u8; 6]> for Mac {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Client IP address stored as a fixed 16-byte slot.
///
/// An IPv4 address occupies the first four bytes with the remaining
/// twelve zeroed; an IPv6 address fills the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HostIp(pub [u8; 16]);

impl HostIp {
    /// All-zero slot, used when the sender does not know its address.
    pub const UNSPECIFIED: Self = Self([0u8; 16]);

    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn from_ip(ip: IpAddr) -> Self {
        let mut bytes = [0u8; 16];
        match ip {
            IpAddr::V4(v4) => bytes[..4].copy_from_slice(&v4.octets()),
            IpAddr::V6(v6) => bytes.copy_from_slice(&v6.octets()),
        }
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<IpAddr> for HostIp {
    fn from(ip: IpAddr) -> Self {
        Self::from_ip(ip)
    }
}

impl fmt::Display for HostIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The slot does not record which family filled it. Render as IPv4
        // when only the first four bytes are set.
        if self.0[4..].iter().all(|&b| b == 0) {
            let v4 = Ipv4Addr::new(self.0[0], self.0[1], self.0[2], self.0[3]);
            write!(f, "{v4}")
        } else {
            write!(f, "{}", Ipv6Addr::from(self.0))
        }
    }
}

/// Payload type tag carried in the payload header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PayloadType {
    /// Coordinate-only location request
    LocationRq = 0,
    /// Location request asking for full address data
    LocationRqAddr = 1,
    /// Connectivity probe, carries no beacon data
    ProbeRequest = 2,
    /// Positive acknowledgement without location payload
    LocationRqSuccess = 100,
    /// Resolution failed
    LocationRqError = 101,
    /// Gateway could not process the request
    LocationGatewayError = 102,
    /// Upstream API rejected the request
    LocationApiError = 103,
}

impl PayloadType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::LocationRq),
            1 => Some(Self::LocationRqAddr),
            2 => Some(Self::ProbeRequest),
            100 => Some(Self::LocationRqSuccess),
            101 => Some(Self::LocationRqError),
            102 => Some(Self::LocationGatewayError),
            103 => Some(Self::LocationApiError),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// True for the two payload types a client may send as a query.
    pub const fn is_request(self) -> bool {
        matches!(self, Self::LocationRq | Self::LocationRqAddr)
    }

    /// True when the response should carry reverse-geocoded address data.
    pub const fn wants_address(self) -> bool {
        matches!(self, Self::LocationRqAddr)
    }

    /// True for the server-side failure codes.
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::LocationRqError | Self::LocationGatewayError | Self::LocationApiError
        )
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocationRq => write!(f, "location_rq"),
            Self::LocationRqAddr => write!(f, "location_rq_addr"),
            Self::ProbeRequest => write!(f, "probe_request"),
            Self::LocationRqSuccess => write!(f, "location_rq_success"),
            Self::LocationRqError => write!(f, "location_rq_error"),
            Self::LocationGatewayError => write!(f, "location_gateway_error"),
            Self::LocationApiError => write!(f, "location_api_error"),
        }
    }
}

/// Data entry tag, stored in one byte ahead of each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DataType {
    /// Padding marker, terminates entry scanning
    Pad = 0,
    AccessPoint = 1,
    Gps = 2,
    Gsm = 3,
    Cdma = 4,
    Umts = 5,
    Lte = 6,
    Ble = 7,
    /// Latitude, longitude, and horizontal position error
    Basic = 8,
    StreetNum = 9,
    Address = 10,
    City = 11,
    State = 12,
    StateCode = 13,
    Metro1 = 14,
    Metro2 = 15,
    PostalCode = 16,
    County = 17,
    Country = 18,
    CountryCode = 19,
    DistPoint = 20,
    Ipv4 = 21,
    Ipv6 = 22,
    Mac = 23,
}

impl DataType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pad),
            1 => Some(Self::AccessPoint),
            2 => Some(Self::Gps),
            3 => Some(Self::Gsm),
            4 => Some(Self::Cdma),
            5 => Some(Self::Umts),
            6 => Some(Self::Lte),
            7 => Some(Self::Ble),
            8 => Some(Self::Basic),
            9 => Some(Self::StreetNum),
            10 => Some(Self::Address),
            11 => Some(Self::City),
            12 => Some(Self::State),
            13 => Some(Self::StateCode),
            14 => Some(Self::Metro1),
            15 => Some(Self::Metro2),
            16 => Some(Self::PostalCode),
            17 => Some(Self::County),
            18 => Some(Self::Country),
            19 => Some(Self::CountryCode),
            20 => Some(Self::DistPoint),
            21 => Some(Self::Ipv4),
            22 => Some(Self::Ipv6),
            23 => Some(Self::Mac),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Observed WiFi access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessPoint {
    pub mac: Mac,
    pub rssi: i8,
}

/// GSM cell observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GsmCell {
    pub cell_id: u32,
    pub age: u32,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u16,
    pub rssi: i8,
}

/// CDMA cell observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CdmaCell {
    pub age: u32,
    pub lat: f64,
    pub lon: f64,
    pub sid: u16,
    pub nid: u16,
    pub bsid: u16,
    pub rssi: i8,
}

/// UMTS cell observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UmtsCell {
    pub cell_id: u32,
    pub age: u32,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u16,
    pub rssi: i8,
}

/// LTE cell observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LteCell {
    pub age: u32,
    pub eucid: u32,
    pub mcc: u16,
    pub mnc: u16,
    pub rssi: i8,
}

/// GPS fix reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
    pub altitude: f32,
    pub hpe: f32,
    pub age: u32,
    pub speed: f32,
    pub satellites: u8,
    pub fix_type: u8,
}

/// BLE beacon observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BleBeacon {
    pub major: u16,
    pub minor: u16,
    pub mac: Mac,
    pub uuid: [u8; 16],
    pub rssi: i8,
}

/// Cell observations from one scan. A request reports at most one radio
/// technology at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellScan {
    Gsm(Vec<GsmCell>),
    Cdma(Vec<CdmaCell>),
    Umts(Vec<UmtsCell>),
    Lte(Vec<LteCell>),
}

impl CellScan {
    /// Wire tag for this radio technology.
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::Gsm(_) => DataType::Gsm,
            Self::Cdma(_) => DataType::Cdma,
            Self::Umts(_) => DataType::Umts,
            Self::Lte(_) => DataType::Lte,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Gsm(cells) => cells.len(),
            Self::Cdma(cells) => cells.len(),
            Self::Umts(cells) => cells.len(),
            Self::Lte(cells) => cells.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolved geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    /// Horizontal position error in meters.
    pub hpe: f32,
}

/// Client IP as resolved by the server, with the address family made
/// explicit by the entry tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedIp {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

impl fmt::Display for ResolvedIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4(addr) => write!(f, "{addr}"),
            Self::V6(addr) => write!(f, "{addr}"),
        }
    }
}

/// Reverse-geocoded address components attached to a full response.
///
/// Empty strings are simply absent on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub distance_to_point: f32,
    /// Present only when the server reported the caller's IP back.
    pub ip: Option<ResolvedIp>,
    pub street_num: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub state_code: String,
    pub metro1: String,
    pub metro2: String,
    pub postal_code: String,
    pub county: String,
    pub country: String,
    pub country_code: String,
}

/// Milliseconds since the Unix epoch, for payload timestamps.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}
