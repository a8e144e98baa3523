//! Fixed-size wire layouts for beacon and location records.
//!
//! Every record type has an exact packed byte width. Larger fields come
//! first within each record, and the byte layout never depends on host
//! alignment. Multi-record request entries carry a record count; the
//! total entry length is `2 + count * SIZE`.

use crate::error::ProtocolError;
use crate::types::{
    AccessPoint, BleBeacon, CdmaCell, DataType, GpsFix, GsmCell, Location, LteCell, Mac, UmtsCell,
};

use super::cursor::{ByteReader, ByteWriter};
use super::ENTRY_HEADER_SIZE;

/// A record with a fixed packed wire width.
pub(crate) trait WireRecord: Sized {
    /// Entry tag this record travels under.
    const DATA_TYPE: DataType;
    /// Packed byte width of one record.
    const SIZE: usize;

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), ProtocolError>;
    fn read(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError>;
}

impl WireRecord for AccessPoint {
    const DATA_TYPE: DataType = DataType::AccessPoint;
    const SIZE: usize = 7;

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), ProtocolError> {
        writer.write_bytes(self.mac.as_bytes())?;
        writer.write_i8(self.rssi)
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            mac: Mac::new(reader.read_array()?),
            rssi: reader.read_i8()?,
        })
    }
}

impl WireRecord for GsmCell {
    const DATA_TYPE: DataType = DataType::Gsm;
    const SIZE: usize = 15;

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), ProtocolError> {
        writer.write_u32_le(self.cell_id)?;
        writer.write_u32_le(self.age)?;
        writer.write_u16_le(self.mcc)?;
        writer.write_u16_le(self.mnc)?;
        writer.write_u16_le(self.lac)?;
        writer.write_i8(self.rssi)
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            cell_id: reader.read_u32_le()?,
            age: reader.read_u32_le()?,
            mcc: reader.read_u16_le()?,
            mnc: reader.read_u16_le()?,
            lac: reader.read_u16_le()?,
            rssi: reader.read_i8()?,
        })
    }
}

impl WireRecord for CdmaCell {
    const DATA_TYPE: DataType = DataType::Cdma;
    const SIZE: usize = 27;

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), ProtocolError> {
        writer.write_u32_le(self.age)?;
        writer.write_f64_le(self.lat)?;
        writer.write_f64_le(self.lon)?;
        writer.write_u16_le(self.sid)?;
        writer.write_u16_le(self.nid)?;
        writer.write_u16_le(self.bsid)?;
        writer.write_i8(self.rssi)
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            age: reader.read_u32_le()?,
            lat: reader.read_f64_le()?,
            lon: reader.read_f64_le()?,
            sid: reader.read_u16_le()?,
            nid: reader.read_u16_le()?,
            bsid: reader.read_u16_le()?,
            rssi: reader.read_i8()?,
        })
    }
}

impl WireRecord for UmtsCell {
    const DATA_TYPE: DataType = DataType::Umts;
    const SIZE: usize = 15;

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), ProtocolError> {
        writer.write_u32_le(self.cell_id)?;
        writer.write_u32_le(self.age)?;
        writer.write_u16_le(self.mcc)?;
        writer.write_u16_le(self.mnc)?;
        writer.write_u16_le(self.lac)?;
        writer.write_i8(self.rssi)
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            cell_id: reader.read_u32_le()?,
            age: reader.read_u32_le()?,
            mcc: reader.read_u16_le()?,
            mnc: reader.read_u16_le()?,
            lac: reader.read_u16_le()?,
            rssi: reader.read_i8()?,
        })
    }
}

impl WireRecord for LteCell {
    const DATA_TYPE: DataType = DataType::Lte;
    const SIZE: usize = 13;

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), ProtocolError> {
        writer.write_u32_le(self.age)?;
        writer.write_u32_le(self.eucid)?;
        writer.write_u16_le(self.mcc)?;
        writer.write_u16_le(self.mnc)?;
        writer.write_i8(self.rssi)
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            age: reader.read_u32_le()?,
            eucid: reader.read_u32_le()?,
            mcc: reader.read_u16_le()?,
            mnc: reader.read_u16_le()?,
            rssi: reader.read_i8()?,
        })
    }
}

impl WireRecord for GpsFix {
    const DATA_TYPE: DataType = DataType::Gps;
    const SIZE: usize = 34;

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), ProtocolError> {
        writer.write_f64_le(self.lat)?;
        writer.write_f64_le(self.lon)?;
        writer.write_f32_le(self.altitude)?;
        writer.write_f32_le(self.hpe)?;
        writer.write_u32_le(self.age)?;
        writer.write_f32_le(self.speed)?;
        writer.write_u8(self.satellites)?;
        writer.write_u8(self.fix_type)
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            lat: reader.read_f64_le()?,
            lon: reader.read_f64_le()?,
            altitude: reader.read_f32_le()?,
            hpe: reader.read_f32_le()?,
            age: reader.read_u32_le()?,
            speed: reader.read_f32_le()?,
            satellites: reader.read_u8()?,
            fix_type: reader.read_u8()?,
        })
    }
}

impl WireRecord for BleBeacon {
    const DATA_TYPE: DataType = DataType::Ble;
    const SIZE: usize = 27;

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), ProtocolError> {
        writer.write_u16_le(self.major)?;
        writer.write_u16_le(self.minor)?;
        writer.write_bytes(self.mac.as_bytes())?;
        writer.write_bytes(&self.uuid)?;
        writer.write_i8(self.rssi)
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            major: reader.read_u16_le()?,
            minor: reader.read_u16_le()?,
            mac: Mac::new(reader.read_array()?),
            uuid: reader.read_array()?,
            rssi: reader.read_i8()?,
        })
    }
}

impl WireRecord for Location {
    const DATA_TYPE: DataType = DataType::Basic;
    const SIZE: usize = 20;

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), ProtocolError> {
        writer.write_f64_le(self.lat)?;
        writer.write_f64_le(self.lon)?;
        writer.write_f32_le(self.hpe)
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            lat: reader.read_f64_le()?,
            lon: reader.read_f64_le()?,
            hpe: reader.read_f32_le()?,
        })
    }
}

/// Byte length of a full entry holding `count` records of type `R`.
pub(crate) fn entry_len<R: WireRecord>(count: usize) -> usize {
    ENTRY_HEADER_SIZE + count * R::SIZE
}

/// Write one tag + count + records entry.
///
/// Fails with [`ProtocolError::EntryOverflow`] when more records are
/// supplied than the one-byte count field can declare.
pub(crate) fn write_entry<R: WireRecord>(
    writer: &mut ByteWriter<'_>,
    records: &[R],
) -> Result<(), ProtocolError> {
    let count = u8::try_from(records.len()).map_err(|_| ProtocolError::EntryOverflow {
        tag: R::DATA_TYPE.as_u8(),
        count: records.len(),
    })?;
    writer.write_u8(R::DATA_TYPE.as_u8())?;
    writer.write_u8(count)?;
    for record in records {
        record.write(writer)?;
    }
    Ok(())
}

/// Read `count` records following an already-consumed entry header.
///
/// The full `count * SIZE` span is bounds-checked up front so a
/// truncated entry never yields a partial vector.
pub(crate) fn read_records<R: WireRecord>(
    reader: &mut ByteReader<'_>,
    count: u8,
) -> Result<Vec<R>, ProtocolError> {
    reader.ensure(usize::from(count) * R::SIZE)?;
    let mut records = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        records.push(R::read(reader)?);
    }
    Ok(records)
}
