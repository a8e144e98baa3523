//! Bounds-checked buffer access for the wire codec.
//!
//! All header and entry serialization goes through [`ByteReader`] and
//! [`ByteWriter`] so that a truncated or oversized buffer surfaces as a
//! typed error instead of a panic. Multi-byte integers are little-endian
//! on the wire.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::ProtocolError;

/// Sequential reader over an immutable byte slice.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left to read.
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fail with [`ProtocolError::ShortBuffer`] unless `needed` bytes remain.
    pub(crate) fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.remaining() < needed {
            return Err(ProtocolError::ShortBuffer {
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        let value = self.buf[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub(crate) fn read_u16_le(&mut self) -> Result<u16, ProtocolError> {
        self.ensure(2)?;
        let value = LittleEndian::read_u16(&self.buf[self.pos..]);
        self.pos += 2;
        Ok(value)
    }

    pub(crate) fn read_u32_le(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        let value = LittleEndian::read_u32(&self.buf[self.pos..]);
        self.pos += 4;
        Ok(value)
    }

    pub(crate) fn read_u64_le(&mut self) -> Result<u64, ProtocolError> {
        self.ensure(8)?;
        let value = LittleEndian::read_u64(&self.buf[self.pos..]);
        self.pos += 8;
        Ok(value)
    }

    pub(crate) fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(self.read_u8()? as i8)
    }

    pub(crate) fn read_f32_le(&mut self) -> Result<f32, ProtocolError> {
        self.ensure(4)?;
        let value = LittleEndian::read_f32(&self.buf[self.pos..]);
        self.pos += 4;
        Ok(value)
    }

    pub(crate) fn read_f64_le(&mut self) -> Result<f64, ProtocolError> {
        self.ensure(8)?;
        let value = LittleEndian::read_f64(&self.buf[self.pos..]);
        self.pos += 8;
        Ok(value)
    }

    /// Read a fixed-size array.
    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    /// Read `len` bytes as a borrowed slice.
    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        self.ensure(len)?;
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

/// Sequential writer over a mutable byte slice.
pub(crate) struct ByteWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteWriter<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// Fail with [`ProtocolError::BufferTooSmall`] unless `needed` bytes of
    /// space remain.
    pub(crate) fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        let available = self.buf.len() - self.pos;
        if available < needed {
            return Err(ProtocolError::BufferTooSmall { needed, available });
        }
        Ok(())
    }

    pub(crate) fn write_u8(&mut self, value: u8) -> Result<(), ProtocolError> {
        self.ensure(1)?;
        self.buf[self.pos] = value;
        self.pos += 1;
        Ok(())
    }

    pub(crate) fn write_u16_le(&mut self, value: u16) -> Result<(), ProtocolError> {
        self.ensure(2)?;
        LittleEndian::write_u16(&mut self.buf[self.pos..], value);
        self.pos += 2;
        Ok(())
    }

    pub(crate) fn write_u32_le(&mut self, value: u32) -> Result<(), ProtocolError> {
        self.ensure(4)?;
        LittleEndian::write_u32(&mut self.buf[self.pos..], value);
        self.pos += 4;
        Ok(())
    }

    pub(crate) fn write_u64_le(&mut self, value: u64) -> Result<(), ProtocolError> {
        self.ensure(8)?;
        LittleEndian::write_u64(&mut self.buf[self.pos..], value);
        self.pos += 8;
        Ok(())
    }

    pub(crate) fn write_i8(&mut self, value: i8) -> Result<(), ProtocolError> {
        self.write_u8(value as u8)
    }

    pub(crate) fn write_f32_le(&mut self, value: f32) -> Result<(), ProtocolError> {
        self.ensure(4)?;
        LittleEndian::write_f32(&mut self.buf[self.pos..], value);
        self.pos += 4;
        Ok(())
    }

    pub(crate) fn write_f64_le(&mut self, value: f64) -> Result<(), ProtocolError> {
        self.ensure(8)?;
        LittleEndian::write_f64(&mut self.buf[self.pos..], value);
        self.pos += 8;
        Ok(())
    }

    pub(crate) fn write_bytes(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.ensure(data.len())?;
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
        Ok(())
    }

    /// Write `len` copies of `byte`, used for payload padding.
    pub(crate) fn fill(&mut self, len: usize, byte: u8) -> Result<(), ProtocolError> {
        self.ensure(len)?;
        self.buf[self.pos..self.pos + len].fill(byte);
        self.pos += len;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_little_endian() {
        let buf = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_u32_le().unwrap(), 0x1234_5678);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_reader_short_buffer() {
        let buf = [0x01, 0x02];
        let mut reader = ByteReader::new(&buf);
        reader.read_u8().unwrap();
        let err = reader.read_u32_le().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ShortBuffer {
                needed: 4,
                available: 1
            }
        ));
    }

    #[test]
    fn test_reader_array_and_bytes() {
        let buf = [1, 2, 3, 4, 5, 6];
        let mut reader = ByteReader::new(&buf);
        let head: [u8; 4] = reader.read_array().unwrap();
        assert_eq!(head, [1, 2, 3, 4]);
        assert_eq!(reader.read_bytes(2).unwrap(), &[5, 6]);
        assert!(reader.read_bytes(1).is_err());
    }

    #[test]
    fn test_writer_round_trip() {
        let mut buf = [0u8; 15];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_u8(0xAB).unwrap();
        writer.write_u16_le(0x1234).unwrap();
        writer.write_u32_le(0xDEAD_BEEF).unwrap();
        writer.write_u64_le(0x0102_0304_0506_0708).unwrap();
        assert_eq!(writer.position(), 15);

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_u8().unwrap(), 0xAB);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_u32_le().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_u64_le().unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_writer_too_small() {
        let mut buf = [0u8; 3];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_u16_le(7).unwrap();
        let err = writer.write_u32_le(7).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::BufferTooSmall {
                needed: 4,
                available: 1
            }
        ));
    }

    #[test]
    fn test_writer_fill() {
        let mut buf = [0xFFu8; 8];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_u8(1).unwrap();
        writer.fill(7, 0).unwrap();
        assert_eq!(buf, [1, 0, 0, 0, 0, 0, 0, 0]);
    }
}
