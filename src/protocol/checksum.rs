//! Fletcher-16 checksum.
//!
//! Every frame carries a 16-bit Fletcher checksum computed over the
//! packet header and the plaintext payload (payload header, data
//! entries, and padding). The checksum travels little-endian
//! immediately after the payload and is verified before any entry
//! parsing happens.

/// Compute the Fletcher-16 checksum over a byte slice.
///
/// Returns `(sum2 << 8) | sum1` with both running sums reduced modulo 255.
#[must_use]
pub fn fletcher16(data: &[u8]) -> u16 {
    let mut fletcher = Fletcher16::new();
    fletcher.update(data);
    fletcher.finish()
}

/// Incremental Fletcher-16 state, for checksumming a payload that is
/// assembled in more than one region.
#[derive(Debug, Clone, Copy)]
pub struct Fletcher16 {
    sum1: u16,
    sum2: u16,
}

impl Fletcher16 {
    /// Create a fresh checksum state.
    #[must_use]
    pub const fn new() -> Self {
        Self { sum1: 0, sum2: 0 }
    }

    /// Feed bytes into the running sums.
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.sum1 = (self.sum1 + u16::from(byte)) % 255;
            self.sum2 = (self.sum2 + self.sum1) % 255;
        }
    }

    /// Finish and return the 16-bit checksum.
    #[must_use]
    pub const fn finish(&self) -> u16 {
        (self.sum2 << 8) | self.sum1
    }
}

impl Default for Fletcher16 {
    fn default() -> Self {
        Self::new()
    }
}

/// Verify that `expected` matches the checksum of `data`.
#[must_use]
pub fn verify(data: &[u8], expected: u16) -> bool {
    fletcher16(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(fletcher16(&[]), 0);
    }

    #[test]
    fn test_known_vectors() {
        // Classic test vectors for Fletcher-16.
        assert_eq!(fletcher16(b"abcde"), 0xC8F0);
        assert_eq!(fletcher16(b"abcdef"), 0x2057);
        assert_eq!(fletcher16(b"abcdefgh"), 0x0627);
    }

    #[test]
    fn test_single_byte() {
        // sum1 = sum2 = the byte itself.
        assert_eq!(fletcher16(&[0x01]), 0x0101);
        assert_eq!(fletcher16(&[0xFE]), 0xFEFE);
    }

    #[test]
    fn test_modulo_reduction() {
        // 0xFF reduces to zero under mod 255, so all-0xFF input sums to zero.
        assert_eq!(fletcher16(&[0xFF; 32]), 0);
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let mut fletcher = Fletcher16::new();
        fletcher.update(&data[..10]);
        fletcher.update(&data[10..]);
        assert_eq!(fletcher.finish(), fletcher16(data));
    }

    #[test]
    fn test_order_sensitivity() {
        // Unlike a plain additive sum, Fletcher detects reordering.
        assert_ne!(fletcher16(&[0x01, 0x02]), fletcher16(&[0x02, 0x01]));
    }

    #[test]
    fn test_verify() {
        let data = b"payload bytes";
        let sum = fletcher16(data);
        assert!(verify(data, sum));
        assert!(!verify(data, sum.wrapping_add(1)));
    }
}
