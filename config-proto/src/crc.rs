//! CRC-16 checksum for protocol frames.
//!
//! CCITT polynomial 0x1021, init 0xFFFF (CRC-16/IBM-3740), computed over
//! TYPE + SEQ + payload.

use crc::{Crc, CRC_16_IBM_3740};

/// CRC-16/IBM-3740 calculator with lookup table.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Calculate the CRC-16 checksum of a byte slice.
#[inline]
#[must_use]
pub fn calculate_crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// CRC-16 digest for incremental calculation.
///
/// Use this when checksumming a frame built piecewise (type + seq +
/// payload) without an intermediate buffer.
pub struct Crc16Digest {
    digest: crc::Digest<'static, u16>,
}

impl Crc16Digest {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            digest: CRC16.digest(),
        }
    }

    /// Update the digest with a single byte.
    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.digest.update(&[byte]);
    }

    /// Update the digest with a byte slice.
    #[inline]
    pub fn update_slice(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    /// Finalize and return the checksum value.
    #[inline]
    #[must_use]
    pub fn finalize(self) -> u16 {
        self.digest.finalize()
    }
}

impl Default for Crc16Digest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_reference_vector() {
        // The CCITT check value.
        assert_eq!(calculate_crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_crc16_empty() {
        assert_eq!(calculate_crc16(&[]), 0xFFFF);
    }

    #[test]
    fn test_crc16_digest_matches_batch() {
        let data = b"\x01\x00{\"cmd\":\"PING\"}";
        let batch = calculate_crc16(data);

        let mut digest = Crc16Digest::new();
        for &b in data.iter() {
            digest.update(b);
        }
        assert_eq!(digest.finalize(), batch);
    }

    #[test]
    fn test_crc16_digest_slice() {
        let data = b"frame payload";
        let mut digest = Crc16Digest::new();
        digest.update_slice(data);
        assert_eq!(digest.finalize(), calculate_crc16(data));
    }
}
