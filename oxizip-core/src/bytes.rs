//! Fixed-width little-endian integer fields.
//!
//! ZIP headers store every integer in little-endian order. The 2-byte and
//! 4-byte fields are plain unsigned values; the 8-byte field used by Zip64 is
//! logically unsigned as well, which matters when a caller carries it around
//! as a signed 64-bit host integer.
//!
//! ```
//! use oxizip_core::bytes::{ZipEightByteInteger, ZipShort};
//!
//! let short = ZipShort::new(0x0808);
//! assert_eq!(short.to_bytes(), [0x08, 0x08]);
//!
//! let eight = ZipEightByteInteger::from_i64(-1);
//! assert_eq!(eight.to_bytes(), [0xFF; 8]);
//! assert_eq!(eight.value(), u64::MAX);
//! ```

use crate::error::{Result, span};

/// Read a little-endian `u16` at `offset`.
pub fn read_u16(buf: &[u8], offset: usize) -> Result<u16> {
    let bytes = span(buf, offset, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Read a little-endian `u32` at `offset`.
pub fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    let bytes = span(buf, offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a little-endian `u64` at `offset`.
pub fn read_u64(buf: &[u8], offset: usize) -> Result<u64> {
    let bytes = span(buf, offset, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(raw))
}

fn put_bytes(buf: &mut [u8], offset: usize, bytes: &[u8]) -> Result<()> {
    // Same bounds error as a read of the span.
    span(buf, offset, bytes.len())?;
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    Ok(())
}

/// A 2-byte header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ZipShort(u16);

impl ZipShort {
    /// Width of the field on the wire.
    pub const BYTES: usize = 2;
    /// The zero value.
    pub const ZERO: Self = Self(0);

    /// Wrap a value.
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Decode the field at `offset`.
    pub fn from_bytes(buf: &[u8], offset: usize) -> Result<Self> {
        read_u16(buf, offset).map(Self)
    }

    /// The wrapped value.
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Encode to exactly two bytes.
    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    /// Write the encoded field into `buf` at `offset`.
    pub fn put(self, buf: &mut [u8], offset: usize) -> Result<()> {
        put_bytes(buf, offset, &self.to_bytes())
    }
}

impl From<u16> for ZipShort {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// A 4-byte header field (CRC-32 and 32-bit sizes/offsets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ZipLong(u32);

impl ZipLong {
    /// Width of the field on the wire.
    pub const BYTES: usize = 4;
    /// The value that marks a field as moved into the Zip64 extra field.
    pub const ZIP64_MAGIC: Self = Self(0xFFFF_FFFF);

    /// Wrap a value.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Decode the field at `offset`.
    pub fn from_bytes(buf: &[u8], offset: usize) -> Result<Self> {
        read_u32(buf, offset).map(Self)
    }

    /// The wrapped value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Encode to exactly four bytes.
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Write the encoded field into `buf` at `offset`.
    pub fn put(self, buf: &mut [u8], offset: usize) -> Result<()> {
        put_bytes(buf, offset, &self.to_bytes())
    }
}

impl From<u32> for ZipLong {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// An 8-byte header field, logically unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ZipEightByteInteger(u64);

impl ZipEightByteInteger {
    /// Width of the field on the wire.
    pub const BYTES: usize = 8;
    /// The zero value.
    pub const ZERO: Self = Self(0);

    /// Wrap an unsigned value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Wrap a signed host value, keeping its bit pattern.
    pub const fn from_i64(value: i64) -> Self {
        Self(value as u64)
    }

    /// Decode the field at `offset`.
    pub fn from_bytes(buf: &[u8], offset: usize) -> Result<Self> {
        read_u64(buf, offset).map(Self)
    }

    /// The unsigned value.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The same bit pattern as a signed host integer.
    ///
    /// Values at or above 2^63 come out negative; use
    /// [`to_unsigned_magnitude`](Self::to_unsigned_magnitude) to recover them.
    pub const fn long_value(self) -> i64 {
        self.0 as i64
    }

    /// Encode to exactly eight bytes.
    pub const fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Write the encoded field into `buf` at `offset`.
    pub fn put(self, buf: &mut [u8], offset: usize) -> Result<()> {
        put_bytes(buf, offset, &self.to_bytes())
    }

    /// True non-negative magnitude of a decoded signed value.
    ///
    /// Adds 2^63 to the low 63 bits when the sign bit is set.
    pub const fn to_unsigned_magnitude(value: i64) -> u64 {
        let low = (value & i64::MAX) as u64;
        if value < 0 { low | (1 << 63) } else { low }
    }

    /// Inverse of [`to_unsigned_magnitude`](Self::to_unsigned_magnitude),
    /// truncating the magnitude to 64 bits.
    pub const fn from_magnitude(magnitude: u128) -> i64 {
        magnitude as u64 as i64
    }
}

impl From<u64> for ZipEightByteInteger {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OxiZipError;

    #[test]
    fn test_short_wire_order() {
        assert_eq!(ZipShort::new(0x1234).to_bytes(), [0x34, 0x12]);
        let parsed = ZipShort::from_bytes(&[0xAA, 0x34, 0x12], 1).unwrap();
        assert_eq!(parsed.value(), 0x1234);
    }

    #[test]
    fn test_long_put_and_read() {
        let mut buf = [0u8; 6];
        ZipLong::new(0xDEAD_BEEF).put(&mut buf, 1).unwrap();
        assert_eq!(buf, [0, 0xEF, 0xBE, 0xAD, 0xDE, 0]);
        assert_eq!(read_u32(&buf, 1).unwrap(), 0xDEAD_BEEF);
        assert!(ZipLong::new(1).put(&mut buf, 3).is_err());
        assert_eq!(buf[5], 0);
    }

    #[test]
    fn test_eight_byte_minus_one() {
        let value = ZipEightByteInteger::from_i64(-1);
        assert_eq!(value.to_bytes(), [0xFF; 8]);
        assert_eq!(ZipEightByteInteger::to_unsigned_magnitude(-1), u64::MAX);
        assert_eq!(
            ZipEightByteInteger::from_magnitude(u128::from(u64::MAX)),
            -1
        );
    }

    #[test]
    fn test_eight_byte_high_bit() {
        let bytes = [0, 0, 0, 0, 0, 0, 0, 0x80];
        let value = ZipEightByteInteger::from_bytes(&bytes, 0).unwrap();
        assert_eq!(value.long_value(), i64::MIN);
        assert_eq!(value.value(), 1 << 63);
        assert_eq!(
            ZipEightByteInteger::to_unsigned_magnitude(value.long_value()),
            1 << 63
        );
    }

    #[test]
    fn test_from_magnitude_truncates() {
        let magnitude = (1u128 << 64) + 5;
        assert_eq!(ZipEightByteInteger::from_magnitude(magnitude), 5);
    }

    #[test]
    fn test_short_read_past_end() {
        let err = read_u16(&[0x01], 0).unwrap_err();
        assert!(matches!(
            err,
            OxiZipError::Bounds {
                offset: 0,
                needed: 2,
                available: 1
            }
        ));
        assert!(ZipEightByteInteger::from_bytes(&[0u8; 8], 1).is_err());
    }
}
