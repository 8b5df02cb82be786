//! Data alignment request record (0xA11E).
//!
//! Local payload: a u16 whose low 15 bits are the requested alignment of the
//! entry data and whose top bit says a writer may change the compression
//! method to honour it, followed by zero padding. The central copy is the u16
//! alone.

use super::ExtraFieldRecord;
use oxizip_core::bytes::ZipShort;
use oxizip_core::error::{OxiZipError, Result, span};

const ALLOW_METHOD_CHANGE_FLAG: u16 = 0x8000;

/// Alignment request with optional local padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceAlignmentExtraField {
    alignment: u16,
    allow_method_change: bool,
    padding: usize,
}

impl ResourceAlignmentExtraField {
    /// Header id of the record.
    pub const HEADER_ID: u16 = 0xA11E;

    /// Largest alignment the 15-bit field holds.
    pub const MAX_ALIGNMENT: u16 = 0x7FFF;

    /// A request for `alignment` bytes with `padding` zero bytes in the local
    /// copy. Fails when the alignment does not fit in 15 bits.
    pub fn new(alignment: u16, allow_method_change: bool, padding: usize) -> Result<Self> {
        if alignment > Self::MAX_ALIGNMENT {
            return Err(OxiZipError::malformed(
                Self::HEADER_ID,
                format!("alignment {alignment} exceeds {}", Self::MAX_ALIGNMENT),
            ));
        }
        Ok(Self {
            alignment,
            allow_method_change,
            padding,
        })
    }

    /// Requested alignment of the entry data.
    pub fn alignment(&self) -> u16 {
        self.alignment
    }

    /// Whether a writer may switch methods to satisfy the alignment.
    pub fn allow_method_change(&self) -> bool {
        self.allow_method_change
    }

    /// Zero bytes after the u16 in the local copy.
    pub fn padding(&self) -> usize {
        self.padding
    }

    fn raw(&self) -> u16 {
        let flag = if self.allow_method_change {
            ALLOW_METHOD_CHANGE_FLAG
        } else {
            0
        };
        self.alignment | flag
    }

    fn read_raw(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        if length < ZipShort::BYTES {
            return Err(OxiZipError::malformed(
                Self::HEADER_ID,
                format!("need at least 2 bytes, found {length}"),
            ));
        }
        span(buf, offset, length)?;
        let raw = ZipShort::from_bytes(buf, offset)?.value();
        self.alignment = raw & !ALLOW_METHOD_CHANGE_FLAG;
        self.allow_method_change = raw & ALLOW_METHOD_CHANGE_FLAG != 0;
        Ok(())
    }
}

impl ExtraFieldRecord for ResourceAlignmentExtraField {
    fn header_id(&self) -> u16 {
        Self::HEADER_ID
    }

    fn local_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(ZipShort::BYTES + self.padding);
        data.extend_from_slice(&ZipShort::new(self.raw()).to_bytes());
        data.resize(ZipShort::BYTES + self.padding, 0);
        data
    }

    fn central_data(&self) -> Vec<u8> {
        ZipShort::new(self.raw()).to_bytes().to_vec()
    }

    fn parse_local(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        self.read_raw(buf, offset, length)?;
        self.padding = length - ZipShort::BYTES;
        Ok(())
    }

    fn parse_central(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        self.read_raw(buf, offset, length)
    }

    fn clone_box(&self) -> Box<dyn ExtraFieldRecord> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_padding_central_bare() {
        let field = ResourceAlignmentExtraField::new(4, true, 3).unwrap();
        assert_eq!(field.local_data(), vec![0x04, 0x80, 0, 0, 0]);
        assert_eq!(field.central_data(), vec![0x04, 0x80]);
    }

    #[test]
    fn test_parse_local_keeps_padding() {
        let mut field = ResourceAlignmentExtraField::default();
        field.parse_local(&[0x00, 0x10, 0, 0], 0, 4).unwrap();
        assert_eq!(field.alignment(), 0x1000);
        assert!(!field.allow_method_change());
        assert_eq!(field.padding(), 2);
        assert_eq!(field.local_data(), vec![0x00, 0x10, 0, 0]);
    }

    #[test]
    fn test_rejects_short_payload_and_wide_alignment() {
        let mut field = ResourceAlignmentExtraField::default();
        assert!(field.parse_local(&[0x01], 0, 1).is_err());
        assert!(ResourceAlignmentExtraField::new(0x8000, false, 0).is_err());
    }
}
