//! General purpose bit flag field of the local and central headers.
//!
//! Only two bits are modelled: bit 3 (CRC and sizes follow the data in a data
//! descriptor) and bit 11 (name and comment are UTF-8). Every other bit is
//! dropped on parse and written as zero.

use oxizip_core::bytes::ZipShort;
use oxizip_core::error::Result;

/// Bit 3: CRC-32 and sizes are deferred to a data descriptor.
pub const DATA_DESCRIPTOR_FLAG: u16 = 1 << 3;

/// Bit 11: name and comment bytes are UTF-8 (the "language encoding" flag).
pub const UTF8_NAMES_FLAG: u16 = 1 << 11;

/// The general purpose bit flag of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GeneralPurposeBit {
    data_descriptor: bool,
    utf8_names: bool,
}

impl GeneralPurposeBit {
    /// Flags with both bits clear.
    pub const fn new() -> Self {
        Self {
            data_descriptor: false,
            utf8_names: false,
        }
    }

    /// Interpret a raw 16-bit field, ignoring unknown bits.
    pub const fn from_raw(raw: u16) -> Self {
        Self {
            data_descriptor: raw & DATA_DESCRIPTOR_FLAG != 0,
            utf8_names: raw & UTF8_NAMES_FLAG != 0,
        }
    }

    /// Parse the 2-byte field at `offset`.
    pub fn parse(buf: &[u8], offset: usize) -> Result<Self> {
        ZipShort::from_bytes(buf, offset).map(|field| Self::from_raw(field.value()))
    }

    /// The raw 16-bit value.
    pub const fn to_raw(self) -> u16 {
        let mut raw = 0;
        if self.data_descriptor {
            raw |= DATA_DESCRIPTOR_FLAG;
        }
        if self.utf8_names {
            raw |= UTF8_NAMES_FLAG;
        }
        raw
    }

    /// Encode to the 2-byte wire form.
    pub const fn encode(self) -> [u8; 2] {
        ZipShort::new(self.to_raw()).to_bytes()
    }

    /// Whether a data descriptor follows the entry's data.
    pub const fn uses_data_descriptor(self) -> bool {
        self.data_descriptor
    }

    /// Whether name and comment are UTF-8.
    pub const fn uses_utf8_names(self) -> bool {
        self.utf8_names
    }

    /// Set or clear the data descriptor bit.
    pub fn use_data_descriptor(&mut self, value: bool) {
        self.data_descriptor = value;
    }

    /// Set or clear the UTF-8 names bit.
    pub fn use_utf8_names(&mut self, value: bool) {
        self.utf8_names = value;
    }

    /// Builder form of [`use_data_descriptor`](Self::use_data_descriptor).
    pub fn with_data_descriptor(mut self, value: bool) -> Self {
        self.data_descriptor = value;
        self
    }

    /// Builder form of [`use_utf8_names`](Self::use_utf8_names).
    pub fn with_utf8_names(mut self, value: bool) -> Self {
        self.utf8_names = value;
        self
    }
}
