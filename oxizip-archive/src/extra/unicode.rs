//! Info-ZIP Unicode path (0x7075) and comment (0x6375) records.
//!
//! Payload: version (1), CRC-32 of the name or comment bytes as stored in
//! the header, then the UTF-8 text. A reader only trusts the UTF-8 text when
//! the CRC still matches the header bytes, which detects a tool that renamed
//! the entry without updating the record.

use super::ExtraFieldRecord;
use oxizip_core::bytes::ZipLong;
use oxizip_core::error::{OxiZipError, Result, span};

const VERSION: u8 = 1;
const FIXED_LEN: usize = 1 + ZipLong::BYTES;

/// Shared body of the two Unicode records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnicodeExtraData {
    name_crc32: u32,
    unicode_name: Vec<u8>,
}

impl UnicodeExtraData {
    /// Record `text` as the UTF-8 form of the header bytes `raw`.
    pub fn new(text: &str, raw: &[u8]) -> Self {
        Self {
            name_crc32: crc32fast::hash(raw),
            unicode_name: text.as_bytes().to_vec(),
        }
    }

    /// CRC-32 of the header bytes this record describes.
    pub fn name_crc32(&self) -> u32 {
        self.name_crc32
    }

    /// The UTF-8 bytes carried by the record.
    pub fn unicode_name(&self) -> &[u8] {
        &self.unicode_name
    }

    /// The carried text when it describes `raw` and is valid UTF-8.
    pub fn text_for(&self, raw: &[u8]) -> Option<&str> {
        if crc32fast::hash(raw) != self.name_crc32 {
            return None;
        }
        std::str::from_utf8(&self.unicode_name).ok()
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(FIXED_LEN + self.unicode_name.len());
        data.push(VERSION);
        data.extend_from_slice(&ZipLong::new(self.name_crc32).to_bytes());
        data.extend_from_slice(&self.unicode_name);
        data
    }

    fn parse(header_id: u16, buf: &[u8], offset: usize, length: usize) -> Result<Self> {
        let payload = span(buf, offset, length)?;
        if length < FIXED_LEN {
            return Err(OxiZipError::malformed(
                header_id,
                format!("need at least {FIXED_LEN} bytes, found {length}"),
            ));
        }
        if payload[0] != VERSION {
            return Err(OxiZipError::malformed(
                header_id,
                format!("unsupported version {}", payload[0]),
            ));
        }
        Ok(Self {
            name_crc32: ZipLong::from_bytes(payload, 1)?.value(),
            unicode_name: payload[FIXED_LEN..].to_vec(),
        })
    }
}

macro_rules! unicode_record {
    ($(#[$doc:meta])* $name:ident, $id:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name(UnicodeExtraData);

        impl $name {
            /// Header id of the record.
            pub const HEADER_ID: u16 = $id;

            /// Record `text` as the UTF-8 form of the header bytes `raw`.
            pub fn new(text: &str, raw: &[u8]) -> Self {
                Self(UnicodeExtraData::new(text, raw))
            }

            /// The shared record body.
            pub fn data(&self) -> &UnicodeExtraData {
                &self.0
            }

            /// The carried text when it describes `raw`.
            pub fn text_for(&self, raw: &[u8]) -> Option<&str> {
                self.0.text_for(raw)
            }
        }

        impl ExtraFieldRecord for $name {
            fn header_id(&self) -> u16 {
                Self::HEADER_ID
            }

            fn local_data(&self) -> Vec<u8> {
                self.0.to_bytes()
            }

            fn parse_local(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
                self.0 = UnicodeExtraData::parse(Self::HEADER_ID, buf, offset, length)?;
                Ok(())
            }

            fn clone_box(&self) -> Box<dyn ExtraFieldRecord> {
                Box::new(self.clone())
            }
        }
    };
}

unicode_record!(
    /// UTF-8 form of an entry name.
    UnicodePathExtraField,
    0x7075
);

unicode_record!(
    /// UTF-8 form of an entry comment.
    UnicodeCommentExtraField,
    0x6375
);
