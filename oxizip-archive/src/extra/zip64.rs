//! Zip64 extended information record (0x0001).
//!
//! Holds the 64-bit forms of the uncompressed size, compressed size and local
//! header offset, plus a 32-bit disk number. A field is present only when the
//! corresponding 32-bit header field is saturated at `0xFFFFFFFF`.
//!
//! The local header copy is either empty or carries both sizes, optionally
//! followed by the offset and disk number. A missing size or offset is
//! written as zero when a later field is present, so the offset and disk
//! number are never dropped from the local copy. The central copy carries the
//! present fields in order. A central payload cannot be decoded without
//! knowing which header fields were saturated, so it is parsed greedily and
//! the raw bytes are kept for [`reparse_central`].
//!
//! [`reparse_central`]: Zip64ExtendedInformationExtraField::reparse_central

use super::ExtraFieldRecord;
use oxizip_core::bytes::{ZipEightByteInteger, ZipLong};
use oxizip_core::error::{OxiZipError, Result, span};

const WORD: usize = ZipEightByteInteger::BYTES;
const DISK: usize = ZipLong::BYTES;

/// Zip64 sizes, offset and disk number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zip64ExtendedInformationExtraField {
    size: Option<u64>,
    compressed_size: Option<u64>,
    relative_header_offset: Option<u64>,
    disk_start_number: Option<u32>,
    raw_central: Option<Vec<u8>>,
}

impl Zip64ExtendedInformationExtraField {
    /// Header id of the record.
    pub const HEADER_ID: u16 = 0x0001;

    /// A record with no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// A record carrying both sizes, the shape of a local header copy.
    pub fn with_sizes(size: u64, compressed_size: u64) -> Self {
        Self {
            size: Some(size),
            compressed_size: Some(compressed_size),
            ..Self::default()
        }
    }

    /// Uncompressed size.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Compressed size.
    pub fn compressed_size(&self) -> Option<u64> {
        self.compressed_size
    }

    /// Offset of the local header.
    pub fn relative_header_offset(&self) -> Option<u64> {
        self.relative_header_offset
    }

    /// Disk on which the entry starts.
    pub fn disk_start_number(&self) -> Option<u32> {
        self.disk_start_number
    }

    /// Set the uncompressed size.
    pub fn set_size(&mut self, size: Option<u64>) {
        self.size = size;
    }

    /// Set the compressed size.
    pub fn set_compressed_size(&mut self, compressed_size: Option<u64>) {
        self.compressed_size = compressed_size;
    }

    /// Set the local header offset.
    pub fn set_relative_header_offset(&mut self, offset: Option<u64>) {
        self.relative_header_offset = offset;
    }

    /// Set the disk number.
    pub fn set_disk_start_number(&mut self, disk: Option<u32>) {
        self.disk_start_number = disk;
    }

    /// The central payload exactly as it was parsed.
    pub fn raw_central_data(&self) -> Option<&[u8]> {
        self.raw_central.as_deref()
    }

    /// Re-read the kept central payload now that the caller knows which
    /// header fields were saturated.
    ///
    /// Fields not flagged are cleared. Fails when the payload length does not
    /// match the flags. Without a kept central payload this does nothing.
    pub fn reparse_central(
        &mut self,
        has_size: bool,
        has_compressed_size: bool,
        has_offset: bool,
        has_disk: bool,
    ) -> Result<()> {
        let Some(raw) = self.raw_central.take() else {
            return Ok(());
        };

        let expected = WORD * usize::from(has_size)
            + WORD * usize::from(has_compressed_size)
            + WORD * usize::from(has_offset)
            + DISK * usize::from(has_disk);
        if raw.len() != expected {
            let message = format!(
                "central payload is {} bytes, header fields call for {expected}",
                raw.len()
            );
            self.raw_central = Some(raw);
            return Err(OxiZipError::malformed(Self::HEADER_ID, message));
        }

        let mut cursor = 0;
        let mut next_word = |present: bool| -> Result<Option<u64>> {
            if !present {
                return Ok(None);
            }
            let value = ZipEightByteInteger::from_bytes(&raw, cursor)?.value();
            cursor += WORD;
            Ok(Some(value))
        };
        self.size = next_word(has_size)?;
        self.compressed_size = next_word(has_compressed_size)?;
        self.relative_header_offset = next_word(has_offset)?;
        self.disk_start_number = if has_disk {
            Some(ZipLong::from_bytes(&raw, cursor)?.value())
        } else {
            None
        };
        self.raw_central = Some(raw);
        Ok(())
    }

    fn push_tail(&self, data: &mut Vec<u8>) {
        if let Some(offset) = self.relative_header_offset {
            data.extend_from_slice(&ZipEightByteInteger::new(offset).to_bytes());
        }
        if let Some(disk) = self.disk_start_number {
            data.extend_from_slice(&ZipLong::new(disk).to_bytes());
        }
    }
}

impl ExtraFieldRecord for Zip64ExtendedInformationExtraField {
    fn header_id(&self) -> u16 {
        Self::HEADER_ID
    }

    fn local_data(&self) -> Vec<u8> {
        if self.size.is_none()
            && self.compressed_size.is_none()
            && self.relative_header_offset.is_none()
            && self.disk_start_number.is_none()
        {
            return Vec::new();
        }
        let mut data = Vec::with_capacity(2 * WORD + WORD + DISK);
        data.extend_from_slice(&ZipEightByteInteger::new(self.size.unwrap_or(0)).to_bytes());
        data.extend_from_slice(
            &ZipEightByteInteger::new(self.compressed_size.unwrap_or(0)).to_bytes(),
        );
        if let Some(disk) = self.disk_start_number {
            let offset = self.relative_header_offset.unwrap_or(0);
            data.extend_from_slice(&ZipEightByteInteger::new(offset).to_bytes());
            data.extend_from_slice(&ZipLong::new(disk).to_bytes());
        } else {
            self.push_tail(&mut data);
        }
        data
    }

    fn central_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(3 * WORD + DISK);
        for value in [self.size, self.compressed_size].into_iter().flatten() {
            data.extend_from_slice(&ZipEightByteInteger::new(value).to_bytes());
        }
        self.push_tail(&mut data);
        data
    }

    fn parse_local(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        let payload = span(buf, offset, length)?;
        *self = Self::default();
        match length {
            0 => return Ok(()),
            16 | 24 | 28 => {}
            _ => {
                return Err(OxiZipError::malformed(
                    Self::HEADER_ID,
                    format!("local payload must be 0, 16, 24 or 28 bytes, found {length}"),
                ));
            }
        }
        self.size = Some(ZipEightByteInteger::from_bytes(payload, 0)?.value());
        self.compressed_size = Some(ZipEightByteInteger::from_bytes(payload, WORD)?.value());
        if length >= 3 * WORD {
            self.relative_header_offset =
                Some(ZipEightByteInteger::from_bytes(payload, 2 * WORD)?.value());
        }
        if length == 3 * WORD + DISK {
            self.disk_start_number = Some(ZipLong::from_bytes(payload, 3 * WORD)?.value());
        }
        Ok(())
    }

    fn parse_central(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        let payload = span(buf, offset, length)?;
        let words = (length / WORD).min(3);
        let rest = length - words * WORD;
        if rest != 0 && rest != DISK {
            return Err(OxiZipError::malformed(
                Self::HEADER_ID,
                format!("central payload of {length} bytes is not 8k or 8k+4 with k <= 3"),
            ));
        }

        let mut values = (0..words)
            .map(|i| ZipEightByteInteger::from_bytes(payload, i * WORD).map(|v| v.value()))
            .collect::<Result<Vec<_>>>()?
            .into_iter();
        self.size = values.next();
        self.compressed_size = values.next();
        self.relative_header_offset = values.next();
        self.disk_start_number = if rest == DISK {
            Some(ZipLong::from_bytes(payload, words * WORD)?.value())
        } else {
            None
        };
        self.raw_central = Some(payload.to_vec());
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ExtraFieldRecord> {
        Box::new(self.clone())
    }
}
