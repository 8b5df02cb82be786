//! Info-ZIP "new Unix" ownership record (0x7875).
//!
//! Local payload: version (1), uid size, uid (LE), gid size, gid (LE). The
//! central copy is written empty. A non-empty central copy from another
//! writer is kept as read and replayed.

use super::ExtraFieldRecord;
use oxizip_core::error::{OxiZipError, Result, span};

const VERSION: u8 = 1;
const DEFAULT_ID: u64 = 1000;

/// Unix user and group ids.
///
/// Ids are kept as the little-endian bytes that were read, so a record with
/// leading zero padding (some writers emit 4-byte ids) is replayed exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnixOwnership {
    version: u8,
    uid: Vec<u8>,
    gid: Vec<u8>,
    central: Option<Vec<u8>>,
}

impl Default for UnixOwnership {
    fn default() -> Self {
        Self::new()
    }
}

impl UnixOwnership {
    /// Header id of the record.
    pub const HEADER_ID: u16 = 0x7875;

    /// A record for uid and gid 1000.
    pub fn new() -> Self {
        Self::with_ids(DEFAULT_ID, DEFAULT_ID)
    }

    /// A record for the given ids, each stored in as few bytes as it needs.
    pub fn with_ids(uid: u64, gid: u64) -> Self {
        Self {
            version: VERSION,
            uid: minimal_le(uid),
            gid: minimal_le(gid),
            central: None,
        }
    }

    /// The central payload as read, if a central copy was parsed.
    pub fn central_copy(&self) -> Option<&[u8]> {
        self.central.as_deref()
    }

    /// The user id, if it fits in 64 bits.
    pub fn uid(&self) -> Option<u64> {
        from_le(&self.uid)
    }

    /// The group id, if it fits in 64 bits.
    pub fn gid(&self) -> Option<u64> {
        from_le(&self.gid)
    }

    /// Replace the user id.
    pub fn set_uid(&mut self, uid: u64) {
        self.uid = minimal_le(uid);
    }

    /// Replace the group id.
    pub fn set_gid(&mut self, gid: u64) {
        self.gid = minimal_le(gid);
    }

    fn read_id<'a>(buf: &'a [u8], cursor: &mut usize, end: usize) -> Result<&'a [u8]> {
        if *cursor >= end {
            return Err(OxiZipError::malformed(Self::HEADER_ID, "missing id size"));
        }
        let size = usize::from(buf[*cursor]);
        *cursor += 1;
        if *cursor + size > end {
            return Err(OxiZipError::malformed(
                Self::HEADER_ID,
                format!("id of {size} bytes runs past the payload"),
            ));
        }
        let id = &buf[*cursor..*cursor + size];
        *cursor += size;
        Ok(id)
    }
}

fn minimal_le(value: u64) -> Vec<u8> {
    let bytes = value.to_le_bytes();
    let used = bytes.iter().rposition(|&b| b != 0).map_or(1, |last| last + 1);
    bytes[..used].to_vec()
}

fn from_le(bytes: &[u8]) -> Option<u64> {
    let mut value = 0u64;
    for (i, &b) in bytes.iter().enumerate() {
        if b == 0 {
            continue;
        }
        if i >= 8 {
            return None;
        }
        value |= u64::from(b) << (8 * i);
    }
    Some(value)
}

impl ExtraFieldRecord for UnixOwnership {
    fn header_id(&self) -> u16 {
        Self::HEADER_ID
    }

    fn local_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(3 + self.uid.len() + self.gid.len());
        data.push(self.version);
        data.push(self.uid.len() as u8);
        data.extend_from_slice(&self.uid);
        data.push(self.gid.len() as u8);
        data.extend_from_slice(&self.gid);
        data
    }

    fn central_data(&self) -> Vec<u8> {
        self.central.clone().unwrap_or_default()
    }

    fn parse_local(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        span(buf, offset, length)?;
        let end = offset + length;
        if length == 0 {
            return Err(OxiZipError::malformed(Self::HEADER_ID, "empty payload"));
        }
        let version = buf[offset];
        let mut cursor = offset + 1;
        let uid = Self::read_id(buf, &mut cursor, end)?.to_vec();
        let gid = Self::read_id(buf, &mut cursor, end)?.to_vec();
        if cursor != end {
            return Err(OxiZipError::malformed(
                Self::HEADER_ID,
                format!("{} unexpected trailing bytes", end - cursor),
            ));
        }
        *self = Self {
            version,
            uid,
            gid,
            central: self.central.take(),
        };
        Ok(())
    }

    fn parse_central(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        self.central = Some(span(buf, offset, length)?.to_vec());
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ExtraFieldRecord> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ids() {
        let field = UnixOwnership::new();
        assert_eq!(field.local_data(), vec![1, 2, 0xE8, 0x03, 2, 0xE8, 0x03]);
        assert!(field.central_data().is_empty());
    }

    #[test]
    fn test_root_ids_use_one_byte() {
        let field = UnixOwnership::with_ids(0, 0);
        assert_eq!(field.local_data(), vec![1, 1, 0, 1, 0]);
    }

    #[test]
    fn test_padded_ids_replay_exactly() {
        let data = [1, 4, 0xF5, 0x01, 0, 0, 4, 0x14, 0, 0, 0];
        let mut field = UnixOwnership::new();
        field.parse_local(&data, 0, data.len()).unwrap();
        assert_eq!(field.uid(), Some(501));
        assert_eq!(field.gid(), Some(20));
        assert_eq!(field.local_data(), data);
    }

    #[test]
    fn test_oversized_id_is_not_u64() {
        let mut data = vec![1, 9];
        data.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 0, 1]);
        data.extend_from_slice(&[1, 7]);
        let mut field = UnixOwnership::new();
        field.parse_local(&data, 0, data.len()).unwrap();
        assert_eq!(field.uid(), None);
        assert_eq!(field.gid(), Some(7));
    }

    #[test]
    fn test_malformed_payloads() {
        let mut field = UnixOwnership::new();
        assert!(field.parse_local(&[1, 4, 0xF5], 0, 3).is_err());
        assert!(field.parse_local(&[1, 1, 0], 0, 3).is_err());
        assert!(field.parse_central(&[1], 0, 2).is_err());
    }

    #[test]
    fn test_central_copy_is_replayed() {
        let mut field = UnixOwnership::with_ids(501, 20);
        assert_eq!(field.central_copy(), None);

        field.parse_central(&[], 0, 0).unwrap();
        assert_eq!(field.central_copy(), Some(&[][..]));
        assert!(field.central_data().is_empty());

        field.parse_central(&[0xAA, 1, 0, 0xBB], 1, 2).unwrap();
        assert_eq!(field.central_data(), vec![1, 0]);
        // Local ids are untouched by the central copy.
        assert_eq!(field.uid(), Some(501));
        assert_eq!(field.local_data(), vec![1, 2, 0xF5, 0x01, 1, 0x14]);
    }
}
