//! Info-ZIP extended timestamp (0x5455).
//!
//! Payload: a flags byte (bit 0 modify, bit 1 access, bit 2 create) followed
//! by a signed 32-bit Unix time for each flagged field, in that order. The
//! central copy has its own flags byte, which usually mirrors the local one,
//! but it carries only the modify time.

use super::ExtraFieldRecord;
use oxizip_core::bytes::ZipLong;
use oxizip_core::error::{OxiZipError, Result, span};

const MODIFY_TIME_BIT: u8 = 1;
const ACCESS_TIME_BIT: u8 = 1 << 1;
const CREATE_TIME_BIT: u8 = 1 << 2;
const TIME_BITS: u8 = MODIFY_TIME_BIT | ACCESS_TIME_BIT | CREATE_TIME_BIT;

/// Modification, access and creation times in seconds since the Unix epoch.
///
/// The local flags byte always matches the times present. The central flags
/// byte is kept as read, so a central header whose flags differ from the
/// local ones is replayed unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtendedTimestamp {
    flags: u8,
    central_flags: u8,
    modify_time: Option<i32>,
    access_time: Option<i32>,
    create_time: Option<i32>,
}

impl ExtendedTimestamp {
    /// Header id of the record.
    pub const HEADER_ID: u16 = 0x5455;

    /// A record with no times set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set_modify_time`](Self::set_modify_time).
    pub fn with_modify_time(mut self, time: i32) -> Self {
        self.set_modify_time(Some(time));
        self
    }

    /// Builder form of [`set_access_time`](Self::set_access_time).
    pub fn with_access_time(mut self, time: i32) -> Self {
        self.set_access_time(Some(time));
        self
    }

    /// Builder form of [`set_create_time`](Self::set_create_time).
    pub fn with_create_time(mut self, time: i32) -> Self {
        self.set_create_time(Some(time));
        self
    }

    /// Set or clear the modification time and its flag bit.
    pub fn set_modify_time(&mut self, time: Option<i32>) {
        self.modify_time = time;
        self.set_bit(MODIFY_TIME_BIT, time.is_some());
    }

    /// Set or clear the access time and its flag bit.
    pub fn set_access_time(&mut self, time: Option<i32>) {
        self.access_time = time;
        self.set_bit(ACCESS_TIME_BIT, time.is_some());
    }

    /// Set or clear the creation time and its flag bit.
    pub fn set_create_time(&mut self, time: Option<i32>) {
        self.create_time = time;
        self.set_bit(CREATE_TIME_BIT, time.is_some());
    }

    /// The local flags byte: reserved bits as read, time bits as present.
    pub fn flags(&self) -> u8 {
        let mut present = 0;
        for (bit, time) in [
            (MODIFY_TIME_BIT, self.modify_time),
            (ACCESS_TIME_BIT, self.access_time),
            (CREATE_TIME_BIT, self.create_time),
        ] {
            if time.is_some() {
                present |= bit;
            }
        }
        (self.flags & !TIME_BITS) | present
    }

    /// The central flags byte.
    pub fn central_flags(&self) -> u8 {
        self.central_flags
    }

    /// Modification time, if present.
    pub fn modify_time(&self) -> Option<i32> {
        self.modify_time
    }

    /// Access time, if present.
    pub fn access_time(&self) -> Option<i32> {
        self.access_time
    }

    /// Creation time, if present.
    pub fn create_time(&self) -> Option<i32> {
        self.create_time
    }

    fn set_bit(&mut self, bit: u8, on: bool) {
        if on {
            self.central_flags |= bit;
        } else {
            self.central_flags &= !bit;
        }
    }

    fn read_time(buf: &[u8], cursor: &mut usize, end: usize) -> Result<i32> {
        if *cursor + ZipLong::BYTES > end {
            return Err(OxiZipError::malformed(
                Self::HEADER_ID,
                "flagged time runs past the payload",
            ));
        }
        let value = ZipLong::from_bytes(buf, *cursor)?.value();
        *cursor += ZipLong::BYTES;
        Ok(value as i32)
    }
}

impl ExtraFieldRecord for ExtendedTimestamp {
    fn header_id(&self) -> u16 {
        Self::HEADER_ID
    }

    fn local_data(&self) -> Vec<u8> {
        let mut data = vec![self.flags()];
        for time in [self.modify_time, self.access_time, self.create_time]
            .into_iter()
            .flatten()
        {
            data.extend_from_slice(&ZipLong::new(time as u32).to_bytes());
        }
        data
    }

    fn central_data(&self) -> Vec<u8> {
        let mut data = vec![self.central_flags];
        let central_modify = self.central_flags & MODIFY_TIME_BIT != 0;
        if let Some(time) = self.modify_time.filter(|_| central_modify) {
            data.extend_from_slice(&ZipLong::new(time as u32).to_bytes());
        }
        data
    }

    fn parse_local(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        span(buf, offset, length)?;
        if length == 0 {
            return Err(OxiZipError::malformed(Self::HEADER_ID, "empty payload"));
        }
        let end = offset + length;
        let flags = buf[offset];
        let mut cursor = offset + 1;

        let mut parsed = Self {
            flags,
            central_flags: flags,
            ..Self::default()
        };
        if flags & MODIFY_TIME_BIT != 0 {
            parsed.modify_time = Some(Self::read_time(buf, &mut cursor, end)?);
        }
        if flags & ACCESS_TIME_BIT != 0 {
            parsed.access_time = Some(Self::read_time(buf, &mut cursor, end)?);
        }
        if flags & CREATE_TIME_BIT != 0 {
            parsed.create_time = Some(Self::read_time(buf, &mut cursor, end)?);
        }
        if cursor != end {
            return Err(OxiZipError::malformed(
                Self::HEADER_ID,
                format!("{} unexpected trailing bytes", end - cursor),
            ));
        }

        *self = parsed;
        Ok(())
    }

    fn parse_central(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        span(buf, offset, length)?;
        if length == 0 {
            return Err(OxiZipError::malformed(Self::HEADER_ID, "empty payload"));
        }
        let end = offset + length;
        let flags = buf[offset];
        let mut cursor = offset + 1;

        // Access and create times never appear centrally; a record read from
        // the local header keeps its own values and its own flags.
        let modify_time = if flags & MODIFY_TIME_BIT != 0 {
            Some(Self::read_time(buf, &mut cursor, end)?)
        } else {
            None
        };
        if cursor != end {
            return Err(OxiZipError::malformed(
                Self::HEADER_ID,
                format!("{} unexpected trailing bytes", end - cursor),
            ));
        }
        self.central_flags = flags;
        if modify_time.is_some() {
            self.modify_time = modify_time;
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ExtraFieldRecord> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_and_central_diverge() {
        let field = ExtendedTimestamp::new()
            .with_modify_time(0x01020304)
            .with_access_time(-1);
        assert_eq!(field.flags(), 0b011);
        assert_eq!(
            field.local_data(),
            vec![0x03, 0x04, 0x03, 0x02, 0x01, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(field.central_data(), vec![0x03, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_parse_local_all_times() {
        let data = [0x07, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0];
        let mut field = ExtendedTimestamp::new();
        field.parse_local(&data, 0, data.len()).unwrap();
        assert_eq!(field.modify_time(), Some(1));
        assert_eq!(field.access_time(), Some(2));
        assert_eq!(field.create_time(), Some(3));
        assert_eq!(field.local_data(), data);
    }

    #[test]
    fn test_parse_central_only_modify() {
        let mut field = ExtendedTimestamp::new();
        field.parse_central(&[0x07, 9, 0, 0, 0], 0, 5).unwrap();
        assert_eq!(field.modify_time(), Some(9));
        assert_eq!(field.access_time(), None);
    }

    #[test]
    fn test_central_only_copy_writes_a_valid_local_copy() {
        let mut field = ExtendedTimestamp::new();
        field.parse_central(&[0x07, 1, 0, 0, 0], 0, 5).unwrap();
        assert_eq!(field.central_data(), vec![0x07, 1, 0, 0, 0]);

        let local = field.local_data();
        assert_eq!(local, vec![0x01, 1, 0, 0, 0]);
        let mut reparsed = ExtendedTimestamp::new();
        reparsed.parse_local(&local, 0, local.len()).unwrap();
        assert_eq!(reparsed.modify_time(), Some(1));
    }

    #[test]
    fn test_local_and_central_flags_are_kept_apart() {
        let local = [0x03, 1, 0, 0, 0, 2, 0, 0, 0];
        let central = [0x01, 1, 0, 0, 0];
        let mut field = ExtendedTimestamp::new();
        field.parse_local(&local, 0, local.len()).unwrap();
        field.parse_central(&central, 0, central.len()).unwrap();

        assert_eq!(field.flags(), 0x03);
        assert_eq!(field.central_flags(), 0x01);
        assert_eq!(field.local_data(), local);
        assert_eq!(field.central_data(), central);
    }

    #[test]
    fn test_reserved_flag_bits_survive() {
        let local = [0x81, 4, 0, 0, 0];
        let mut field = ExtendedTimestamp::new();
        field.parse_local(&local, 0, local.len()).unwrap();
        assert_eq!(field.local_data(), local);
        assert_eq!(field.central_data(), local);
    }

    #[test]
    fn test_malformed_payloads() {
        let mut field = ExtendedTimestamp::new();
        assert!(field.parse_local(&[], 0, 0).is_err());
        // Modify flagged but only two bytes follow.
        assert!(field.parse_local(&[0x01, 1, 2], 0, 3).is_err());
        // Trailing garbage.
        assert!(field.parse_local(&[0x00, 1], 0, 2).is_err());
    }

    #[test]
    fn test_clearing_time_clears_flag() {
        let mut field = ExtendedTimestamp::new().with_modify_time(5);
        field.set_modify_time(None);
        assert_eq!(field.flags(), 0);
        assert_eq!(field.local_data(), vec![0]);
    }
}
