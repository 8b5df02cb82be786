//! ZIP entry metadata.
//!
//! [`ZipArchiveEntry`] describes one file or directory as it appears in the
//! local and central headers: name, comment, method, sizes, CRC-32,
//! modification time, Unix mode, general purpose flags and the ordered list
//! of extra field records.

use crate::extra::{
    ExtraField, ExtraFieldRecord, ExtraFieldRegistry, FieldLocation, UnparseableBehavior,
    merge_central_data, merge_local_data,
};
use crate::flags::GeneralPurposeBit;
use oxizip_core::error::Result;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default mode of a regular file (rw-r--r--).
const DEFAULT_FILE_MODE: u32 = 0o100644;

/// Default mode of a directory (rwxr-xr-x).
const DEFAULT_DIR_MODE: u32 = 0o40755;

/// MS-DOS directory attribute.
const DOS_DIRECTORY_ATTR: u32 = 0x10;

/// 1980-01-01 00:00:00, the earliest DOS timestamp.
const DOS_EPOCH: (u16, u16) = (0, (1 << 5) | 1);

/// ZIP compression methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMethod {
    /// Stored (no compression).
    #[default]
    Stored,
    /// Deflate compression.
    Deflate,
    /// Any other method id.
    Unknown(u16),
}

impl CompressionMethod {
    /// Create from a u16 value.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::Stored,
            8 => Self::Deflate,
            _ => Self::Unknown(value),
        }
    }

    /// The method id written to the headers.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Stored => 0,
            Self::Deflate => 8,
            Self::Unknown(id) => id,
        }
    }

    /// Minimum "version needed to extract" for this method.
    pub fn version_needed(self) -> u16 {
        match self {
            Self::Stored => 10,
            _ => 20,
        }
    }
}

/// A file or directory inside a ZIP archive.
#[derive(Debug, Clone, Default)]
pub struct ZipArchiveEntry {
    /// Name within the archive; directories end with `/`.
    pub name: String,
    /// Entry comment.
    pub comment: Option<String>,
    /// Compression method.
    pub method: CompressionMethod,
    /// Uncompressed size, when known up front.
    pub size: Option<u64>,
    /// Compressed size, once known.
    pub compressed_size: Option<u64>,
    /// CRC-32 of the uncompressed data, once known.
    pub crc32: Option<u32>,
    /// Last modification time.
    pub modified: Option<SystemTime>,
    /// Unix mode bits including the file type.
    pub unix_mode: Option<u32>,
    /// General purpose bit flag.
    pub flags: GeneralPurposeBit,
    is_dir: bool,
    extra_fields: Vec<ExtraField>,
}

impl ZipArchiveEntry {
    /// A regular file entry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A directory entry; a trailing `/` is added when missing.
    pub fn directory(name: impl Into<String>) -> Self {
        let mut name = name.into();
        if !name.ends_with('/') {
            name.push('/');
        }
        Self {
            name,
            size: Some(0),
            is_dir: true,
            ..Self::default()
        }
    }

    /// Builder method to set the compression method.
    pub fn with_method(mut self, method: CompressionMethod) -> Self {
        self.method = method;
        self
    }

    /// Builder method to set the expected uncompressed size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Builder method to set the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Builder method to set the modification time.
    pub fn with_modified(mut self, time: SystemTime) -> Self {
        self.modified = Some(time);
        self
    }

    /// Builder method to set the Unix mode.
    pub fn with_unix_mode(mut self, mode: u32) -> Self {
        self.unix_mode = Some(mode);
        self
    }

    /// Builder method to set the general purpose flags.
    pub fn with_flags(mut self, flags: GeneralPurposeBit) -> Self {
        self.flags = flags;
        self
    }

    /// Whether this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Add a record, replacing any record with the same header id.
    ///
    /// Unparseable data always stays at the end of the list.
    pub fn add_extra_field(&mut self, field: impl Into<ExtraField>) {
        let field = field.into();
        if field.is_unparseable() {
            self.extra_fields.retain(|f| !f.is_unparseable());
            self.extra_fields.push(field);
            return;
        }

        let id = field.header_id();
        if let Some(slot) = self
            .extra_fields
            .iter_mut()
            .find(|f| !f.is_unparseable() && f.header_id() == id)
        {
            *slot = field;
            return;
        }

        match self.extra_fields.last() {
            Some(last) if last.is_unparseable() => {
                let at = self.extra_fields.len() - 1;
                self.extra_fields.insert(at, field);
            }
            _ => self.extra_fields.push(field),
        }
    }

    /// The record with `header_id`, if present.
    pub fn extra_field(&self, header_id: u16) -> Option<&ExtraField> {
        self.extra_fields
            .iter()
            .find(|f| !f.is_unparseable() && f.header_id() == header_id)
    }

    /// Mutable access to the record with `header_id`.
    pub fn extra_field_mut(&mut self, header_id: u16) -> Option<&mut ExtraField> {
        self.extra_fields
            .iter_mut()
            .find(|f| !f.is_unparseable() && f.header_id() == header_id)
    }

    /// Remove and return the record with `header_id`.
    pub fn remove_extra_field(&mut self, header_id: u16) -> Option<ExtraField> {
        let at = self
            .extra_fields
            .iter()
            .position(|f| !f.is_unparseable() && f.header_id() == header_id)?;
        Some(self.extra_fields.remove(at))
    }

    /// All records in header order.
    pub fn extra_fields(&self) -> &[ExtraField] {
        &self.extra_fields
    }

    /// Replace the records with those parsed from a local header.
    ///
    /// Trailing bytes that do not form a record are kept.
    pub fn set_local_extra(&mut self, data: &[u8], registry: &ExtraFieldRegistry) -> Result<()> {
        self.extra_fields = registry.parse(data, FieldLocation::Local, UnparseableBehavior::Read)?;
        Ok(())
    }

    /// Merge a central directory extra field into the existing records.
    ///
    /// A central record whose id is already present is parsed into that
    /// record as its central copy; other records are appended.
    pub fn merge_central_extra(
        &mut self,
        data: &[u8],
        registry: &ExtraFieldRegistry,
    ) -> Result<()> {
        let parsed = registry.parse(data, FieldLocation::Central, UnparseableBehavior::Read)?;
        for field in parsed {
            let existing = if field.is_unparseable() {
                self.extra_fields.iter_mut().find(|f| f.is_unparseable())
            } else {
                self.extra_field_mut(field.header_id())
            };
            match existing {
                Some(existing) => {
                    let central = field.central_data();
                    existing.parse_central(&central, 0, central.len())?;
                }
                None => self.add_extra_field(field),
            }
        }
        Ok(())
    }

    /// The records serialized for the local header.
    pub fn local_extra(&self) -> Result<Vec<u8>> {
        merge_local_data(&self.extra_fields)
    }

    /// The records serialized for the central directory.
    pub fn central_extra(&self) -> Result<Vec<u8>> {
        merge_central_data(&self.extra_fields)
    }

    /// External file attributes: Unix mode in the high word, the DOS
    /// directory bit in the low byte.
    pub fn external_attributes(&self) -> u32 {
        let default_mode = if self.is_dir {
            DEFAULT_DIR_MODE
        } else {
            DEFAULT_FILE_MODE
        };
        let mode = self.unix_mode.unwrap_or(default_mode);
        let dos = if self.is_dir { DOS_DIRECTORY_ATTR } else { 0 };
        (mode << 16) | dos
    }

    /// Modification time as DOS `(time, date)`, in UTC.
    ///
    /// Times before 1980 clamp to the DOS epoch, times after 2107 to the last
    /// representable second pair.
    pub fn dos_time(&self) -> (u16, u16) {
        match self.modified {
            Some(time) => to_dos_time(time),
            None => DOS_EPOCH,
        }
    }
}

fn to_dos_time(time: SystemTime) -> (u16, u16) {
    let Ok(since_epoch) = time.duration_since(UNIX_EPOCH) else {
        return DOS_EPOCH;
    };
    let secs = since_epoch.as_secs();
    let days = (secs / 86_400) as i64;
    let time_of_day = secs % 86_400;
    let (year, month, day) = civil_from_days(days);

    if year < 1980 {
        return DOS_EPOCH;
    }
    if year > 2107 {
        return (
            (23 << 11) | (59 << 5) | 29,
            (127 << 9) | (12 << 5) | 31,
        );
    }

    let hours = (time_of_day / 3600) as u16;
    let minutes = ((time_of_day % 3600) / 60) as u16;
    let seconds = ((time_of_day % 60) / 2) as u16;
    let dos_time = (hours << 11) | (minutes << 5) | seconds;
    let dos_date = (((year - 1980) as u16) << 9) | ((month as u16) << 5) | day as u16;
    (dos_time, dos_date)
}

/// Proleptic Gregorian date for a day count relative to 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extra::{ExtendedTimestamp, JarMarker, OpaqueExtraField, UnixOwnership};
    use std::time::Duration;

    #[test]
    fn test_compression_method() {
        assert_eq!(CompressionMethod::from_u16(0), CompressionMethod::Stored);
        assert_eq!(CompressionMethod::from_u16(8), CompressionMethod::Deflate);
        assert_eq!(CompressionMethod::from_u16(93).to_u16(), 93);
        assert_eq!(CompressionMethod::Deflate.version_needed(), 20);
    }

    #[test]
    fn test_directory_gets_slash() {
        let dir = ZipArchiveEntry::directory("assets");
        assert_eq!(dir.name, "assets/");
        assert!(dir.is_dir());
        assert_eq!(dir.external_attributes(), (0o40755 << 16) | 0x10);
        assert_eq!(ZipArchiveEntry::directory("a/").name, "a/");
    }

    #[test]
    fn test_add_extra_field_replaces_same_id() {
        let mut entry = ZipArchiveEntry::new("a.txt");
        entry.add_extra_field(ExtendedTimestamp::new().with_modify_time(1));
        entry.add_extra_field(JarMarker);
        entry.add_extra_field(ExtendedTimestamp::new().with_modify_time(2));
        assert_eq!(entry.extra_fields().len(), 2);
        assert_eq!(entry.extra_fields()[0].header_id(), ExtendedTimestamp::HEADER_ID);
        assert!(matches!(
            entry.extra_field(ExtendedTimestamp::HEADER_ID),
            Some(ExtraField::ExtendedTimestamp(t)) if t.modify_time() == Some(2)
        ));
        assert!(entry.remove_extra_field(JarMarker::HEADER_ID).is_some());
        assert!(entry.extra_field(JarMarker::HEADER_ID).is_none());
    }

    #[test]
    fn test_unparseable_stays_last() {
        let mut entry = ZipArchiveEntry::new("a.txt");
        entry
            .set_local_extra(&[0xFE, 0xCA, 0x00, 0x00, 0x01, 0x02], ExtraFieldRegistry::builtin())
            .unwrap();
        entry.add_extra_field(ExtraField::Unrecognized(OpaqueExtraField::new(0x4242)));
        let fields = entry.extra_fields();
        assert_eq!(fields.len(), 3);
        assert!(fields[2].is_unparseable());
        assert_eq!(
            entry.local_extra().unwrap(),
            vec![0xFE, 0xCA, 0, 0, 0x42, 0x42, 0, 0, 0x01, 0x02]
        );
    }

    #[test]
    fn test_merge_central_keeps_local_copies() {
        let mut entry = ZipArchiveEntry::new("a.txt");
        let owner = UnixOwnership::with_ids(501, 20);
        let local = merge_local_data(&[owner.clone().into()]).unwrap();
        entry.set_local_extra(&local, ExtraFieldRegistry::builtin()).unwrap();

        // Central copy of the ownership record is empty; a new id is appended.
        let central = [0x75, 0x78, 0x00, 0x00, 0xFE, 0xCA, 0x00, 0x00];
        entry
            .merge_central_extra(&central, ExtraFieldRegistry::builtin())
            .unwrap();
        assert_eq!(entry.extra_fields().len(), 2);
        assert_eq!(entry.local_extra().unwrap()[..local.len()], local[..]);
        assert_eq!(entry.central_extra().unwrap(), central);
    }

    #[test]
    fn test_dos_time() {
        // 2020-02-29 13:45:58 UTC
        let time = UNIX_EPOCH + Duration::from_secs(1_582_983_958);
        let entry = ZipArchiveEntry::new("a").with_modified(time);
        let (t, d) = entry.dos_time();
        assert_eq!(t, (13 << 11) | (45 << 5) | 29);
        assert_eq!(d, (40 << 9) | (2 << 5) | 29);
    }

    #[test]
    fn test_dos_time_clamps() {
        assert_eq!(ZipArchiveEntry::new("a").dos_time(), DOS_EPOCH);
        let old = ZipArchiveEntry::new("a").with_modified(UNIX_EPOCH);
        assert_eq!(old.dos_time(), DOS_EPOCH);
    }
}
