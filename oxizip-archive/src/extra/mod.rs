//! Extra field records.
//!
//! An extra field stream is a run of `(header id: u16 LE, length: u16 LE,
//! payload)` triples with no padding and no terminator. Every record carries
//! two payloads: the copy written to the local file header and the copy
//! written to the central directory. Most records use the same bytes in both
//! places; some deliberately differ (the extended timestamp keeps only the
//! modification time centrally, the Unix ownership record is written empty there).
//!
//! The set of record types is open. Built-in types are variants of
//! [`ExtraField`]; unknown ids become [`ExtraField::Unrecognized`] so that
//! reading and re-writing a header reproduces it byte for byte;
//! [`ExtraField::Custom`] lets callers plug in their own
//! [`ExtraFieldRecord`] through the [`ExtraFieldRegistry`].
//!
//! ```
//! use oxizip_archive::extra::{
//!     ExtraFieldRegistry, FieldLocation, UnparseableBehavior, merge_local_data,
//! };
//!
//! let data = [
//!     0xFE, 0xCA, 0x00, 0x00, // jar marker, no payload
//!     0x99, 0x99, 0x04, 0x00, 0xDE, 0xAD, 0xBE, 0xEF, // unknown id 0x9999
//! ];
//! let fields = ExtraFieldRegistry::builtin()
//!     .parse(&data, FieldLocation::Local, UnparseableBehavior::Throw)
//!     .unwrap();
//! assert_eq!(fields.len(), 2);
//! assert_eq!(merge_local_data(&fields).unwrap(), data);
//! ```

mod alignment;
mod marker;
mod opaque;
mod registry;
mod timestamp;
mod unicode;
mod unix;
mod zip64;

pub use alignment::ResourceAlignmentExtraField;
pub use marker::JarMarker;
pub use opaque::{OpaqueExtraField, UnparseableExtraFieldData};
pub use registry::{
    ExtraFieldConstructor, ExtraFieldRegistry, FieldLocation, UnparseableBehavior, merge,
    merge_central_data, merge_local_data,
};
pub use timestamp::ExtendedTimestamp;
pub use unicode::{UnicodeCommentExtraField, UnicodeExtraData, UnicodePathExtraField};
pub use unix::UnixOwnership;
pub use zip64::Zip64ExtendedInformationExtraField;

use oxizip_core::error::Result;
use std::fmt;

/// PKWARE X.509 certificate store (0x0014).
pub const PKWARE_X509_CERTIFICATES_ID: u16 = 0x0014;
/// PKWARE X.509 certificate id for a file (0x0015).
pub const PKWARE_CERTIFICATE_ID_FOR_FILE_ID: u16 = 0x0015;
/// PKWARE X.509 certificate id for the central directory (0x0016).
pub const PKWARE_CERTIFICATE_ID_FOR_CENTRAL_DIR_ID: u16 = 0x0016;
/// PKWARE strong encryption header (0x0017).
pub const PKWARE_STRONG_ENCRYPTION_HEADER_ID: u16 = 0x0017;
/// PKWARE encryption recipient certificate list (0x0019).
pub const PKWARE_RECIPIENT_CERTIFICATE_LIST_ID: u16 = 0x0019;

/// Capability surface shared by every extra field record.
///
/// Payloads are returned as owned copies; parsing copies out of the caller's
/// buffer. A record never aliases caller memory.
pub trait ExtraFieldRecord: fmt::Debug + Send + Sync {
    /// The 2-byte header id. Fixed for a given record type.
    fn header_id(&self) -> u16;

    /// Payload as written to the local file header.
    fn local_data(&self) -> Vec<u8>;

    /// Payload as written to the central directory; the local payload unless
    /// the record keeps a separate central copy.
    fn central_data(&self) -> Vec<u8> {
        self.local_data()
    }

    /// Populate the record from `length` bytes of `buf` at `offset`, read
    /// from a local file header.
    fn parse_local(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()>;

    /// Populate the record from a central directory copy.
    fn parse_central(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        self.parse_local(buf, offset, length)
    }

    /// Clone into a box, for [`ExtraField::Custom`].
    fn clone_box(&self) -> Box<dyn ExtraFieldRecord>;
}

impl Clone for Box<dyn ExtraFieldRecord> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// One extra field record of any type.
#[derive(Debug, Clone)]
pub enum ExtraField {
    /// Zip64 extended information (0x0001).
    Zip64(Zip64ExtendedInformationExtraField),
    /// Info-ZIP extended timestamp (0x5455).
    ExtendedTimestamp(ExtendedTimestamp),
    /// Info-ZIP Unix UID/GID (0x7875).
    UnixOwnership(UnixOwnership),
    /// Info-ZIP Unicode path (0x7075).
    UnicodePath(UnicodePathExtraField),
    /// Info-ZIP Unicode comment (0x6375).
    UnicodeComment(UnicodeCommentExtraField),
    /// Data alignment request (0xA11E).
    ResourceAlignment(ResourceAlignmentExtraField),
    /// Executable JAR marker (0xCAFE), zero length.
    JarMarker(JarMarker),
    /// PKWARE certificate / strong encryption records, stored as blobs.
    Pkware(OpaqueExtraField),
    /// Any id without a registered constructor, replayed verbatim.
    Unrecognized(OpaqueExtraField),
    /// Trailing bytes that did not form a complete record.
    Unparseable(UnparseableExtraFieldData),
    /// A caller-supplied record type.
    Custom(Box<dyn ExtraFieldRecord>),
}

impl ExtraField {
    /// The record behind this variant.
    pub fn record(&self) -> &dyn ExtraFieldRecord {
        match self {
            Self::Zip64(f) => f,
            Self::ExtendedTimestamp(f) => f,
            Self::UnixOwnership(f) => f,
            Self::UnicodePath(f) => f,
            Self::UnicodeComment(f) => f,
            Self::ResourceAlignment(f) => f,
            Self::JarMarker(f) => f,
            Self::Pkware(f) | Self::Unrecognized(f) => f,
            Self::Unparseable(f) => f,
            Self::Custom(f) => f.as_ref(),
        }
    }

    /// Mutable access to the record behind this variant.
    pub fn record_mut(&mut self) -> &mut dyn ExtraFieldRecord {
        match self {
            Self::Zip64(f) => f,
            Self::ExtendedTimestamp(f) => f,
            Self::UnixOwnership(f) => f,
            Self::UnicodePath(f) => f,
            Self::UnicodeComment(f) => f,
            Self::ResourceAlignment(f) => f,
            Self::JarMarker(f) => f,
            Self::Pkware(f) | Self::Unrecognized(f) => f,
            Self::Unparseable(f) => f,
            Self::Custom(f) => f.as_mut(),
        }
    }

    /// Whether this is leftover data rather than a record.
    pub fn is_unparseable(&self) -> bool {
        matches!(self, Self::Unparseable(_))
    }
}

impl ExtraFieldRecord for ExtraField {
    fn header_id(&self) -> u16 {
        self.record().header_id()
    }

    fn local_data(&self) -> Vec<u8> {
        self.record().local_data()
    }

    fn central_data(&self) -> Vec<u8> {
        self.record().central_data()
    }

    fn parse_local(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        self.record_mut().parse_local(buf, offset, length)
    }

    fn parse_central(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        self.record_mut().parse_central(buf, offset, length)
    }

    fn clone_box(&self) -> Box<dyn ExtraFieldRecord> {
        Box::new(self.clone())
    }
}

impl From<Zip64ExtendedInformationExtraField> for ExtraField {
    fn from(field: Zip64ExtendedInformationExtraField) -> Self {
        Self::Zip64(field)
    }
}

impl From<ExtendedTimestamp> for ExtraField {
    fn from(field: ExtendedTimestamp) -> Self {
        Self::ExtendedTimestamp(field)
    }
}

impl From<UnixOwnership> for ExtraField {
    fn from(field: UnixOwnership) -> Self {
        Self::UnixOwnership(field)
    }
}

impl From<UnicodePathExtraField> for ExtraField {
    fn from(field: UnicodePathExtraField) -> Self {
        Self::UnicodePath(field)
    }
}

impl From<UnicodeCommentExtraField> for ExtraField {
    fn from(field: UnicodeCommentExtraField) -> Self {
        Self::UnicodeComment(field)
    }
}

impl From<ResourceAlignmentExtraField> for ExtraField {
    fn from(field: ResourceAlignmentExtraField) -> Self {
        Self::ResourceAlignment(field)
    }
}

impl From<JarMarker> for ExtraField {
    fn from(field: JarMarker) -> Self {
        Self::JarMarker(field)
    }
}

impl From<Box<dyn ExtraFieldRecord>> for ExtraField {
    fn from(record: Box<dyn ExtraFieldRecord>) -> Self {
        Self::Custom(record)
    }
}
