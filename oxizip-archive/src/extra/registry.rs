//! Mapping from header ids to record constructors, and the stream drivers.

use super::{
    ExtendedTimestamp, ExtraField, ExtraFieldRecord, JarMarker, OpaqueExtraField,
    PKWARE_CERTIFICATE_ID_FOR_CENTRAL_DIR_ID, PKWARE_CERTIFICATE_ID_FOR_FILE_ID,
    PKWARE_RECIPIENT_CERTIFICATE_LIST_ID, PKWARE_STRONG_ENCRYPTION_HEADER_ID,
    PKWARE_X509_CERTIFICATES_ID, ResourceAlignmentExtraField, UnicodeCommentExtraField,
    UnicodePathExtraField, UnixOwnership, UnparseableExtraFieldData,
    Zip64ExtendedInformationExtraField,
};
use oxizip_core::bytes::{ZipShort, read_u16};
use oxizip_core::error::{OxiZipError, Result};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::trace;

/// Size of a record's id + length prefix.
const RECORD_HEADER_LEN: usize = 4;

/// Builds an empty record for one header id.
pub type ExtraFieldConstructor = fn() -> ExtraField;

/// Which header a stream or payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldLocation {
    /// The local file header.
    #[default]
    Local,
    /// The central directory file header.
    Central,
}

/// What to do with bytes at the end of a stream that do not form a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnparseableBehavior {
    /// Fail with [`OxiZipError::UnparseableTrailingBytes`].
    #[default]
    Throw,
    /// Keep them as an [`ExtraField::Unparseable`] record, written back verbatim.
    Read,
}

/// Header id → constructor table.
#[derive(Debug, Clone)]
pub struct ExtraFieldRegistry {
    constructors: HashMap<u16, ExtraFieldConstructor>,
}

impl Default for ExtraFieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtraFieldRegistry {
    /// A registry with no constructors; every id parses as unrecognized.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A registry with every built-in record type.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Zip64ExtendedInformationExtraField::HEADER_ID, || {
            Zip64ExtendedInformationExtraField::new().into()
        });
        registry.register(ExtendedTimestamp::HEADER_ID, || ExtendedTimestamp::new().into());
        registry.register(UnixOwnership::HEADER_ID, || UnixOwnership::new().into());
        registry.register(UnicodePathExtraField::HEADER_ID, || {
            UnicodePathExtraField::default().into()
        });
        registry.register(UnicodeCommentExtraField::HEADER_ID, || {
            UnicodeCommentExtraField::default().into()
        });
        registry.register(ResourceAlignmentExtraField::HEADER_ID, || {
            ResourceAlignmentExtraField::default().into()
        });
        registry.register(JarMarker::HEADER_ID, || JarMarker.into());
        registry.register(PKWARE_X509_CERTIFICATES_ID, || {
            ExtraField::Pkware(OpaqueExtraField::new(PKWARE_X509_CERTIFICATES_ID))
        });
        registry.register(PKWARE_CERTIFICATE_ID_FOR_FILE_ID, || {
            ExtraField::Pkware(OpaqueExtraField::new(PKWARE_CERTIFICATE_ID_FOR_FILE_ID))
        });
        registry.register(PKWARE_CERTIFICATE_ID_FOR_CENTRAL_DIR_ID, || {
            ExtraField::Pkware(OpaqueExtraField::new(
                PKWARE_CERTIFICATE_ID_FOR_CENTRAL_DIR_ID,
            ))
        });
        registry.register(PKWARE_STRONG_ENCRYPTION_HEADER_ID, || {
            ExtraField::Pkware(OpaqueExtraField::new(PKWARE_STRONG_ENCRYPTION_HEADER_ID))
        });
        registry.register(PKWARE_RECIPIENT_CERTIFICATE_LIST_ID, || {
            ExtraField::Pkware(OpaqueExtraField::new(PKWARE_RECIPIENT_CERTIFICATE_LIST_ID))
        });
        registry
    }

    /// The process-wide registry of built-in types, built on first use.
    pub fn builtin() -> &'static Self {
        static BUILTIN: OnceLock<ExtraFieldRegistry> = OnceLock::new();
        BUILTIN.get_or_init(Self::new)
    }

    /// Register a constructor, returning the one it replaces.
    pub fn register(
        &mut self,
        header_id: u16,
        constructor: ExtraFieldConstructor,
    ) -> Option<ExtraFieldConstructor> {
        self.constructors.insert(header_id, constructor)
    }

    /// Whether `header_id` has a constructor.
    pub fn is_registered(&self, header_id: u16) -> bool {
        self.constructors.contains_key(&header_id)
    }

    /// An empty record for `header_id`; unknown ids get an opaque record.
    pub fn create(&self, header_id: u16) -> ExtraField {
        match self.constructors.get(&header_id) {
            Some(constructor) => constructor(),
            None => ExtraField::Unrecognized(OpaqueExtraField::new(header_id)),
        }
    }

    /// Parse a complete extra field stream.
    ///
    /// Records are returned in stream order. A record whose declared length
    /// runs past the end of `data`, or 1-3 leftover bytes, are handled per
    /// `behavior`; either way parsing stops there.
    pub fn parse(
        &self,
        data: &[u8],
        location: FieldLocation,
        behavior: UnparseableBehavior,
    ) -> Result<Vec<ExtraField>> {
        let mut fields = Vec::new();
        let mut start = 0;

        while start < data.len() {
            let remaining = data.len() - start;
            let length = if remaining >= RECORD_HEADER_LEN {
                let length = usize::from(read_u16(data, start + 2)?);
                (RECORD_HEADER_LEN + length <= remaining).then_some(length)
            } else {
                None
            };

            let Some(length) = length else {
                match behavior {
                    UnparseableBehavior::Throw => {
                        return Err(OxiZipError::unparseable(start, remaining));
                    }
                    UnparseableBehavior::Read => {
                        let mut field = UnparseableExtraFieldData::new();
                        fill(&mut field, data, start, remaining, location)?;
                        fields.push(ExtraField::Unparseable(field));
                        break;
                    }
                }
            };

            let header_id = read_u16(data, start)?;
            let mut field = self.create(header_id);
            if let ExtraField::Unrecognized(_) = field {
                trace!(header_id, length, "preserving unrecognized extra field");
            }
            fill(&mut field, data, start + RECORD_HEADER_LEN, length, location)?;
            fields.push(field);
            start += RECORD_HEADER_LEN + length;
        }

        Ok(fields)
    }
}

fn fill(
    field: &mut dyn ExtraFieldRecord,
    data: &[u8],
    offset: usize,
    length: usize,
    location: FieldLocation,
) -> Result<()> {
    match location {
        FieldLocation::Local => field.parse_local(data, offset, length),
        FieldLocation::Central => field.parse_central(data, offset, length),
    }
}

/// Serialize `fields` for one header.
///
/// Each record is written as id, payload length, payload. Unparseable data is
/// written verbatim. A payload longer than 65535 bytes is rejected.
pub fn merge(fields: &[ExtraField], location: FieldLocation) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for field in fields {
        let payload = match location {
            FieldLocation::Local => field.local_data(),
            FieldLocation::Central => field.central_data(),
        };

        if field.is_unparseable() {
            out.extend_from_slice(&payload);
            continue;
        }

        let length = u16::try_from(payload.len()).map_err(|_| {
            OxiZipError::malformed(
                field.header_id(),
                format!("payload of {} bytes exceeds 65535", payload.len()),
            )
        })?;
        out.extend_from_slice(&ZipShort::new(field.header_id()).to_bytes());
        out.extend_from_slice(&ZipShort::new(length).to_bytes());
        out.extend_from_slice(&payload);
    }
    Ok(out)
}

/// [`merge`] for the local file header.
pub fn merge_local_data(fields: &[ExtraField]) -> Result<Vec<u8>> {
    merge(fields, FieldLocation::Local)
}

/// [`merge`] for the central directory.
pub fn merge_central_data(fields: &[ExtraField]) -> Result<Vec<u8>> {
    merge(fields, FieldLocation::Central)
}
