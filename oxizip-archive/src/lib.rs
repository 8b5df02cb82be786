//! # OxiZip Archive
//!
//! ZIP header codec and parallel writer for OxiZip.
//!
//! - **flags**: the general purpose bit flag (data descriptor, UTF-8 names)
//! - **encoding**: charsets for names and comments, with reversible `%Uxxxx`
//!   escapes for unmappable text
//! - **extra**: extra field records, their registry and the stream drivers
//! - **entry**: the entry model shared by the headers
//! - **names**: the UTF-8 flag and Unicode record policy
//! - **handoff**: one-shot transfer of prepared entries between threads
//! - **scatter**: compressing entries in parallel into one archive
//!
//! ## Example
//!
//! ```rust
//! use oxizip_archive::extra::{ExtendedTimestamp, ExtraFieldRecord};
//! use oxizip_archive::{GeneralPurposeBit, ZipArchiveEntry};
//!
//! let mut entry = ZipArchiveEntry::new("notes.txt")
//!     .with_flags(GeneralPurposeBit::new().with_utf8_names(true));
//! entry.add_extra_field(ExtendedTimestamp::new().with_modify_time(1_700_000_000));
//!
//! assert_eq!(entry.flags.encode(), [0x00, 0x08]);
//! assert_eq!(entry.local_extra().unwrap()[..4], [0x55, 0x54, 0x05, 0x00]);
//! assert_eq!(entry.extra_fields()[0].header_id(), 0x5455);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod encoding;
pub mod entry;
pub mod extra;
pub mod flags;
pub mod handoff;
pub mod names;
pub mod scatter;

// Re-exports
pub use encoding::{EncodingPolicy, ZipEncoding};
pub use entry::{CompressionMethod, ZipArchiveEntry};
pub use extra::{ExtraField, ExtraFieldRecord, ExtraFieldRegistry};
pub use flags::GeneralPurposeBit;
pub use handoff::{EntryHandoff, EntrySupplier, PayloadSource};
pub use names::{NameEncodingOptions, UnicodeExtraFieldPolicy};
pub use scatter::{CompressorFactory, ScatterOptions, ScatterStats, ScatterZipCreator, Zip64Mode};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::encoding::{EncodingPolicy, ZipEncoding};
    pub use crate::entry::{CompressionMethod, ZipArchiveEntry};
    pub use crate::extra::{
        ExtraField, ExtraFieldRecord, ExtraFieldRegistry, FieldLocation, UnparseableBehavior,
    };
    pub use crate::flags::GeneralPurposeBit;
    pub use crate::handoff::{EntryHandoff, EntrySupplier};
    pub use crate::scatter::{ScatterOptions, ScatterZipCreator};
    pub use oxizip_core::prelude::*;
}
