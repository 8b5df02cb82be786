//! # OxiZip Core
//!
//! Core components for the OxiZip header codec.
//!
//! - [`bytes`]: 2, 4 and 8-byte little-endian header fields
//! - [`sink`]: Random-access output that can patch already-written spans
//! - [`traits`]: The streaming compressor seam
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L2: Container (oxizip-archive)                          │
//! │     Flags, extra fields, name encodings, scatter writer │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Primitives (this crate)                             │
//! │     ZipShort/ZipLong/ZipEightByteInteger, sinks, errors │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxizip_core::bytes::ZipLong;
//! use oxizip_core::sink::{MemorySink, RandomAccessSink};
//!
//! let mut sink = MemorySink::new();
//! let placeholder = sink.append(&[0u8; 4]).unwrap();
//! sink.append(b"payload").unwrap();
//! sink.write_all_at(&ZipLong::new(0xCAFEBABE).to_bytes(), placeholder).unwrap();
//! assert_eq!(&sink.as_bytes()[..4], &[0xBE, 0xBA, 0xFE, 0xCA]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bytes;
pub mod error;
pub mod sink;
pub mod traits;

// Re-exports for convenience
pub use bytes::{ZipEightByteInteger, ZipLong, ZipShort};
pub use error::{OxiZipError, Result};
pub use sink::{MemorySink, RandomAccessSink, SeekableSink};
pub use traits::{CompressStatus, Compressor, FlushMode, StoredCompressor};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bytes::{ZipEightByteInteger, ZipLong, ZipShort};
    pub use crate::error::{OxiZipError, Result};
    pub use crate::sink::{MemorySink, RandomAccessSink, SeekableSink};
    pub use crate::traits::{Compressor, FlushMode, StoredCompressor};
}
