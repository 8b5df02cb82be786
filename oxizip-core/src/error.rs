//! Error types for OxiZip operations.
//!
//! Every failure in the codec layer is surfaced to the immediate caller; there
//! are no retries and no silent recovery. The variants map one to one onto the
//! failure classes of the header codec: short buffers, malformed extra field
//! records, text that cannot cross the byte/text boundary, patches outside the
//! written region of a sink, and extra field streams with trailing garbage.

use std::io;
use thiserror::Error;

/// The main error type for OxiZip operations.
#[derive(Debug, Error)]
pub enum OxiZipError {
    /// I/O error from an underlying sink or payload reader.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A decode was given fewer bytes than its fixed or declared width.
    #[error("Insufficient bytes at offset {offset}: need {needed}, have {available}")]
    Bounds {
        /// Offset at which the read started.
        offset: usize,
        /// Number of bytes the read required.
        needed: usize,
        /// Number of bytes actually available from `offset`.
        available: usize,
    },

    /// An extra field record's length does not match its expected shape.
    #[error("Malformed extra field {header_id:#06x}: {message}")]
    MalformedRecord {
        /// Header id of the offending record.
        header_id: u16,
        /// Description of the shape violation.
        message: String,
    },

    /// Text could not be encoded to, or decoded from, the target charset.
    #[error("Encoding error ({encoding}) at position {position}: {message}")]
    Encoding {
        /// Name of the charset involved.
        encoding: String,
        /// Character index (encode) or byte index (decode) of the failure.
        position: usize,
        /// Description of the failure.
        message: String,
    },

    /// A sink patch targets bytes that were never appended.
    #[error("Patch of {length} bytes at position {position} exceeds written limit {limit}")]
    OutOfBounds {
        /// Requested patch position.
        position: u64,
        /// Requested patch length.
        length: usize,
        /// Highest position appended so far.
        limit: u64,
    },

    /// An extra field stream does not divide into complete records.
    #[error("Unparseable extra field data at offset {offset}: {remaining} trailing bytes")]
    UnparseableTrailingBytes {
        /// Offset of the first byte that could not be parsed.
        offset: usize,
        /// Number of bytes left from that offset to the end of the stream.
        remaining: usize,
    },

    /// A header field cannot represent the value being written.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// A parallel pipeline stage failed or disappeared.
    #[error("Pipeline error: {message}")]
    Pipeline {
        /// Description of the pipeline failure.
        message: String,
    },
}

/// Result type alias for OxiZip operations.
pub type Result<T> = std::result::Result<T, OxiZipError>;

impl OxiZipError {
    /// Create a bounds error.
    pub fn bounds(offset: usize, needed: usize, available: usize) -> Self {
        Self::Bounds {
            offset,
            needed,
            available,
        }
    }

    /// Create a malformed record error.
    pub fn malformed(header_id: u16, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            header_id,
            message: message.into(),
        }
    }

    /// Create an encoding error.
    pub fn encoding(
        encoding: impl Into<String>,
        position: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Encoding {
            encoding: encoding.into(),
            position,
            message: message.into(),
        }
    }

    /// Create an out-of-bounds patch error.
    pub fn out_of_bounds(position: u64, length: usize, limit: u64) -> Self {
        Self::OutOfBounds {
            position,
            length,
            limit,
        }
    }

    /// Create an unparseable trailing bytes error.
    pub fn unparseable(offset: usize, remaining: usize) -> Self {
        Self::UnparseableTrailingBytes { offset, remaining }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create a pipeline error.
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self::Pipeline {
            message: message.into(),
        }
    }
}

/// Borrow `length` bytes of `buf` starting at `offset`.
///
/// This is the span check shared by every fixed-width decode and every extra
/// field parse.
pub fn span(buf: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    let available = buf.len().saturating_sub(offset);
    offset
        .checked_add(length)
        .and_then(|end| buf.get(offset..end))
        .ok_or_else(|| OxiZipError::bounds(offset, length, available))
}
