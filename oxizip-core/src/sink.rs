//! Random-access output for archives written out of order.
//!
//! A ZIP writer that compresses entries concurrently does not know an entry's
//! CRC-32 and sizes when it emits the entry's local header. It reserves a
//! zero-filled placeholder instead, keeps appending, and patches the
//! placeholder once the values are known. [`RandomAccessSink`] is the seam
//! that makes that possible without buffering whole entries in memory.
//!
//! The cursor only grows. A patch may only touch bytes that were already
//! appended and never changes the cursor or the stream length.

use crate::error::{OxiZipError, Result};
use std::io::{Seek, SeekFrom, Write};

/// An append-mostly output target that can overwrite already-written spans.
///
/// Implementations are not internally synchronized: a single writer owns
/// every `append` call and applies patches computed elsewhere.
pub trait RandomAccessSink {
    /// Append `data` at the cursor and return the position it started at.
    fn append(&mut self, data: &[u8]) -> Result<u64>;

    /// Overwrite `data.len()` bytes at `position` without moving the cursor.
    ///
    /// Fails with [`OxiZipError::OutOfBounds`] when the span reaches past the
    /// highest position appended so far.
    fn write_all_at(&mut self, data: &[u8], position: u64) -> Result<()>;

    /// Current cursor, also the number of bytes appended.
    fn position(&self) -> u64;

    /// Flush buffered output to the underlying target.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: RandomAccessSink + ?Sized> RandomAccessSink for &mut S {
    fn append(&mut self, data: &[u8]) -> Result<u64> {
        (**self).append(data)
    }

    fn write_all_at(&mut self, data: &[u8], position: u64) -> Result<()> {
        (**self).write_all_at(data, position)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Check that a patch of `length` bytes at `position` stays below `limit`.
fn check_patch(position: u64, length: usize, limit: u64) -> Result<()> {
    match position.checked_add(length as u64) {
        Some(end) if end <= limit => Ok(()),
        _ => Err(OxiZipError::out_of_bounds(position, length, limit)),
    }
}

/// An in-memory sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    buf: Vec<u8>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty sink with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the sink and return its bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl RandomAccessSink for MemorySink {
    fn append(&mut self, data: &[u8]) -> Result<u64> {
        let start = self.buf.len() as u64;
        self.buf.extend_from_slice(data);
        Ok(start)
    }

    fn write_all_at(&mut self, data: &[u8], position: u64) -> Result<()> {
        check_patch(position, data.len(), self.position())?;
        let start = position as usize;
        self.buf[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn position(&self) -> u64 {
        self.buf.len() as u64
    }
}

/// A sink over any seekable writer, typically a [`std::fs::File`].
///
/// Positions are relative to the stream position the writer had when the
/// sink was created, so a sink can start in the middle of a larger file.
#[derive(Debug)]
pub struct SeekableSink<W: Write + Seek> {
    inner: W,
    origin: u64,
    position: u64,
}

impl<W: Write + Seek> SeekableSink<W> {
    /// Wrap a writer, anchoring position 0 at its current stream position.
    pub fn new(mut inner: W) -> Result<Self> {
        let origin = inner.stream_position()?;
        Ok(Self {
            inner,
            origin,
            position: 0,
        })
    }

    /// Absolute stream offset of sink position 0.
    pub fn origin(&self) -> u64 {
        self.origin
    }

    /// Get a reference to the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Flush and return the wrapped writer, positioned after the last append.
    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write + Seek> RandomAccessSink for SeekableSink<W> {
    fn append(&mut self, data: &[u8]) -> Result<u64> {
        let start = self.position;
        self.inner.write_all(data)?;
        self.position += data.len() as u64;
        Ok(start)
    }

    fn write_all_at(&mut self, data: &[u8], position: u64) -> Result<()> {
        check_patch(position, data.len(), self.position)?;
        self.inner.seek(SeekFrom::Start(self.origin + position))?;
        self.inner.write_all(data)?;
        self.inner.seek(SeekFrom::Start(self.origin + self.position))?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}
