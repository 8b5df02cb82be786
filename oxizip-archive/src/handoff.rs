//! Handing prepared entries to the thread that compresses them.
//!
//! An [`EntryHandoff`] pairs entry metadata with a deferred payload. The
//! payload is not opened until a worker calls [`PayloadSource::open`], so a
//! producer can queue many entries without holding many open files. Both the
//! handoff and the source are consumed by value: each is used exactly once.

use crate::entry::ZipArchiveEntry;
use oxizip_core::error::Result;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::PathBuf;

type Opener = Box<dyn FnOnce() -> io::Result<Box<dyn Read + Send>> + Send>;

/// A payload that has not been opened yet.
pub struct PayloadSource {
    opener: Opener,
}

impl PayloadSource {
    /// A source that runs `opener` on first use.
    pub fn new<F, R>(opener: F) -> Self
    where
        F: FnOnce() -> io::Result<R> + Send + 'static,
        R: Read + Send + 'static,
    {
        Self {
            opener: Box::new(move || opener().map(|r| Box::new(r) as Box<dyn Read + Send>)),
        }
    }

    /// A source over bytes already in memory.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::new(move || Ok(Cursor::new(data)))
    }

    /// A source that opens `path` when first read.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(move || File::open(path).map(BufReader::new))
    }

    /// Open the payload.
    pub fn open(self) -> io::Result<Box<dyn Read + Send>> {
        (self.opener)()
    }
}

impl fmt::Debug for PayloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadSource").finish_non_exhaustive()
    }
}

/// One entry ready to be compressed: metadata plus its deferred payload.
#[derive(Debug)]
pub struct EntryHandoff {
    entry: ZipArchiveEntry,
    source: PayloadSource,
}

impl EntryHandoff {
    /// Pair `entry` with a payload opened by `opener`.
    pub fn new<F, R>(entry: ZipArchiveEntry, opener: F) -> Self
    where
        F: FnOnce() -> io::Result<R> + Send + 'static,
        R: Read + Send + 'static,
    {
        Self::with_source(entry, PayloadSource::new(opener))
    }

    /// Pair `entry` with an existing source.
    pub fn with_source(entry: ZipArchiveEntry, source: PayloadSource) -> Self {
        Self { entry, source }
    }

    /// Pair `entry` with in-memory bytes, recording their length as the size.
    pub fn from_bytes(mut entry: ZipArchiveEntry, data: Vec<u8>) -> Self {
        entry.size = Some(data.len() as u64);
        Self::with_source(entry, PayloadSource::from_bytes(data))
    }

    /// Pair `entry` with a file opened lazily from `path`.
    pub fn from_path(entry: ZipArchiveEntry, path: impl Into<PathBuf>) -> Self {
        Self::with_source(entry, PayloadSource::from_path(path))
    }

    /// A directory entry with no payload.
    pub fn directory(entry: ZipArchiveEntry) -> Self {
        Self::with_source(entry, PayloadSource::from_bytes(Vec::new()))
    }

    /// The entry metadata.
    pub fn entry(&self) -> &ZipArchiveEntry {
        &self.entry
    }

    /// Give up the handoff, returning the metadata and the payload source.
    pub fn into_parts(self) -> (ZipArchiveEntry, PayloadSource) {
        (self.entry, self.source)
    }
}

/// Produces an [`EntryHandoff`] on whatever thread it is run on.
///
/// Suppliers let the expensive part of preparing an entry (stat calls,
/// reading attributes) happen on a worker thread.
pub trait EntrySupplier: Send + 'static {
    /// Build the handoff.
    fn supply(self) -> Result<EntryHandoff>;
}

impl<F> EntrySupplier for F
where
    F: FnOnce() -> Result<EntryHandoff> + Send + 'static,
{
    fn supply(self) -> Result<EntryHandoff> {
        self()
    }
}
