//! Parallel ZIP writing.
//!
//! [`ScatterZipCreator`] compresses entries on a rayon pool and writes them
//! to a [`RandomAccessSink`] in submission order. Each worker streams its
//! compressed chunks over its own bounded channel. The writer emits the
//! entry's local header with zero CRC and sizes, appends the chunks as they
//! arrive, then patches the header once the worker reports the final CRC-32
//! and sizes. No data descriptors are written.
//!
//! At most one entry per pool thread is started ahead of the entry being
//! written, and a worker blocks once its channel holds
//! [`CHANNEL_DEPTH`] messages. Memory held by queued output is bounded by
//! threads × depth × chunk size, regardless of entry sizes.
//!
//! ```
//! use oxizip_archive::entry::ZipArchiveEntry;
//! use oxizip_archive::handoff::EntryHandoff;
//! use oxizip_archive::scatter::{ScatterOptions, ScatterZipCreator};
//! use oxizip_core::sink::MemorySink;
//!
//! let mut creator = ScatterZipCreator::new(ScatterOptions::default()).unwrap();
//! creator.add(EntryHandoff::from_bytes(ZipArchiveEntry::new("a.txt"), b"alpha".to_vec()));
//! creator.add(EntryHandoff::from_bytes(ZipArchiveEntry::new("b.txt"), b"beta".to_vec()));
//!
//! let mut sink = MemorySink::new();
//! let stats = creator.write_to(&mut sink).unwrap();
//! assert_eq!(stats.entries, 2);
//! assert_eq!(&sink.as_bytes()[..4], b"PK\x03\x04");
//! ```

use crate::entry::{CompressionMethod, ZipArchiveEntry};
use crate::extra::{
    ExtraField, ExtraFieldRecord, Zip64ExtendedInformationExtraField, merge_central_data,
};
use crate::handoff::{EntryHandoff, EntrySupplier};
use crate::names::{EncodedText, NameEncodingOptions, encode_entry_text};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use oxizip_core::bytes::{ZipEightByteInteger, ZipLong, ZipShort};
use oxizip_core::error::{OxiZipError, Result};
use oxizip_core::sink::RandomAccessSink;
use oxizip_core::traits::{CompressStatus, Compressor, FlushMode, StoredCompressor};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, trace};

/// ZIP local file header signature.
pub const LOCAL_FILE_HEADER_SIG: u32 = 0x04034B50;

/// ZIP central directory header signature.
pub const CENTRAL_DIR_HEADER_SIG: u32 = 0x02014B50;

/// ZIP end of central directory signature.
pub const END_OF_CENTRAL_DIR_SIG: u32 = 0x06054B50;

/// ZIP64 end of central directory signature.
pub const ZIP64_END_OF_CENTRAL_DIR_SIG: u32 = 0x06064B50;

/// ZIP64 end of central directory locator signature.
pub const ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIG: u32 = 0x07064B50;

/// Marker value for Zip64 (0xFFFFFFFF for 32-bit fields).
pub const ZIP64_MARKER_32: u32 = 0xFFFF_FFFF;

/// Marker value for Zip64 (0xFFFF for 16-bit fields).
pub const ZIP64_MARKER_16: u16 = 0xFFFF;

/// Fixed part of a local file header.
const LOCAL_HEADER_LEN: u64 = 30;

/// Offset of the CRC-32 field within a local file header.
const LOCAL_CRC_OFFSET: u64 = 14;

/// Fixed part of a central directory header.
const CENTRAL_HEADER_LEN: usize = 46;

/// Version made by: Unix host, APPNOTE 3.0.
const VERSION_MADE_BY: u16 = 0x031E;

/// Version needed for Zip64 structures.
const ZIP64_VERSION_NEEDED: u16 = 45;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Messages a worker may queue before it waits for the writer.
pub const CHANNEL_DEPTH: usize = 4;

/// When Zip64 structures are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zip64Mode {
    /// Only for entries whose size hint reaches the 32-bit limit, and for
    /// central values that overflow.
    #[default]
    AsNeeded,
    /// Every local header reserves a Zip64 sizes record, and the archive
    /// always ends with the Zip64 end records.
    Always,
}

/// Builds one compressor per entry.
#[derive(Clone)]
pub struct CompressorFactory {
    method: CompressionMethod,
    make: Arc<dyn Fn() -> Box<dyn Compressor + Send> + Send + Sync>,
}

impl CompressorFactory {
    /// A factory for `method` that calls `make` once per entry.
    pub fn new<F>(method: CompressionMethod, make: F) -> Self
    where
        F: Fn() -> Box<dyn Compressor + Send> + Send + Sync + 'static,
    {
        Self {
            method,
            make: Arc::new(make),
        }
    }

    /// Method 0, copying data through.
    pub fn stored() -> Self {
        Self::new(CompressionMethod::Stored, || Box::new(StoredCompressor::new()))
    }

    /// Method written to the headers.
    pub fn method(&self) -> CompressionMethod {
        self.method
    }

    fn create(&self) -> Box<dyn Compressor + Send> {
        (self.make)()
    }
}

impl Default for CompressorFactory {
    fn default() -> Self {
        Self::stored()
    }
}

impl fmt::Debug for CompressorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressorFactory")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Options for [`ScatterZipCreator`].
#[derive(Debug, Clone)]
pub struct ScatterOptions {
    /// Worker threads; `None` uses one per available core.
    pub threads: Option<usize>,
    /// Read and compress granularity in bytes.
    pub chunk_size: usize,
    /// Name and comment encoding.
    pub names: NameEncodingOptions,
    /// Zip64 policy.
    pub zip64: Zip64Mode,
    /// Compressor used for every file entry.
    pub compressor: CompressorFactory,
}

impl Default for ScatterOptions {
    fn default() -> Self {
        Self {
            threads: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            names: NameEncodingOptions::default(),
            zip64: Zip64Mode::default(),
            compressor: CompressorFactory::default(),
        }
    }
}

impl ScatterOptions {
    /// Builder method to set the worker count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Builder method to set the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Builder method to set the name encoding.
    pub fn with_names(mut self, names: NameEncodingOptions) -> Self {
        self.names = names;
        self
    }

    /// Builder method to set the Zip64 policy.
    pub fn with_zip64(mut self, mode: Zip64Mode) -> Self {
        self.zip64 = mode;
        self
    }

    /// Builder method to set the compressor.
    pub fn with_compressor(mut self, compressor: CompressorFactory) -> Self {
        self.compressor = compressor;
        self
    }
}

/// Totals reported by [`ScatterZipCreator::write_to`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScatterStats {
    /// Entries written.
    pub entries: usize,
    /// Sum of uncompressed sizes.
    pub bytes_in: u64,
    /// Sum of compressed sizes.
    pub bytes_out: u64,
    /// Position of the central directory.
    pub central_directory_offset: u64,
    /// Length of everything written.
    pub archive_size: u64,
}

type DeferredSupplier = Box<dyn FnOnce() -> Result<EntryHandoff> + Send>;

enum Pending {
    Ready(EntryHandoff),
    Deferred(DeferredSupplier),
    Producer(Receiver<EntryHandoff>),
}

enum WorkerMessage {
    Header(Box<PreparedEntry>),
    Chunk(Vec<u8>),
    Finished(Digest),
    Failed(OxiZipError),
}

struct PreparedEntry {
    entry: ZipArchiveEntry,
    text: EncodedText,
}

#[derive(Debug, Clone, Copy)]
struct Digest {
    crc32: u32,
    size: u64,
    compressed_size: u64,
}

/// Writes entries compressed in parallel into one archive.
pub struct ScatterZipCreator {
    options: ScatterOptions,
    pool: ThreadPool,
    pending: Vec<Pending>,
}

impl fmt::Debug for ScatterZipCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScatterZipCreator")
            .field("options", &self.options)
            .field("threads", &self.pool.current_num_threads())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ScatterZipCreator {
    /// Create a creator and its worker pool.
    pub fn new(options: ScatterOptions) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("oxizip-scatter-{i}"));
        if let Some(threads) = options.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| OxiZipError::pipeline(format!("failed to start worker pool: {e}")))?;
        Ok(Self {
            options,
            pool,
            pending: Vec::new(),
        })
    }

    /// Queue a prepared entry.
    pub fn add(&mut self, handoff: EntryHandoff) {
        self.pending.push(Pending::Ready(handoff));
    }

    /// Queue an entry that `supplier` builds on a worker thread.
    pub fn submit(&mut self, supplier: impl EntrySupplier) {
        self.pending
            .push(Pending::Deferred(Box::new(move || supplier.supply())));
    }

    /// Queue every entry a producer sends until it drops its sender.
    ///
    /// The entries take this call's place in the submission order.
    pub fn add_from(&mut self, receiver: Receiver<EntryHandoff>) {
        self.pending.push(Pending::Producer(receiver));
    }

    /// Queued sources; a producer channel counts once.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Compress every queued entry and write the archive to `sink`.
    ///
    /// Positions are taken from the sink, so an archive may follow a prefix
    /// already written to it. The first worker or sink error aborts the
    /// write and is returned.
    pub fn write_to<S: RandomAccessSink + ?Sized>(self, sink: &mut S) -> Result<ScatterStats> {
        let Self {
            options,
            pool,
            pending,
        } = self;
        debug!(
            sources = pending.len(),
            threads = pool.current_num_threads(),
            "scatter write started"
        );

        let stats = std::thread::scope(|scope| {
            let (order_tx, order_rx) = unbounded();
            let (started_tx, started_rx) = unbounded();
            let pool = &pool;
            let options = &options;
            scope.spawn(move || dispatch(pool, options, pending, order_tx, started_rx));
            write_archive(sink, options.zip64, order_rx, &started_tx)
        })?;

        sink.flush()?;
        debug!(
            entries = stats.entries,
            bytes_in = stats.bytes_in,
            bytes_out = stats.bytes_out,
            archive_size = stats.archive_size,
            "scatter write finished"
        );
        Ok(stats)
    }
}

/// Start one worker per entry, in order, handing each worker's channel to
/// the writer.
///
/// No more workers than pool threads are started ahead of the writer: each
/// signal on `started` (one per local header written) admits one more. The
/// entry the writer waits on therefore always has a thread of its own.
fn dispatch(
    pool: &ThreadPool,
    options: &ScatterOptions,
    pending: Vec<Pending>,
    order: Sender<Receiver<WorkerMessage>>,
    started: Receiver<()>,
) {
    let window = pool.current_num_threads().max(1);
    let mut ahead = 0usize;
    let mut spawn = |supplier: DeferredSupplier| -> bool {
        if ahead == window {
            if started.recv().is_err() {
                return false;
            }
            ahead -= 1;
        }
        let (tx, rx) = bounded(CHANNEL_DEPTH);
        if order.send(rx).is_err() {
            return false;
        }
        ahead += 1;
        let names = options.names;
        let compressor = options.compressor.clone();
        let chunk_size = options.chunk_size.max(1);
        pool.spawn(move || {
            if let Err(err) = run_worker(supplier, &names, &compressor, chunk_size, &tx) {
                // The writer may already be gone; nothing else to report to.
                let _ = tx.send(WorkerMessage::Failed(err));
            }
        });
        true
    };

    for source in pending {
        let alive = match source {
            Pending::Ready(handoff) => spawn(ready(handoff)),
            Pending::Deferred(supplier) => spawn(supplier),
            Pending::Producer(receiver) => receiver.iter().all(|handoff| spawn(ready(handoff))),
        };
        if !alive {
            trace!("writer stopped; dropping remaining entries");
            return;
        }
    }
}

fn ready(handoff: EntryHandoff) -> DeferredSupplier {
    Box::new(move || -> Result<EntryHandoff> { Ok(handoff) })
}

fn run_worker(
    supplier: DeferredSupplier,
    names: &NameEncodingOptions,
    factory: &CompressorFactory,
    chunk_size: usize,
    tx: &Sender<WorkerMessage>,
) -> Result<()> {
    let (mut entry, source) = supplier()?.into_parts();
    entry.flags.use_data_descriptor(false);
    if entry.is_dir() {
        entry.method = CompressionMethod::Stored;
    } else {
        entry.method = factory.method();
    }
    let text = encode_entry_text(&mut entry, names)?;
    let is_dir = entry.is_dir();
    trace!(name = %entry.name, "worker picked up entry");
    send(tx, WorkerMessage::Header(Box::new(PreparedEntry { entry, text })))?;

    if is_dir {
        return send(
            tx,
            WorkerMessage::Finished(Digest {
                crc32: 0,
                size: 0,
                compressed_size: 0,
            }),
        );
    }

    let mut reader = source.open()?;
    let mut compressor = factory.create();
    let mut hasher = crc32fast::Hasher::new();
    let mut input = vec![0u8; chunk_size];
    let mut output = vec![0u8; chunk_size];
    let mut size = 0u64;
    let mut compressed_size = 0u64;

    loop {
        let read = read_chunk(&mut reader, &mut input)?;
        let flush = if read == 0 {
            FlushMode::Finish
        } else {
            FlushMode::None
        };
        hasher.update(&input[..read]);
        size += read as u64;
        compressed_size +=
            drive_compressor(compressor.as_mut(), &input[..read], flush, &mut output, tx)?;
        if read == 0 {
            break;
        }
    }

    send(
        tx,
        WorkerMessage::Finished(Digest {
            crc32: hasher.finalize(),
            size,
            compressed_size,
        }),
    )
}

fn send(tx: &Sender<WorkerMessage>, message: WorkerMessage) -> Result<()> {
    tx.send(message)
        .map_err(|_| OxiZipError::pipeline("archive writer hung up"))
}

/// Fill `buf` as far as the reader allows; 0 means end of input.
fn read_chunk(reader: &mut dyn Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Feed `input` through the compressor, forwarding output as chunks.
/// Returns the number of compressed bytes produced.
fn drive_compressor(
    compressor: &mut dyn Compressor,
    input: &[u8],
    flush: FlushMode,
    output: &mut [u8],
    tx: &Sender<WorkerMessage>,
) -> Result<u64> {
    let mut pos = 0;
    let mut produced_total = 0u64;
    loop {
        let (consumed, produced, status) = compressor.compress(&input[pos..], output, flush)?;
        pos += consumed;
        if produced > 0 {
            produced_total += produced as u64;
            send(tx, WorkerMessage::Chunk(output[..produced].to_vec()))?;
        }
        match status {
            CompressStatus::Done => return Ok(produced_total),
            CompressStatus::NeedsInput if flush != FlushMode::Finish && pos >= input.len() => {
                return Ok(produced_total);
            }
            _ if consumed == 0 && produced == 0 => {
                return Err(OxiZipError::pipeline("compressor made no progress"));
            }
            _ => {}
        }
    }
}

/// Header fields the writer keeps for the central directory.
struct CentralRecord {
    version_needed: u16,
    flags: u16,
    method: u16,
    mtime: u16,
    mdate: u16,
    digest: Digest,
    name: Vec<u8>,
    comment: Vec<u8>,
    extra: Vec<u8>,
    external_attr: u32,
    local_header_offset: u64,
}

impl CentralRecord {
    fn needs_zip64(&self) -> bool {
        self.digest.compressed_size >= u64::from(ZIP64_MARKER_32)
            || self.digest.size >= u64::from(ZIP64_MARKER_32)
            || self.local_header_offset >= u64::from(ZIP64_MARKER_32)
    }

    fn build_zip64_extra(&self) -> Result<Vec<u8>> {
        if !self.needs_zip64() {
            return Ok(Vec::new());
        }
        let saturated = |value: u64| (value >= u64::from(ZIP64_MARKER_32)).then_some(value);
        let mut field = Zip64ExtendedInformationExtraField::new();
        field.set_size(saturated(self.digest.size));
        field.set_compressed_size(saturated(self.digest.compressed_size));
        field.set_relative_header_offset(saturated(self.local_header_offset));
        merge_central_data(&[ExtraField::Zip64(field)])
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let zip64_extra = self.build_zip64_extra()?;
        let extra_len = header_len(zip64_extra.len() + self.extra.len(), "central extra field")?;
        let name_len = header_len(self.name.len(), "entry name")?;
        let comment_len = header_len(self.comment.len(), "entry comment")?;
        let version_needed = if self.needs_zip64() {
            ZIP64_VERSION_NEEDED
        } else {
            self.version_needed
        };

        out.reserve(
            CENTRAL_HEADER_LEN + self.name.len() + usize::from(extra_len) + self.comment.len(),
        );
        out.extend_from_slice(&ZipLong::new(CENTRAL_DIR_HEADER_SIG).to_bytes());
        out.extend_from_slice(&ZipShort::new(VERSION_MADE_BY).to_bytes());
        out.extend_from_slice(&ZipShort::new(version_needed).to_bytes());
        out.extend_from_slice(&ZipShort::new(self.flags).to_bytes());
        out.extend_from_slice(&ZipShort::new(self.method).to_bytes());
        out.extend_from_slice(&ZipShort::new(self.mtime).to_bytes());
        out.extend_from_slice(&ZipShort::new(self.mdate).to_bytes());
        out.extend_from_slice(&ZipLong::new(self.digest.crc32).to_bytes());
        out.extend_from_slice(&saturate_32(self.digest.compressed_size).to_bytes());
        out.extend_from_slice(&saturate_32(self.digest.size).to_bytes());
        out.extend_from_slice(&ZipShort::new(name_len).to_bytes());
        out.extend_from_slice(&ZipShort::new(extra_len).to_bytes());
        out.extend_from_slice(&ZipShort::new(comment_len).to_bytes());
        // Disk number start, internal attributes
        out.extend_from_slice(&ZipShort::ZERO.to_bytes());
        out.extend_from_slice(&ZipShort::ZERO.to_bytes());
        out.extend_from_slice(&ZipLong::new(self.external_attr).to_bytes());
        out.extend_from_slice(&saturate_32(self.local_header_offset).to_bytes());
        out.extend_from_slice(&self.name);
        out.extend_from_slice(&zip64_extra);
        out.extend_from_slice(&self.extra);
        out.extend_from_slice(&self.comment);
        Ok(())
    }
}

fn saturate_32(value: u64) -> ZipLong {
    match u32::try_from(value) {
        Ok(v) if v != ZIP64_MARKER_32 => ZipLong::new(v),
        _ => ZipLong::ZIP64_MAGIC,
    }
}

fn header_len(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len)
        .map_err(|_| OxiZipError::invalid_header(format!("{what} of {len} bytes exceeds 65535")))
}

/// Offset of the Zip64 record's payload within a local extra field.
fn zip64_payload_offset(fields: &[ExtraField]) -> Option<usize> {
    let mut offset = 0;
    for field in fields {
        if field.is_unparseable() {
            offset += field.local_data().len();
            continue;
        }
        if field.header_id() == Zip64ExtendedInformationExtraField::HEADER_ID {
            return Some(offset + 4);
        }
        offset += 4 + field.local_data().len();
    }
    None
}

fn write_archive<S: RandomAccessSink + ?Sized>(
    sink: &mut S,
    mode: Zip64Mode,
    order: Receiver<Receiver<WorkerMessage>>,
    started: &Sender<()>,
) -> Result<ScatterStats> {
    let mut records = Vec::new();
    let mut stats = ScatterStats::default();

    for worker in order.iter() {
        let record = write_entry(sink, mode, &worker, started)?;
        stats.bytes_in += record.digest.size;
        stats.bytes_out += record.digest.compressed_size;
        records.push(record);
    }
    stats.entries = records.len();

    let central_dir_offset = sink.position();
    let mut central = Vec::new();
    for record in &records {
        record.write(&mut central)?;
    }
    let central_dir_size = central.len() as u64;
    sink.append(&central)?;

    let num_entries = records.len() as u64;
    let needs_zip64 = mode == Zip64Mode::Always
        || num_entries >= u64::from(ZIP64_MARKER_16)
        || central_dir_size >= u64::from(ZIP64_MARKER_32)
        || central_dir_offset >= u64::from(ZIP64_MARKER_32)
        || records.iter().any(CentralRecord::needs_zip64);

    let mut end = Vec::with_capacity(98);
    if needs_zip64 {
        let zip64_eocd_offset = central_dir_offset + central_dir_size;
        end.extend_from_slice(&ZipLong::new(ZIP64_END_OF_CENTRAL_DIR_SIG).to_bytes());
        // Size of the record after this field
        end.extend_from_slice(&ZipEightByteInteger::new(44).to_bytes());
        end.extend_from_slice(&ZipShort::new(VERSION_MADE_BY).to_bytes());
        end.extend_from_slice(&ZipShort::new(ZIP64_VERSION_NEEDED).to_bytes());
        // This disk, disk with the central directory
        end.extend_from_slice(&ZipLong::new(0).to_bytes());
        end.extend_from_slice(&ZipLong::new(0).to_bytes());
        end.extend_from_slice(&ZipEightByteInteger::new(num_entries).to_bytes());
        end.extend_from_slice(&ZipEightByteInteger::new(num_entries).to_bytes());
        end.extend_from_slice(&ZipEightByteInteger::new(central_dir_size).to_bytes());
        end.extend_from_slice(&ZipEightByteInteger::new(central_dir_offset).to_bytes());

        end.extend_from_slice(&ZipLong::new(ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIG).to_bytes());
        end.extend_from_slice(&ZipLong::new(0).to_bytes());
        end.extend_from_slice(&ZipEightByteInteger::new(zip64_eocd_offset).to_bytes());
        // Total number of disks
        end.extend_from_slice(&ZipLong::new(1).to_bytes());
    }

    let num_entries_16 = u16::try_from(num_entries)
        .ok()
        .filter(|&n| n != ZIP64_MARKER_16)
        .unwrap_or(ZIP64_MARKER_16);
    end.extend_from_slice(&ZipLong::new(END_OF_CENTRAL_DIR_SIG).to_bytes());
    end.extend_from_slice(&ZipShort::ZERO.to_bytes());
    end.extend_from_slice(&ZipShort::ZERO.to_bytes());
    end.extend_from_slice(&ZipShort::new(num_entries_16).to_bytes());
    end.extend_from_slice(&ZipShort::new(num_entries_16).to_bytes());
    end.extend_from_slice(&saturate_32(central_dir_size).to_bytes());
    end.extend_from_slice(&saturate_32(central_dir_offset).to_bytes());
    // Archive comment length
    end.extend_from_slice(&ZipShort::ZERO.to_bytes());
    sink.append(&end)?;

    stats.central_directory_offset = central_dir_offset;
    stats.archive_size = sink.position();
    Ok(stats)
}

fn recv(worker: &Receiver<WorkerMessage>) -> Result<WorkerMessage> {
    worker
        .recv()
        .map_err(|_| OxiZipError::pipeline("worker exited without finishing its entry"))
}

fn write_entry<S: RandomAccessSink + ?Sized>(
    sink: &mut S,
    mode: Zip64Mode,
    worker: &Receiver<WorkerMessage>,
    started: &Sender<()>,
) -> Result<CentralRecord> {
    let PreparedEntry { mut entry, text } = match recv(worker)? {
        WorkerMessage::Header(prepared) => *prepared,
        WorkerMessage::Failed(err) => return Err(err),
        WorkerMessage::Chunk(_) | WorkerMessage::Finished(_) => {
            return Err(OxiZipError::pipeline("worker sent data before the entry header"));
        }
    };

    let placeholder = !entry.is_dir()
        && (mode == Zip64Mode::Always
            || entry.size.is_some_and(|size| size >= u64::from(ZIP64_MARKER_32)));
    if placeholder {
        entry.add_extra_field(Zip64ExtendedInformationExtraField::with_sizes(0, 0));
    } else {
        entry.remove_extra_field(Zip64ExtendedInformationExtraField::HEADER_ID);
    }

    let local_extra = entry.local_extra()?;
    let zip64_offset = zip64_payload_offset(entry.extra_fields());
    let name_len = header_len(text.name.len(), "entry name")?;
    let extra_len = header_len(local_extra.len(), "local extra field")?;
    let version_needed = if placeholder {
        ZIP64_VERSION_NEEDED
    } else {
        entry.method.version_needed()
    };
    let (mtime, mdate) = entry.dos_time();
    let flags = entry.flags.to_raw();
    let method = entry.method.to_u16();
    let size_field = if placeholder {
        ZipLong::ZIP64_MAGIC
    } else {
        ZipLong::new(0)
    };

    let mut header =
        Vec::with_capacity(LOCAL_HEADER_LEN as usize + text.name.len() + local_extra.len());
    header.extend_from_slice(&ZipLong::new(LOCAL_FILE_HEADER_SIG).to_bytes());
    header.extend_from_slice(&ZipShort::new(version_needed).to_bytes());
    header.extend_from_slice(&ZipShort::new(flags).to_bytes());
    header.extend_from_slice(&ZipShort::new(method).to_bytes());
    header.extend_from_slice(&ZipShort::new(mtime).to_bytes());
    header.extend_from_slice(&ZipShort::new(mdate).to_bytes());
    // CRC-32, compressed size, uncompressed size: patched below
    header.extend_from_slice(&ZipLong::new(0).to_bytes());
    header.extend_from_slice(&size_field.to_bytes());
    header.extend_from_slice(&size_field.to_bytes());
    header.extend_from_slice(&ZipShort::new(name_len).to_bytes());
    header.extend_from_slice(&ZipShort::new(extra_len).to_bytes());
    header.extend_from_slice(&text.name);
    header.extend_from_slice(&local_extra);
    let local_header_offset = sink.append(&header)?;
    trace!(name = %entry.name, offset = local_header_offset, "local header written");
    // The dispatcher is gone once every entry has been started.
    let _ = started.send(());

    let digest = loop {
        match recv(worker)? {
            WorkerMessage::Chunk(data) => {
                sink.append(&data)?;
            }
            WorkerMessage::Finished(digest) => break digest,
            WorkerMessage::Failed(err) => return Err(err),
            WorkerMessage::Header(_) => {
                return Err(OxiZipError::pipeline("worker sent a second entry header"));
            }
        }
    };

    let crc_at = local_header_offset + LOCAL_CRC_OFFSET;
    match zip64_offset.filter(|_| placeholder) {
        Some(offset) => {
            sink.write_all_at(&ZipLong::new(digest.crc32).to_bytes(), crc_at)?;
            let mut sizes = [0u8; 16];
            ZipEightByteInteger::new(digest.size).put(&mut sizes, 0)?;
            ZipEightByteInteger::new(digest.compressed_size).put(&mut sizes, 8)?;
            let at = local_header_offset + LOCAL_HEADER_LEN + u64::from(name_len) + offset as u64;
            sink.write_all_at(&sizes, at)?;
        }
        None => {
            if digest.size >= u64::from(ZIP64_MARKER_32)
                || digest.compressed_size >= u64::from(ZIP64_MARKER_32)
            {
                return Err(OxiZipError::invalid_header(format!(
                    "entry {} is {} bytes but its local header has no Zip64 sizes; \
                     set a size hint or use Zip64Mode::Always",
                    entry.name, digest.size
                )));
            }
            let mut fields = [0u8; 12];
            ZipLong::new(digest.crc32).put(&mut fields, 0)?;
            ZipLong::new(digest.compressed_size as u32).put(&mut fields, 4)?;
            ZipLong::new(digest.size as u32).put(&mut fields, 8)?;
            sink.write_all_at(&fields, crc_at)?;
        }
    }
    trace!(
        name = %entry.name,
        crc32 = digest.crc32,
        size = digest.size,
        compressed_size = digest.compressed_size,
        "entry patched"
    );

    entry.crc32 = Some(digest.crc32);
    entry.size = Some(digest.size);
    entry.compressed_size = Some(digest.compressed_size);
    entry.remove_extra_field(Zip64ExtendedInformationExtraField::HEADER_ID);

    Ok(CentralRecord {
        version_needed,
        flags,
        method,
        mtime,
        mdate,
        digest,
        name: text.name,
        comment: text.comment,
        extra: entry.central_extra()?,
        external_attr: entry.external_attributes(),
        local_header_offset,
    })
}
