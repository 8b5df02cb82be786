//! Records kept as uninterpreted byte blobs.

use super::ExtraFieldRecord;
use oxizip_core::error::{Result, span};

/// A record whose payload is stored and replayed without interpretation.
///
/// Used for ids without a registered constructor and for the PKWARE
/// certificate records. The central copy is optional: when it was never set,
/// [`central_data`](ExtraFieldRecord::central_data) returns the local bytes.
/// An explicitly empty central copy stays empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueExtraField {
    header_id: u16,
    local: Vec<u8>,
    central: Option<Vec<u8>>,
}

impl OpaqueExtraField {
    /// An empty record with the given id.
    pub fn new(header_id: u16) -> Self {
        Self {
            header_id,
            local: Vec::new(),
            central: None,
        }
    }

    /// Replace the local payload with a copy of `data`.
    pub fn set_local_data(&mut self, data: &[u8]) {
        self.local = data.to_vec();
    }

    /// Replace the central payload with a copy of `data`.
    pub fn set_central_data(&mut self, data: &[u8]) {
        self.central = Some(data.to_vec());
    }

    /// Whether a central copy distinct from the local one is present.
    pub fn has_central_data(&self) -> bool {
        self.central.is_some()
    }
}

impl ExtraFieldRecord for OpaqueExtraField {
    fn header_id(&self) -> u16 {
        self.header_id
    }

    fn local_data(&self) -> Vec<u8> {
        self.local.clone()
    }

    fn central_data(&self) -> Vec<u8> {
        self.central.as_ref().unwrap_or(&self.local).clone()
    }

    fn parse_local(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        self.local = span(buf, offset, length)?.to_vec();
        Ok(())
    }

    fn parse_central(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        let data = span(buf, offset, length)?.to_vec();
        if self.central.is_none() && self.local.is_empty() {
            self.local.clone_from(&data);
        }
        self.central = Some(data);
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ExtraFieldRecord> {
        Box::new(self.clone())
    }
}

/// Bytes at the end of an extra field stream that do not form a record.
///
/// Written back verbatim, without an id or length prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnparseableExtraFieldData {
    local: Vec<u8>,
    central: Option<Vec<u8>>,
}

impl UnparseableExtraFieldData {
    /// Nominal id; never written to the stream.
    pub const HEADER_ID: u16 = 0xACC1;

    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExtraFieldRecord for UnparseableExtraFieldData {
    fn header_id(&self) -> u16 {
        Self::HEADER_ID
    }

    fn local_data(&self) -> Vec<u8> {
        self.local.clone()
    }

    fn central_data(&self) -> Vec<u8> {
        self.central.as_ref().unwrap_or(&self.local).clone()
    }

    fn parse_local(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        self.local = span(buf, offset, length)?.to_vec();
        Ok(())
    }

    fn parse_central(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        self.central = Some(span(buf, offset, length)?.to_vec());
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ExtraFieldRecord> {
        Box::new(self.clone())
    }
}
