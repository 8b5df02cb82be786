//! The streaming compressor seam.
//!
//! The header codec never chooses a compression algorithm. Writers drive any
//! codec through [`Compressor`]; the only codec shipped here is
//! [`StoredCompressor`], which copies its input through unchanged (ZIP
//! method 0).

use crate::error::Result;

/// What a [`Compressor::compress`] call needs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressStatus {
    /// The input slice was used up; call again with more.
    NeedsInput,
    /// The output slice filled before the input was used up.
    NeedsOutput,
    /// The stream has been finished and fully emitted.
    Done,
}

/// How much a compressor must emit before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// Nothing is forced out.
    #[default]
    None,
    /// The input is the last; finish the stream.
    Finish,
}

/// Streaming encoder for one entry's payload.
///
/// A call consumes some prefix of `input`, writes some prefix of `output` and
/// reports the pair of counts with a [`CompressStatus`]. A call that consumes
/// nothing and produces nothing without reporting [`CompressStatus::Done`]
/// is a stall. One compressor encodes one stream.
pub trait Compressor {
    /// Feed `input` and write into `output`.
    ///
    /// Returns `(consumed, produced, status)`.
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)>;
}

/// Method 0: emits its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredCompressor;

impl StoredCompressor {
    /// A copier at the start of a stream.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Compressor for StoredCompressor {
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)> {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);

        let status = if n < input.len() {
            CompressStatus::NeedsOutput
        } else if flush == FlushMode::Finish {
            CompressStatus::Done
        } else {
            CompressStatus::NeedsInput
        };

        Ok((n, n, status))
    }
}
