//! Program-data codec: CRC-32 verification and zlib inflate.
//!
//! # Checksum
//! The header's `compressed_crc` is the CRC-32 (IEEE) of the raw compressed
//! bytes.  It is verified before the codec ever sees the data; a mismatch
//! aborts without producing any payload.
//!
//! # Growing output buffer
//! The inflated size is not stored anywhere in the file.  Inflate is retried
//! with a doubling output buffer until the stream reports completion:
//!
//! - first attempt: `2 × compressed_size`, rounded down to 256 bytes,
//!   never below 256 bytes
//! - every further attempt: twice the previous size
//!
//! The final buffer is truncated to the byte count inflate produced.
//!
//! # Growth cap
//! [`Inflater::max_ratio`] bounds the buffer at a multiple of the compressed
//! size.  The default, 1032, is the largest expansion a DEFLATE stream can
//! encode, so no well-formed block is refused.  `None` removes the cap.

use crc32fast::Hasher;
use flate2::{Decompress, FlushDecompress, Status};
use thiserror::Error;
use tracing::{debug, trace};

use crate::error::{PsfError, Result};

/// Allocation granularity of the output buffer.
pub const INFLATE_GRANULE: usize = 256;
/// Maximum expansion ratio of DEFLATE (258-byte matches from 2-bit codes).
pub const DEFAULT_MAX_RATIO: u32 = 1032;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum InflateError {
    #[error("corrupt zlib stream: {0}")]
    Corrupt(String),
    #[error("zlib stream is truncated after {consumed} of {available} input bytes")]
    Truncated { consumed: u64, available: usize },
    #[error("out of memory allocating a {requested}-byte output buffer")]
    OutOfMemory { requested: usize },
    #[error("inflated output exceeds the {limit}-byte limit")]
    OutputLimit { limit: usize },
}

// ── Checksum ─────────────────────────────────────────────────────────────────

pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verify the stored CRC, then inflate.  An empty block is an empty payload.
pub fn decode_block(compressed: &[u8], expected_crc: u32, inflater: &Inflater) -> Result<Vec<u8>> {
    if compressed.is_empty() {
        return Ok(Vec::new());
    }
    let actual = crc32(compressed);
    if actual != expected_crc {
        return Err(PsfError::ChecksumMismatch { expected: expected_crc, actual });
    }
    Ok(inflater.inflate(compressed)?)
}

// ── Inflater ─────────────────────────────────────────────────────────────────

/// Diagnostics from one [`Inflater::inflate_with_stats`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InflateStats {
    pub attempts:       u32,
    pub final_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inflater {
    pub max_ratio: Option<u32>,
}

impl Default for Inflater {
    fn default() -> Self {
        Self { max_ratio: Some(DEFAULT_MAX_RATIO) }
    }
}

impl Inflater {
    /// No growth cap, as the reference reader behaves.
    pub fn unbounded() -> Self {
        Self { max_ratio: None }
    }

    pub fn initial_capacity(compressed_len: usize) -> usize {
        (compressed_len.saturating_mul(2) & !(INFLATE_GRANULE - 1)).max(INFLATE_GRANULE)
    }

    fn limit(&self, compressed_len: usize) -> Option<usize> {
        self.max_ratio.map(|r| {
            compressed_len
                .saturating_mul(r as usize)
                .max(INFLATE_GRANULE)
        })
    }

    pub fn inflate(&self, input: &[u8]) -> std::result::Result<Vec<u8>, InflateError> {
        self.inflate_with_stats(input).map(|(data, _)| data)
    }

    pub fn inflate_with_stats(
        &self,
        input: &[u8],
    ) -> std::result::Result<(Vec<u8>, InflateStats), InflateError> {
        let limit = self.limit(input.len());
        let mut capacity = Self::initial_capacity(input.len());
        if let Some(l) = limit {
            capacity = capacity.min(l);
        }
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            trace!(attempt = attempts, capacity, "inflate attempt");

            let mut out = Vec::new();
            out.try_reserve_exact(capacity)
                .map_err(|_| InflateError::OutOfMemory { requested: capacity })?;
            out.resize(capacity, 0);

            let mut z = Decompress::new(true);
            let status = z
                .decompress(input, &mut out, FlushDecompress::Finish)
                .map_err(|e| InflateError::Corrupt(e.to_string()))?;
            let produced = z.total_out() as usize;

            match status {
                Status::StreamEnd => {
                    out.truncate(produced);
                    out.shrink_to_fit();
                    debug!(compressed = input.len(), inflated = produced, attempts, "inflated block");
                    return Ok((out, InflateStats { attempts, final_capacity: capacity }));
                }
                // Room left in the buffer but the stream did not finish:
                // the input ran out.
                Status::Ok | Status::BufError if produced < capacity => {
                    return Err(InflateError::Truncated {
                        consumed:  z.total_in(),
                        available: input.len(),
                    });
                }
                Status::Ok | Status::BufError => {}
            }

            let next = capacity
                .checked_mul(2)
                .ok_or(InflateError::OutputLimit { limit: usize::MAX })?;
            capacity = match limit {
                Some(l) if capacity >= l => return Err(InflateError::OutputLimit { limit: l }),
                Some(l) => next.min(l),
                None => next,
            };
        }
    }
}
