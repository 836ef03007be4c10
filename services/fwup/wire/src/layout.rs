//! Canonical blob layout shared by the bundler, the verifier and the
//! update session.
//!
//! ```text
//! +--------------------------+-------------------------------+
//! | metadata (6B)            | version, fw size, msg size LE |
//! +--------------------------+-------------------------------+
//! | hmac(metadata) (32B)     |                               |
//! +--------------------------+-------------------------------+
//! | chunk_i (32B)            | repeated N times              |
//! | hmac(chunk_i) (32B)      |                               |
//! +--------------------------+-------------------------------+
//! | hmac(half1) (32B)        | tree region (96B)             |
//! | hmac(half2) (32B)        |                               |
//! | hmac(h1 || h2) (32B)     |                               |
//! +--------------------------+-------------------------------+
//! ```
//!
//! Only offsets and lengths live here; nothing in this module reads a file
//! or computes a MAC.

use crate::error::FormatError;
use crate::metadata::{Metadata, METADATA_SIZE};
use std::ops::Range;

/// HMAC-SHA256 tag size
pub const HMAC_SIZE: usize = 32;
/// Authenticated chunk size
pub const CHUNK_SIZE: usize = 32;
/// Chunk followed by its HMAC; one transport frame carries one unit
pub const CHUNK_UNIT_SIZE: usize = CHUNK_SIZE + HMAC_SIZE;
/// Trailing tree region: two half HMACs and the combined HMAC
pub const TREE_SIZE: usize = 3 * HMAC_SIZE;
/// Metadata plus its HMAC
pub const HEADER_SIZE: usize = METADATA_SIZE + HMAC_SIZE;
/// AES block size used for CBC padding
pub const CBC_BLOCK_SIZE: usize = 16;
/// CBC initialization vector size
pub const IV_SIZE: usize = 16;

/// Region boundaries of a blob holding `chunks` authenticated chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobLayout {
    chunks: usize,
}

impl BlobLayout {
    /// Layout for a given number of chunks
    pub fn for_chunks(chunks: usize) -> Self {
        Self { chunks }
    }

    /// Recover the layout from a blob length alone
    pub fn from_blob_len(len: usize) -> Result<Self, FormatError> {
        if len < HEADER_SIZE + CHUNK_UNIT_SIZE + TREE_SIZE {
            return Err(FormatError::TooShort(len));
        }

        let stream_len = len - HEADER_SIZE - TREE_SIZE;
        if stream_len % CHUNK_UNIT_SIZE != 0 {
            return Err(FormatError::Misaligned(stream_len));
        }

        Ok(Self {
            chunks: stream_len / CHUNK_UNIT_SIZE,
        })
    }

    /// Number of chunks
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Total blob length
    pub fn total_len(&self) -> usize {
        HEADER_SIZE + self.chunk_stream_len() + TREE_SIZE
    }

    /// Length of the chunk/HMAC stream
    pub fn chunk_stream_len(&self) -> usize {
        self.chunks * CHUNK_UNIT_SIZE
    }

    /// Length of the chunk data with the per-chunk HMACs removed
    pub fn chunk_data_len(&self) -> usize {
        self.chunks * CHUNK_SIZE
    }

    /// Metadata region
    pub fn metadata(&self) -> Range<usize> {
        0..METADATA_SIZE
    }

    /// Metadata HMAC region
    pub fn metadata_hmac(&self) -> Range<usize> {
        METADATA_SIZE..HEADER_SIZE
    }

    /// Chunk stream region
    pub fn chunk_stream(&self) -> Range<usize> {
        HEADER_SIZE..HEADER_SIZE + self.chunk_stream_len()
    }

    /// Chunk `index` together with its HMAC
    pub fn unit(&self, index: usize) -> Range<usize> {
        let start = HEADER_SIZE + index * CHUNK_UNIT_SIZE;
        start..start + CHUNK_UNIT_SIZE
    }

    /// Chunk `index` without its HMAC
    pub fn chunk(&self, index: usize) -> Range<usize> {
        let start = HEADER_SIZE + index * CHUNK_UNIT_SIZE;
        start..start + CHUNK_SIZE
    }

    /// HMAC of chunk `index`
    pub fn chunk_hmac(&self, index: usize) -> Range<usize> {
        let start = HEADER_SIZE + index * CHUNK_UNIT_SIZE + CHUNK_SIZE;
        start..start + HMAC_SIZE
    }

    /// Whole tree region
    pub fn tree(&self) -> Range<usize> {
        let end = self.total_len();
        end - TREE_SIZE..end
    }

    /// Both half HMACs, sent to the device as one 64-byte write
    pub fn tree_halves(&self) -> Range<usize> {
        let end = self.total_len();
        end - TREE_SIZE..end - HMAC_SIZE
    }

    /// HMAC over the two half HMACs
    pub fn tree_combined(&self) -> Range<usize> {
        let end = self.total_len();
        end - HMAC_SIZE..end
    }

    /// Split point of the chunk data into the two tree halves.
    ///
    /// Halves are chunk aligned; with an odd chunk count the first half
    /// holds the extra chunk.
    pub fn half_split(&self) -> usize {
        (self.chunks + 1) / 2 * CHUNK_SIZE
    }
}

/// Borrowed view of a blob split into its named regions
#[derive(Debug, Clone, Copy)]
pub struct BlobRegions<'a> {
    blob: &'a [u8],
    layout: BlobLayout,
}

impl<'a> BlobRegions<'a> {
    /// Split a blob, checking only that its length is well formed
    pub fn split(blob: &'a [u8]) -> Result<Self, FormatError> {
        let layout = BlobLayout::from_blob_len(blob.len())?;
        Ok(Self { blob, layout })
    }

    /// Underlying layout
    pub fn layout(&self) -> BlobLayout {
        self.layout
    }

    /// Raw metadata bytes
    pub fn metadata(&self) -> &'a [u8] {
        &self.blob[self.layout.metadata()]
    }

    /// Decoded metadata
    pub fn decode_metadata(&self) -> Result<Metadata, FormatError> {
        Metadata::decode(self.metadata())
    }

    /// Check that the sizes declared in the metadata account for the
    /// blob length exactly
    pub fn check_metadata(&self, metadata: &Metadata) -> Result<(), FormatError> {
        let expected = metadata.layout().total_len();
        if expected != self.blob.len() {
            return Err(FormatError::LengthMismatch {
                expected,
                actual: self.blob.len(),
            });
        }
        Ok(())
    }

    /// Metadata HMAC
    pub fn metadata_hmac(&self) -> &'a [u8] {
        &self.blob[self.layout.metadata_hmac()]
    }

    /// Chunk/HMAC stream
    pub fn chunk_stream(&self) -> &'a [u8] {
        &self.blob[self.layout.chunk_stream()]
    }

    /// Iterate over 64-byte chunk units in order
    pub fn units(&self) -> impl ExactSizeIterator<Item = &'a [u8]> {
        self.chunk_stream().chunks_exact(CHUNK_UNIT_SIZE)
    }

    /// Chunk `index` without its HMAC
    pub fn chunk(&self, index: usize) -> &'a [u8] {
        &self.blob[self.layout.chunk(index)]
    }

    /// HMAC of chunk `index`
    pub fn chunk_hmac(&self, index: usize) -> &'a [u8] {
        &self.blob[self.layout.chunk_hmac(index)]
    }

    /// Concatenated chunk data with the per-chunk HMACs removed
    pub fn chunk_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.layout.chunk_data_len());
        for unit in self.units() {
            data.extend_from_slice(&unit[..CHUNK_SIZE]);
        }
        data
    }

    /// Whole tree region
    pub fn tree(&self) -> &'a [u8] {
        &self.blob[self.layout.tree()]
    }

    /// Both half HMACs
    pub fn tree_halves(&self) -> &'a [u8] {
        &self.blob[self.layout.tree_halves()]
    }

    /// Combined HMAC
    pub fn tree_combined(&self) -> &'a [u8] {
        &self.blob[self.layout.tree_combined()]
    }
}
