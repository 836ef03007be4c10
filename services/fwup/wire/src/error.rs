//! Wire format error types.

use thiserror::Error;

/// Malformed blob, metadata or frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Blob is shorter than the fixed regions require
    #[error("blob too short: {0} bytes")]
    TooShort(usize),

    /// Chunk stream length is not a multiple of the chunk unit
    #[error("chunk stream of {0} bytes is not aligned to 64-byte units")]
    Misaligned(usize),

    /// Blob length disagrees with the sizes declared in the metadata
    #[error("blob length mismatch: metadata implies {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Length implied by the metadata
        expected: usize,
        /// Actual blob length
        actual: usize,
    },

    /// Metadata region has the wrong width
    #[error("metadata must be 6 bytes, got {0}")]
    Metadata(usize),

    /// Frame payload does not fit the 16-bit length prefix
    #[error("frame payload too large: {0} bytes")]
    FrameSize(usize),

    /// Response byte outside the device code table
    #[error("unknown response code 0x{0:02x}")]
    Code(u8),
}
