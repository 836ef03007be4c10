//! Bundling and verification errors.

use fwup_wire::FormatError;
use thiserror::Error;

/// Malformed bundling input, rejected before anything is produced
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Nothing to bundle
    #[error("firmware image is empty")]
    EmptyFirmware,

    /// Firmware size does not fit the 16-bit metadata field
    #[error("firmware image of {0} bytes exceeds the 65535-byte metadata limit")]
    FirmwareTooLarge(usize),

    /// Message size does not fit the 16-bit metadata field
    #[error("release message of {0} bytes exceeds the 65535-byte metadata limit")]
    MessageTooLarge(usize),

    /// The receiver reads the message up to its NUL terminator
    #[error("release message contains a NUL byte at offset {0}")]
    MessageContainsNul(usize),
}

/// Key artifact errors
#[derive(Error, Debug)]
pub enum KeyError {
    /// Artifact is not exactly one CBC key followed by one HMAC key
    #[error("key artifact must be {expected} bytes, got {actual}")]
    Length {
        /// Expected artifact length
        expected: usize,
        /// Actual artifact length
        actual: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob failed one of the checks the receiver performs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Layout or size inconsistency
    #[error("malformed blob: {0}")]
    Format(#[from] FormatError),

    /// Metadata authenticator mismatch
    #[error("metadata HMAC mismatch")]
    MetadataHmac,

    /// Per-chunk authenticator mismatch
    #[error("HMAC mismatch on chunk {index}")]
    ChunkHmac {
        /// Zero-based chunk index
        index: usize,
    },

    /// Half authenticator mismatch (chunk order or completeness)
    #[error("tree HMAC mismatch on half {half}")]
    TreeHalf {
        /// 1 or 2
        half: u8,
    },

    /// Authenticator over the half HMACs mismatch
    #[error("combined tree HMAC mismatch")]
    TreeCombined,

    /// Ciphertext did not decrypt to a correctly padded image
    #[error("firmware decryption failed")]
    Decrypt,

    /// Decrypted firmware length differs from the metadata
    #[error("decrypted firmware is {actual} bytes, metadata declares {expected}")]
    FirmwareSize {
        /// Size declared by the metadata
        expected: usize,
        /// Size recovered by decryption
        actual: usize,
    },

    /// Release message missing its terminator or not UTF-8
    #[error("release message is malformed")]
    Message,
}

/// File-level bundling errors
#[derive(Error, Debug)]
pub enum BundleError {
    /// Bad input
    #[error(transparent)]
    Input(#[from] InputError),

    /// Bad keys
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Bad blob
    #[error(transparent)]
    Format(#[from] FormatError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
