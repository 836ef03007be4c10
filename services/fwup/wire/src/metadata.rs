//! Release metadata carried at the head of every blob.
//!
//! Three little-endian `u16` fields: version, plaintext firmware size and
//! release message size (without its NUL terminator).

use crate::error::FormatError;
use crate::layout::{BlobLayout, CBC_BLOCK_SIZE, CHUNK_SIZE, IV_SIZE};
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Encoded metadata size in bytes
pub const METADATA_SIZE: usize = 6;

/// Firmware release metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Firmware version (0 is the debug version on the device)
    pub version: u16,
    /// Plaintext firmware length before padding and encryption
    pub firmware_size: u16,
    /// Release message length, terminator excluded
    pub message_size: u16,
}

impl Metadata {
    /// Create metadata from its three fields
    pub fn new(version: u16, firmware_size: u16, message_size: u16) -> Self {
        Self {
            version,
            firmware_size,
            message_size,
        }
    }

    /// Encode into the 6-byte wire form
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.firmware_size);
        buf.put_u16_le(self.message_size);
    }

    /// Encode into a fixed array
    pub fn to_bytes(&self) -> [u8; METADATA_SIZE] {
        let mut buf = BytesMut::with_capacity(METADATA_SIZE);
        self.encode(&mut buf);
        let mut out = [0u8; METADATA_SIZE];
        out.copy_from_slice(&buf);
        out
    }

    /// Decode from exactly 6 bytes
    pub fn decode(mut raw: &[u8]) -> Result<Self, FormatError> {
        if raw.len() != METADATA_SIZE {
            return Err(FormatError::Metadata(raw.len()));
        }

        Ok(Self {
            version: raw.get_u16_le(),
            firmware_size: raw.get_u16_le(),
            message_size: raw.get_u16_le(),
        })
    }

    /// Ciphertext length for this firmware size (PKCS#7 always adds a block
    /// when the input is already aligned)
    pub fn ciphertext_len(&self) -> usize {
        (self.firmware_size as usize / CBC_BLOCK_SIZE + 1) * CBC_BLOCK_SIZE
    }

    /// Offset of the IV inside the chunk data
    pub fn iv_offset(&self) -> usize {
        self.ciphertext_len()
    }

    /// Offset of the release message inside the chunk data
    pub fn message_offset(&self) -> usize {
        self.ciphertext_len() + IV_SIZE
    }

    /// Unpadded payload length: ciphertext, IV, message and terminator
    pub fn payload_len(&self) -> usize {
        self.message_offset() + self.message_size as usize + 1
    }

    /// Number of 32-byte chunks the payload occupies after zero padding
    pub fn chunk_count(&self) -> usize {
        (self.payload_len() + CHUNK_SIZE - 1) / CHUNK_SIZE
    }

    /// Layout of the blob these sizes describe
    pub fn layout(&self) -> BlobLayout {
        BlobLayout::for_chunks(self.chunk_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_little_endian() {
        let meta = Metadata::new(0x0102, 0x0304, 0x0506);
        assert_eq!(meta.to_bytes(), [0x02, 0x01, 0x04, 0x03, 0x06, 0x05]);
        assert_eq!(Metadata::decode(&meta.to_bytes()).unwrap(), meta);
    }

    #[test]
    fn test_decode_rejects_wrong_width() {
        assert_eq!(
            Metadata::decode(&[1, 0, 2, 0]),
            Err(FormatError::Metadata(4))
        );
    }

    #[test]
    fn test_derived_sizes() {
        // 130 bytes -> 144 ciphertext, +16 IV, +10 message, +1 NUL = 171
        let meta = Metadata::new(2, 130, 10);
        assert_eq!(meta.ciphertext_len(), 144);
        assert_eq!(meta.message_offset(), 160);
        assert_eq!(meta.payload_len(), 171);
        assert_eq!(meta.chunk_count(), 6);

        // aligned firmware still gains a full padding block
        let aligned = Metadata::new(1, 32, 0);
        assert_eq!(aligned.ciphertext_len(), 48);
        assert_eq!(aligned.payload_len(), 65);
        assert_eq!(aligned.chunk_count(), 3);
    }
}
