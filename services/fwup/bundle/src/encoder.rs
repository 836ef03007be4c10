//! Authenticated encoder: raw firmware in, blob out.
//!
//! The firmware is encrypted with AES-128-CBC under a fresh IV, then the
//! payload `ciphertext || iv || message || 0x00` is zero-padded to whole
//! 32-byte chunks. Each chunk is followed by its own HMAC so the receiver can
//! authenticate and flash incrementally, and a trailing tree authenticator
//! binds chunk order and completeness.

use crate::blob::Blob;
use crate::cipher;
use crate::error::InputError;
use crate::keys::KeyMaterial;
use crate::mac::{hmac, TreeHmacs};
use bytes::{BufMut, BytesMut};
use fwup_wire::{Metadata, CHUNK_SIZE, IV_SIZE};
use tracing::debug;

/// Bundle firmware with freshly generated IV
pub fn bundle(
    firmware: &[u8],
    version: u16,
    message: &str,
    keys: &KeyMaterial,
) -> Result<Blob, InputError> {
    Bundler::new(keys).bundle(firmware, version, message)
}

/// Produces blobs under one set of keys
#[derive(Debug, Clone, Copy)]
pub struct Bundler<'k> {
    keys: &'k KeyMaterial,
}

impl<'k> Bundler<'k> {
    /// Create a bundler borrowing the build keys
    pub fn new(keys: &'k KeyMaterial) -> Self {
        Self { keys }
    }

    /// Bundle firmware with a fresh random IV
    pub fn bundle(&self, firmware: &[u8], version: u16, message: &str) -> Result<Blob, InputError> {
        self.bundle_with_iv(firmware, version, message, &cipher::random_iv())
    }

    /// Bundle with a caller-chosen IV; only for reproducible tests
    pub(crate) fn bundle_with_iv(
        &self,
        firmware: &[u8],
        version: u16,
        message: &str,
        iv: &[u8; IV_SIZE],
    ) -> Result<Blob, InputError> {
        let metadata = check_input(firmware, version, message)?;
        let hmac_key = self.keys.hmac_key();

        let ciphertext = cipher::encrypt(firmware, self.keys.cbc_key(), iv);

        let mut payload = BytesMut::with_capacity(metadata.chunk_count() * CHUNK_SIZE);
        payload.put_slice(&ciphertext);
        payload.put_slice(iv);
        payload.put_slice(message.as_bytes());
        payload.put_u8(0);
        let padded = (payload.len() + CHUNK_SIZE - 1) / CHUNK_SIZE * CHUNK_SIZE;
        payload.resize(padded, 0);
        debug_assert_eq!(payload.len(), metadata.chunk_count() * CHUNK_SIZE);

        let layout = metadata.layout();
        let mut blob = BytesMut::with_capacity(layout.total_len());

        metadata.encode(&mut blob);
        blob.put_slice(&hmac(hmac_key, &metadata.to_bytes()));

        for chunk in payload.chunks_exact(CHUNK_SIZE) {
            blob.put_slice(chunk);
            blob.put_slice(&hmac(hmac_key, chunk));
        }

        let tree = TreeHmacs::compute(hmac_key, &payload);
        blob.put_slice(&tree.to_bytes());
        debug_assert_eq!(blob.len(), layout.total_len());

        debug!(
            "Bundled version {}: {} byte firmware, {} byte message, {} chunks, {} byte blob",
            version,
            firmware.len(),
            message.len(),
            layout.chunk_count(),
            blob.len()
        );

        Ok(Blob::from_parts(blob.freeze(), metadata))
    }
}

fn check_input(firmware: &[u8], version: u16, message: &str) -> Result<Metadata, InputError> {
    if firmware.is_empty() {
        return Err(InputError::EmptyFirmware);
    }
    let firmware_size =
        u16::try_from(firmware.len()).map_err(|_| InputError::FirmwareTooLarge(firmware.len()))?;
    let message_size =
        u16::try_from(message.len()).map_err(|_| InputError::MessageTooLarge(message.len()))?;
    if let Some(pos) = message.bytes().position(|b| b == 0) {
        return Err(InputError::MessageContainsNul(pos));
    }

    Ok(Metadata::new(version, firmware_size, message_size))
}
