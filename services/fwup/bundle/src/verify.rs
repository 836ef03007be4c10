//! Host-side verification of a blob, performing the same checks as the
//! receiver in the same order, then decrypting it.

use crate::cipher;
use crate::error::VerifyError;
use crate::keys::KeyMaterial;
use crate::mac::{split_halves, verify};
use fwup_wire::{BlobRegions, Metadata, HMAC_SIZE, IV_SIZE};
use serde::Serialize;
use tracing::debug;

/// Contents of a verified blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenedBlob {
    /// Authenticated metadata
    pub metadata: Metadata,
    /// Decrypted firmware image
    #[serde(skip)]
    pub firmware: Vec<u8>,
    /// Release message
    pub message: String,
    /// Number of authenticated chunks
    pub chunks: usize,
}

/// Authenticate, check and decrypt a blob
pub fn open_blob(blob: &[u8], keys: &KeyMaterial) -> Result<OpenedBlob, VerifyError> {
    let hmac_key = keys.hmac_key();
    let regions = BlobRegions::split(blob)?;

    if !verify(hmac_key, regions.metadata(), regions.metadata_hmac()) {
        return Err(VerifyError::MetadataHmac);
    }
    let metadata = regions.decode_metadata()?;
    regions.check_metadata(&metadata)?;

    for (index, unit) in regions.units().enumerate() {
        let (chunk, tag) = unit.split_at(unit.len() - HMAC_SIZE);
        if !verify(hmac_key, chunk, tag) {
            return Err(VerifyError::ChunkHmac { index });
        }
    }

    let data = regions.chunk_data();
    let (first, second) = split_halves(&data);
    let halves = regions.tree_halves();
    if !verify(hmac_key, first, &halves[..HMAC_SIZE]) {
        return Err(VerifyError::TreeHalf { half: 1 });
    }
    if !verify(hmac_key, second, &halves[HMAC_SIZE..]) {
        return Err(VerifyError::TreeHalf { half: 2 });
    }
    if !verify(hmac_key, halves, regions.tree_combined()) {
        return Err(VerifyError::TreeCombined);
    }
    debug!(
        "Authenticated {} chunks of version {}",
        regions.layout().chunk_count(),
        metadata.version
    );

    let ciphertext = &data[..metadata.ciphertext_len()];
    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&data[metadata.iv_offset()..metadata.message_offset()]);
    let firmware = cipher::decrypt(ciphertext, keys.cbc_key(), &iv)?;
    if firmware.len() != metadata.firmware_size as usize {
        return Err(VerifyError::FirmwareSize {
            expected: metadata.firmware_size as usize,
            actual: firmware.len(),
        });
    }

    let start = metadata.message_offset();
    let end = start + metadata.message_size as usize;
    if data[end] != 0 {
        return Err(VerifyError::Message);
    }
    let message = std::str::from_utf8(&data[start..end])
        .map_err(|_| VerifyError::Message)?
        .to_string();

    Ok(OpenedBlob {
        metadata,
        firmware,
        message,
        chunks: regions.layout().chunk_count(),
    })
}
