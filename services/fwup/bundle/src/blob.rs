//! The bundled firmware artifact.

use crate::error::BundleError;
use bytes::Bytes;
use fwup_wire::{BlobRegions, FormatError, Metadata};
use std::path::Path;
use tracing::info;

/// Encrypted, authenticated firmware blob.
///
/// A `Blob` always has a well-formed layout whose length agrees with its
/// metadata; authenticity is only established by [`crate::open_blob`] or by
/// the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    bytes: Bytes,
    metadata: Metadata,
}

impl Blob {
    /// Wrap raw bytes, checking layout and metadata consistency
    pub fn from_bytes(bytes: Bytes) -> Result<Self, FormatError> {
        let regions = BlobRegions::split(&bytes)?;
        let metadata = regions.decode_metadata()?;
        regions.check_metadata(&metadata)?;
        Ok(Self { bytes, metadata })
    }

    pub(crate) fn from_parts(bytes: Bytes, metadata: Metadata) -> Self {
        Self { bytes, metadata }
    }

    /// Raw blob bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Blob length
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a well-formed blob
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Declared metadata
    pub fn metadata(&self) -> Metadata {
        self.metadata
    }

    /// Named regions
    pub fn regions(&self) -> BlobRegions<'_> {
        // length was validated on construction
        BlobRegions::split(&self.bytes).expect("blob layout validated on construction")
    }

    /// Write the blob to a file
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), BundleError> {
        std::fs::write(&path, &self.bytes)?;
        info!(
            "Wrote {} byte blob (version {}) to {:?}",
            self.bytes.len(),
            self.metadata.version,
            path.as_ref()
        );
        Ok(())
    }

    /// Read and validate a blob from a file
    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, BundleError> {
        let raw = std::fs::read(&path)?;
        Ok(Self::from_bytes(Bytes::from(raw))?)
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
