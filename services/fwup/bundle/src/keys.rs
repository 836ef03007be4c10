//! Build key material.
//!
//! The key artifact is a 48-byte file: the AES-128 CBC key at offset 0
//! followed by the HMAC-SHA256 key at offset 16. The same bytes are compiled
//! into the bootloader, so the artifact is generated once per build and only
//! read afterwards.

use crate::error::KeyError;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// CBC key size
pub const CBC_KEY_SIZE: usize = 16;
/// HMAC key size
pub const HMAC_KEY_SIZE: usize = 32;
/// Key artifact size
pub const KEY_ARTIFACT_SIZE: usize = CBC_KEY_SIZE + HMAC_KEY_SIZE;

/// Encryption and authentication keys shared with the device
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    cbc_key: [u8; CBC_KEY_SIZE],
    hmac_key: [u8; HMAC_KEY_SIZE],
}

impl KeyMaterial {
    /// Create key material from raw keys
    pub fn new(cbc_key: [u8; CBC_KEY_SIZE], hmac_key: [u8; HMAC_KEY_SIZE]) -> Self {
        Self { cbc_key, hmac_key }
    }

    /// Generate fresh keys from the OS random source
    pub fn generate() -> Self {
        let mut cbc_key = [0u8; CBC_KEY_SIZE];
        let mut hmac_key = [0u8; HMAC_KEY_SIZE];
        OsRng.fill_bytes(&mut cbc_key);
        OsRng.fill_bytes(&mut hmac_key);
        Self { cbc_key, hmac_key }
    }

    /// Parse a key artifact
    pub fn from_bytes(raw: &[u8]) -> Result<Self, KeyError> {
        if raw.len() != KEY_ARTIFACT_SIZE {
            return Err(KeyError::Length {
                expected: KEY_ARTIFACT_SIZE,
                actual: raw.len(),
            });
        }

        let mut cbc_key = [0u8; CBC_KEY_SIZE];
        let mut hmac_key = [0u8; HMAC_KEY_SIZE];
        cbc_key.copy_from_slice(&raw[..CBC_KEY_SIZE]);
        hmac_key.copy_from_slice(&raw[CBC_KEY_SIZE..]);
        Ok(Self { cbc_key, hmac_key })
    }

    /// Serialize to the artifact form
    pub fn to_bytes(&self) -> [u8; KEY_ARTIFACT_SIZE] {
        let mut out = [0u8; KEY_ARTIFACT_SIZE];
        out[..CBC_KEY_SIZE].copy_from_slice(&self.cbc_key);
        out[CBC_KEY_SIZE..].copy_from_slice(&self.hmac_key);
        out
    }

    /// Read a key artifact from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, KeyError> {
        let raw = std::fs::read(&path)?;
        let keys = Self::from_bytes(&raw)?;
        debug!("Loaded key material from {:?}", path.as_ref());
        Ok(keys)
    }

    /// Write the key artifact to disk
    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<(), KeyError> {
        std::fs::write(&path, self.to_bytes())?;
        info!("Wrote key material to {:?}", path.as_ref());
        Ok(())
    }

    /// AES-128 CBC key
    pub fn cbc_key(&self) -> &[u8; CBC_KEY_SIZE] {
        &self.cbc_key
    }

    /// HMAC-SHA256 key
    pub fn hmac_key(&self) -> &[u8; HMAC_KEY_SIZE] {
        &self.hmac_key
    }

    /// Both keys as C initializer lists, for the bootloader build
    pub fn c_arrays(&self) -> (String, String) {
        (to_c_array(&self.cbc_key), to_c_array(&self.hmac_key))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("cbc_key", &"<redacted>")
            .field("hmac_key", &"<redacted>")
            .finish()
    }
}

/// Render bytes as a C initializer list, e.g. `{0x0,0x1f}`
pub fn to_c_array(bytes: &[u8]) -> String {
    let items: Vec<String> = bytes.iter().map(|b| format!("{:#x}", b)).collect();
    format!("{{{}}}", items.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn fixed_keys() -> KeyMaterial {
        let mut cbc = [0u8; CBC_KEY_SIZE];
        let mut hmac = [0u8; HMAC_KEY_SIZE];
        for (i, b) in cbc.iter_mut().enumerate() {
            *b = i as u8;
        }
        for (i, b) in hmac.iter_mut().enumerate() {
            *b = 0xA0 + i as u8;
        }
        KeyMaterial::new(cbc, hmac)
    }

    #[test]
    fn test_artifact_offsets() {
        let keys = fixed_keys();
        let raw = keys.to_bytes();
        assert_eq!(&raw[..16], keys.cbc_key());
        assert_eq!(&raw[16..], keys.hmac_key());
        assert_eq!(KeyMaterial::from_bytes(&raw).unwrap(), keys);
    }

    #[test]
    fn test_wrong_artifact_length() {
        match KeyMaterial::from_bytes(&[0u8; 47]) {
            Err(KeyError::Length { expected, actual }) => {
                assert_eq!(expected, 48);
                assert_eq!(actual, 47);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_store_and_load() {
        let keys = KeyMaterial::generate();
        let file = NamedTempFile::new().unwrap();
        keys.store(file.path()).unwrap();

        let loaded = KeyMaterial::load(file.path()).unwrap();
        assert_eq!(loaded, keys);
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(KeyMaterial::generate(), KeyMaterial::generate());
    }

    #[test]
    fn test_c_array_rendering() {
        assert_eq!(to_c_array(&[0x00, 0x1f, 0xff]), "{0x0,0x1f,0xff}");
        let (cbc, hmac) = fixed_keys().c_arrays();
        assert!(cbc.starts_with("{0x0,0x1,0x2,"));
        assert!(hmac.starts_with("{0xa0,0xa1,"));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let rendered = format!("{:?}", fixed_keys());
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("160"));
    }
}
