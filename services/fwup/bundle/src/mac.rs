//! HMAC-SHA256 helpers and the two-level tree authenticator.
//!
//! Per-chunk HMACs authenticate each chunk in isolation. The tree binds the
//! order and completeness of the chunk data: one HMAC over each half, then
//! one HMAC over the two half HMACs.

use crate::keys::HMAC_KEY_SIZE;
use fwup_wire::{BlobLayout, CHUNK_SIZE, HMAC_SIZE, TREE_SIZE};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 tag
pub type Tag = [u8; HMAC_SIZE];

fn keyed(key: &[u8; HMAC_KEY_SIZE]) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length")
}

/// HMAC of a single region
pub fn hmac(key: &[u8; HMAC_KEY_SIZE], data: &[u8]) -> Tag {
    let mut mac = keyed(key);
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Constant-time check of a region against its tag
pub fn verify(key: &[u8; HMAC_KEY_SIZE], data: &[u8], tag: &[u8]) -> bool {
    let mut mac = keyed(key);
    mac.update(data);
    mac.verify_slice(tag).is_ok()
}

/// Tree authenticator over the concatenated chunk data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHmacs {
    /// HMAC of the first half
    pub half1: Tag,
    /// HMAC of the second half
    pub half2: Tag,
    /// HMAC of `half1 || half2`
    pub combined: Tag,
}

impl TreeHmacs {
    /// Compute the tree over chunk data (per-chunk HMACs excluded)
    pub fn compute(key: &[u8; HMAC_KEY_SIZE], chunk_data: &[u8]) -> Self {
        let (first, second) = split_halves(chunk_data);
        let half1 = hmac(key, first);
        let half2 = hmac(key, second);

        let mut halves = [0u8; 2 * HMAC_SIZE];
        halves[..HMAC_SIZE].copy_from_slice(&half1);
        halves[HMAC_SIZE..].copy_from_slice(&half2);
        let combined = hmac(key, &halves);

        Self {
            half1,
            half2,
            combined,
        }
    }

    /// The 96-byte trailing region
    pub fn to_bytes(&self) -> [u8; TREE_SIZE] {
        let mut out = [0u8; TREE_SIZE];
        out[..HMAC_SIZE].copy_from_slice(&self.half1);
        out[HMAC_SIZE..2 * HMAC_SIZE].copy_from_slice(&self.half2);
        out[2 * HMAC_SIZE..].copy_from_slice(&self.combined);
        out
    }
}

/// Split chunk data into the two chunk-aligned tree halves
pub fn split_halves(chunk_data: &[u8]) -> (&[u8], &[u8]) {
    let chunks = chunk_data.len() / CHUNK_SIZE;
    let at = BlobLayout::for_chunks(chunks).half_split().min(chunk_data.len());
    chunk_data.split_at(at)
}
