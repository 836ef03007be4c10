//! Blob layout, metadata codec, serial framing and device response codes
//! for fwup.
//!
//! This crate holds the data formats shared by the bundler and the update
//! session. It performs no I/O and no cryptography: it only knows where
//! each region of a blob lives and how bytes are framed on the serial link.
//!
//! ## Wire Protocol
//!
//! ```text
//! host                                  device
//!  | -- handshake byte ------------------> |
//!  | <------------------- handshake echo -- |
//!  | -- metadata (6B) -------------------> |
//!  | <----------------------- response --- |
//!  | -- hmac(metadata) (32B) ------------> |
//!  | <----------------------- response --- |
//!  | -- [u16 BE len | chunk || hmac] ----> |   repeated per chunk
//!  | <----------------------- response --- |
//!  | -- [0x0000] ------------------------> |   end of stream
//!  | <----------------------- response --- |
//!  | -- hmac(half1) || hmac(half2) ------> |
//!  | <----------------------- response --- |
//!  | -- hmac(h1 || h2) ------------------> |
//!  | <----------------------- response --- |
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod error;
pub mod frame;
pub mod layout;
pub mod metadata;
pub mod response;

// Re-export main types
pub use chunk::{Chunker, Reassembler};
pub use error::FormatError;
pub use frame::{Frame, FrameDecoder, FRAME_HEADER_SIZE, MAX_FRAME_PAYLOAD};
pub use layout::{
    BlobLayout, BlobRegions, CBC_BLOCK_SIZE, CHUNK_SIZE, CHUNK_UNIT_SIZE, HEADER_SIZE, HMAC_SIZE,
    IV_SIZE, TREE_SIZE,
};
pub use metadata::{Metadata, METADATA_SIZE};
pub use response::{Response, HANDSHAKE_BYTE};
