//! Serial framing.
//!
//! Each frame is a big-endian `u16` length followed by that many payload
//! bytes. A zero-length frame tells the receiver the payload stream is over
//! and it should flush its last partial flash page.

use crate::error::FormatError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Length prefix size
pub const FRAME_HEADER_SIZE: usize = 2;

/// Largest payload the length prefix can describe
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// One transport frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame payload (a chunk unit, or empty for the sentinel)
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame around a payload
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// The zero-length end-of-stream sentinel
    pub fn sentinel() -> Self {
        Self {
            payload: Bytes::new(),
        }
    }

    /// Whether this is the end-of-stream sentinel
    pub fn is_sentinel(&self) -> bool {
        self.payload.is_empty()
    }

    /// Get the total frame size when encoded
    pub fn encoded_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }

    /// Encode frame to a contiguous buffer
    pub fn encode(&self) -> Result<Bytes, FormatError> {
        if self.payload.len() > MAX_FRAME_PAYLOAD {
            return Err(FormatError::FrameSize(self.payload.len()));
        }

        let mut buf = BytesMut::with_capacity(self.encoded_size());
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);

        Ok(buf.freeze())
    }
}

/// Incremental frame decoder, used by receiver emulation
#[derive(Debug, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Create a new frame decoder
    pub fn new() -> Self {
        Self
    }

    /// Decode one frame from a buffer, or `None` if more bytes are needed
    pub fn decode(&mut self, buf: &mut BytesMut) -> Option<Frame> {
        if buf.len() < FRAME_HEADER_SIZE {
            return None;
        }

        // Peek at frame length
        let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        if buf.len() < FRAME_HEADER_SIZE + len {
            return None;
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(len).freeze();

        Some(Frame { payload })
    }
}
