//! Splitting the chunk stream into transport frames and reassembling it.
//!
//! One frame carries exactly one 64-byte unit (chunk plus its HMAC) so the
//! receiver never buffers more than one unit before deciding whether to
//! trust it.

use crate::error::FormatError;
use crate::frame::Frame;
use crate::layout::CHUNK_UNIT_SIZE;
use bytes::{Bytes, BytesMut};

/// Splits a chunk stream into one frame per chunk unit
#[derive(Debug, Clone)]
pub struct Chunker {
    unit_size: usize,
}

impl Chunker {
    /// Create a chunker for the standard 64-byte unit
    pub fn new() -> Self {
        Self {
            unit_size: CHUNK_UNIT_SIZE,
        }
    }

    /// Split a chunk stream into frames, in order, without the sentinel
    pub fn frames(&self, chunk_stream: Bytes) -> Result<Vec<Frame>, FormatError> {
        if chunk_stream.len() % self.unit_size != 0 {
            return Err(FormatError::Misaligned(chunk_stream.len()));
        }

        let mut frames = Vec::with_capacity(chunk_stream.len() / self.unit_size);
        let mut offset = 0;
        while offset < chunk_stream.len() {
            frames.push(Frame::new(chunk_stream.slice(offset..offset + self.unit_size)));
            offset += self.unit_size;
        }

        Ok(frames)
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects frame payloads until the sentinel arrives
#[derive(Debug, Default)]
pub struct Reassembler {
    stream: BytesMut,
    frames: usize,
}

impl Reassembler {
    /// Create a new reassembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame; returns the complete stream once the sentinel is seen
    pub fn add_frame(&mut self, frame: Frame) -> Option<Bytes> {
        if frame.is_sentinel() {
            self.frames = 0;
            return Some(std::mem::take(&mut self.stream).freeze());
        }

        self.frames += 1;
        self.stream.extend_from_slice(&frame.payload);
        None
    }

    /// Number of data frames collected so far
    pub fn frames(&self) -> usize {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_one_frame_per_unit() {
        let stream: Vec<u8> = (0..4 * CHUNK_UNIT_SIZE).map(|i| i as u8).collect();
        let frames = Chunker::new().frames(Bytes::from(stream.clone())).unwrap();

        assert_eq!(frames.len(), 4);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(
                &frame.payload[..],
                &stream[i * CHUNK_UNIT_SIZE..(i + 1) * CHUNK_UNIT_SIZE]
            );
        }
    }

    #[test]
    fn test_chunker_rejects_partial_unit() {
        let err = Chunker::new().frames(Bytes::from(vec![0u8; 100])).unwrap_err();
        assert_eq!(err, FormatError::Misaligned(100));
    }

    #[test]
    fn test_reassembler_waits_for_sentinel() {
        let stream = Bytes::from(vec![7u8; 3 * CHUNK_UNIT_SIZE]);
        let frames = Chunker::new().frames(stream.clone()).unwrap();

        let mut reassembler = Reassembler::new();
        for frame in frames {
            assert!(reassembler.add_frame(frame).is_none());
        }
        assert_eq!(reassembler.frames(), 3);

        let complete = reassembler.add_frame(Frame::sentinel()).unwrap();
        assert_eq!(complete, stream);
        assert_eq!(reassembler.frames(), 0);
    }
}
