//! Scripted device for session tests.
//!
//! Follows the receiver's documented response contract: echo the handshake,
//! answer every write with one byte, stop after the first non-Ack.

use bytes::{Bytes, BytesMut};
use fwup_wire::{FrameDecoder, Reassembler, HANDSHAKE_BYTE, HMAC_SIZE, METADATA_SIZE};
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

/// Points at which the device answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Stage {
    Metadata,
    MetadataHmac,
    Chunk(usize),
    Finalize,
    TreeHalves,
    TreeCombined,
}

/// What the device does at a stage
#[derive(Debug, Clone, Copy)]
pub(crate) enum Reply {
    Byte(u8),
    /// Never answer; keep reading until the host hangs up
    Silent,
    /// Close the channel
    Hangup,
}

/// Everything the device received
#[derive(Debug, Default)]
pub(crate) struct DeviceLog {
    pub handshake: Vec<u8>,
    pub metadata: Vec<u8>,
    pub metadata_hmac: Vec<u8>,
    pub frames: Vec<Bytes>,
    pub chunk_stream: Option<Bytes>,
    pub tree_halves: Vec<u8>,
    pub tree_combined: Vec<u8>,
    pub after_silence: Vec<u8>,
}

#[derive(Debug, Default)]
pub(crate) struct MockDevice {
    script: HashMap<Stage, Reply>,
    noise: Vec<u8>,
    mute_handshake: bool,
}

impl MockDevice {
    /// Device that acknowledges everything
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, stage: Stage, reply: Reply) -> Self {
        self.script.insert(stage, reply);
        self
    }

    /// Bytes printed before the handshake echo
    pub fn noise(mut self, noise: &[u8]) -> Self {
        self.noise = noise.to_vec();
        self
    }

    /// Never echo the handshake byte
    pub fn mute_handshake(mut self) -> Self {
        self.mute_handshake = true;
        self
    }

    pub fn spawn(self, io: DuplexStream) -> JoinHandle<DeviceLog> {
        tokio::spawn(async move {
            let mut io = io;
            let mut log = DeviceLog::default();
            // EOF or a closed channel just ends the run
            let _ = self.serve(&mut io, &mut log).await;
            log
        })
    }

    async fn serve(&self, io: &mut DuplexStream, log: &mut DeviceLog) -> std::io::Result<()> {
        loop {
            let byte = io.read_u8().await?;
            log.handshake.push(byte);
            if byte == HANDSHAKE_BYTE {
                break;
            }
        }
        if self.mute_handshake {
            io.read_to_end(&mut log.after_silence).await?;
            return Ok(());
        }
        io.write_all(&self.noise).await?;
        io.write_u8(HANDSHAKE_BYTE).await?;

        let mut pending = BytesMut::new();
        log.metadata = read_n(io, &mut pending, METADATA_SIZE).await?;
        if !self.respond(io, Stage::Metadata, log).await? {
            return Ok(());
        }

        log.metadata_hmac = read_n(io, &mut pending, HMAC_SIZE).await?;
        if !self.respond(io, Stage::MetadataHmac, log).await? {
            return Ok(());
        }

        let mut decoder = FrameDecoder::new();
        let mut reassembler = Reassembler::new();
        loop {
            let frame = loop {
                if let Some(frame) = decoder.decode(&mut pending) {
                    break frame;
                }
                fill(io, &mut pending).await?;
            };
            let payload = frame.payload.clone();
            if let Some(stream) = reassembler.add_frame(frame) {
                log.chunk_stream = Some(stream);
                if !self.respond(io, Stage::Finalize, log).await? {
                    return Ok(());
                }
                break;
            }
            let index = log.frames.len();
            log.frames.push(payload);
            if !self.respond(io, Stage::Chunk(index), log).await? {
                return Ok(());
            }
        }

        log.tree_halves = read_n(io, &mut pending, 2 * HMAC_SIZE).await?;
        if !self.respond(io, Stage::TreeHalves, log).await? {
            return Ok(());
        }

        log.tree_combined = read_n(io, &mut pending, HMAC_SIZE).await?;
        self.respond(io, Stage::TreeCombined, log).await?;
        Ok(())
    }

    /// Answer a stage; returns whether the exchange continues
    async fn respond(
        &self,
        io: &mut DuplexStream,
        stage: Stage,
        log: &mut DeviceLog,
    ) -> std::io::Result<bool> {
        match self.script.get(&stage).copied().unwrap_or(Reply::Byte(0x00)) {
            Reply::Byte(byte) => {
                io.write_u8(byte).await?;
                Ok(byte == 0x00)
            }
            Reply::Silent => {
                let mut rest = BytesMut::new();
                while io.read_buf(&mut rest).await? > 0 {}
                log.after_silence = rest.to_vec();
                Ok(false)
            }
            Reply::Hangup => Ok(false),
        }
    }
}

/// Read more bytes into `pending`; EOF ends the device run
async fn fill(io: &mut DuplexStream, pending: &mut BytesMut) -> std::io::Result<()> {
    if io.read_buf(pending).await? == 0 {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

async fn read_n(
    io: &mut DuplexStream,
    pending: &mut BytesMut,
    n: usize,
) -> std::io::Result<Vec<u8>> {
    while pending.len() < n {
        fill(io, pending).await?;
    }
    Ok(pending.split_to(n).to_vec())
}
