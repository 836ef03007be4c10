//! Update session state machine.
//!
//! One session streams one blob to one device:
//!
//! ```text
//! Idle -> Handshaking -> SendingMetadata -> AwaitingMetadataAck
//!      -> SendingMetadataHmac -> AwaitingMetadataHmacAck
//!      -> StreamingChunks -> AwaitingFinalizeAck
//!      -> SendingTreeHalves -> AwaitingTreeAck
//!      -> SendingTreeCombinedHmac -> AwaitingTreeCombinedAck -> Done
//! ```
//!
//! Any non-Ack response, timeout or channel failure moves the session to
//! `Failed` and ends it. The device's write cursor has already advanced by
//! then, so nothing is retried; a new attempt needs a new session.

use crate::error::{DeviceRejection, FailureKind, ProtocolError, SessionError};
use crate::handshake::handshake;
use crate::transport::{FrameTransport, TransportStats};
use bytes::Bytes;
use fwup_wire::{
    BlobRegions, Chunker, Frame, Metadata, Response, FRAME_HEADER_SIZE, HANDSHAKE_BYTE,
};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Configuration for an update session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Byte written to request update mode and echoed by the device
    pub handshake_byte: u8,
    /// Bound on the handshake echo wait
    pub handshake_timeout: Duration,
    /// Bound on every post-write response wait
    pub response_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_byte: HANDSHAKE_BYTE,
            handshake_timeout: Duration::from_secs(2),
            response_timeout: Duration::from_secs(2),
        }
    }
}

/// Protocol phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Not started
    Idle,
    /// Waiting for the handshake echo
    Handshaking,
    /// Writing metadata
    SendingMetadata,
    /// Waiting for the metadata response
    AwaitingMetadataAck,
    /// Writing the metadata HMAC
    SendingMetadataHmac,
    /// Waiting for the metadata HMAC response
    AwaitingMetadataHmacAck,
    /// Writing chunk frames, one response per frame
    StreamingChunks,
    /// Sentinel written, waiting for the page flush response
    AwaitingFinalizeAck,
    /// Writing both half HMACs
    SendingTreeHalves,
    /// Waiting for the half HMAC response
    AwaitingTreeAck,
    /// Writing the combined HMAC
    SendingTreeCombinedHmac,
    /// Waiting for the final response
    AwaitingTreeCombinedAck,
    /// Update accepted
    Done,
    /// Session ended with an error
    Failed(FailureKind),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::Handshaking => f.write_str("handshaking"),
            Phase::SendingMetadata => f.write_str("sending metadata"),
            Phase::AwaitingMetadataAck => f.write_str("awaiting metadata ack"),
            Phase::SendingMetadataHmac => f.write_str("sending metadata HMAC"),
            Phase::AwaitingMetadataHmacAck => f.write_str("awaiting metadata HMAC ack"),
            Phase::StreamingChunks => f.write_str("streaming chunks"),
            Phase::AwaitingFinalizeAck => f.write_str("awaiting finalize ack"),
            Phase::SendingTreeHalves => f.write_str("sending tree halves"),
            Phase::AwaitingTreeAck => f.write_str("awaiting tree ack"),
            Phase::SendingTreeCombinedHmac => f.write_str("sending combined tree HMAC"),
            Phase::AwaitingTreeCombinedAck => f.write_str("awaiting combined tree ack"),
            Phase::Done => f.write_str("done"),
            Phase::Failed(kind) => write!(f, "failed ({:?})", kind),
        }
    }
}

/// Summary of a completed update
#[derive(Clone, Debug)]
pub struct SessionReport {
    /// Installed version
    pub version: u16,
    /// Plaintext firmware size
    pub firmware_size: u16,
    /// Chunk frames streamed
    pub chunks: usize,
    /// Transport counters
    pub stats: TransportStats,
    /// Wall time from handshake to final Ack
    pub elapsed: Duration,
}

/// One update attempt against one device
pub struct UpdateSession<C> {
    transport: FrameTransport<C>,
    config: SessionConfig,
    phase: Phase,
    trace: Vec<Phase>,
    remaining: usize,
}

impl<C> UpdateSession<C>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a session over a channel
    pub fn new(channel: C, config: SessionConfig) -> Self {
        let transport = FrameTransport::new(channel, config.response_timeout);
        Self {
            transport,
            config,
            phase: Phase::Idle,
            trace: Vec::new(),
            remaining: 0,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase entered after `Idle`, in order
    pub fn trace(&self) -> &[Phase] {
        &self.trace
    }

    /// Bytes still to be written to the device
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Transport counters
    pub fn stats(&self) -> &TransportStats {
        self.transport.stats()
    }

    /// Release the channel
    pub fn into_inner(self) -> C {
        self.transport.into_inner()
    }

    /// Stream a blob to the device.
    ///
    /// The blob layout is checked before the first byte is written; a
    /// malformed blob leaves the session `Idle`.
    pub async fn run(&mut self, blob: &[u8]) -> Result<SessionReport, SessionError> {
        if self.phase != Phase::Idle {
            return Err(SessionError::AlreadyStarted(self.phase));
        }

        let regions = BlobRegions::split(blob)?;
        let metadata = regions.decode_metadata()?;
        regions.check_metadata(&metadata)?;
        let frames = Chunker::new().frames(Bytes::copy_from_slice(regions.chunk_stream()))?;

        info!(
            "Starting update: version {}, {} byte firmware, {} chunks",
            metadata.version,
            metadata.firmware_size,
            regions.layout().chunk_count()
        );
        self.remaining = wire_len(&regions);
        let started = Instant::now();

        match self.drive(&regions, &frames).await {
            Ok(()) => {
                self.enter(Phase::Done);
                let elapsed = started.elapsed();
                info!(
                    "Done writing firmware version {} in {:?}",
                    metadata.version, elapsed
                );
                Ok(self.report(&metadata, regions.layout().chunk_count(), elapsed))
            }
            Err(err) => {
                if let Some(kind) = err.failure_kind() {
                    self.enter(Phase::Failed(kind));
                }
                error!("Update failed: {}", err);
                Err(err)
            }
        }
    }

    async fn drive(
        &mut self,
        regions: &BlobRegions<'_>,
        frames: &[Frame],
    ) -> Result<(), SessionError> {
        let byte = [self.config.handshake_byte];
        self.enter(Phase::Handshaking);
        let result = handshake(
            &mut self.transport,
            self.config.handshake_byte,
            self.config.handshake_timeout,
        )
        .await;
        result.map_err(|e| self.protocol_error(e, &byte))?;
        self.sent(byte.len());

        self.enter(Phase::SendingMetadata);
        self.write(regions.metadata()).await?;
        self.expect_ack(Phase::AwaitingMetadataAck, regions.metadata(), None)
            .await?;

        // any refusal of the metadata authenticator means it did not verify
        self.enter(Phase::SendingMetadataHmac);
        self.write(regions.metadata_hmac()).await?;
        self.expect_ack(
            Phase::AwaitingMetadataHmacAck,
            regions.metadata_hmac(),
            Some(DeviceRejection::HmacInvalid),
        )
        .await?;

        self.enter(Phase::StreamingChunks);
        for (index, frame) in frames.iter().enumerate() {
            debug!(
                "Writing frame {}/{} ({} bytes)",
                index + 1,
                frames.len(),
                frame.encoded_size()
            );
            let result = self.transport.send(frame).await;
            let response = result.map_err(|e| self.protocol_error(e, &frame.payload))?;
            self.sent(frame.encoded_size());
            self.check(response, &frame.payload, None)?;
        }

        let sentinel = Frame::sentinel();
        let result = self.transport.write_frame(&sentinel).await;
        let encoded = result.map_err(|e| self.protocol_error(e, &[]))?;
        self.sent(encoded.len());
        self.expect_ack(Phase::AwaitingFinalizeAck, &encoded, None)
            .await?;

        self.enter(Phase::SendingTreeHalves);
        self.write(regions.tree_halves()).await?;
        self.expect_ack(Phase::AwaitingTreeAck, regions.tree_halves(), None)
            .await?;

        self.enter(Phase::SendingTreeCombinedHmac);
        self.write(regions.tree_combined()).await?;
        self.expect_ack(Phase::AwaitingTreeCombinedAck, regions.tree_combined(), None)
            .await?;

        Ok(())
    }

    fn enter(&mut self, phase: Phase) {
        debug!(phase = %phase, "Session phase: {} -> {}", self.phase, phase);
        self.phase = phase;
        self.trace.push(phase);
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        let result = self.transport.write_raw(bytes).await;
        result.map_err(|e| self.protocol_error(e, bytes))?;
        self.sent(bytes.len());
        Ok(())
    }

    async fn expect_ack(
        &mut self,
        awaiting: Phase,
        last_sent: &[u8],
        reject_as: Option<DeviceRejection>,
    ) -> Result<(), SessionError> {
        self.enter(awaiting);
        let result = self.transport.read_response().await;
        let response = result.map_err(|e| self.protocol_error(e, last_sent))?;
        self.check(response, last_sent, reject_as)
    }

    fn check(
        &self,
        response: Response,
        last_sent: &[u8],
        reject_as: Option<DeviceRejection>,
    ) -> Result<(), SessionError> {
        match DeviceRejection::from_response(response) {
            None => Ok(()),
            Some(reason) => Err(SessionError::DeviceRejected {
                phase: self.phase,
                last_sent: Bytes::copy_from_slice(last_sent),
                reason: reject_as.unwrap_or(reason),
            }),
        }
    }

    fn protocol_error(&self, source: ProtocolError, last_sent: &[u8]) -> SessionError {
        SessionError::Protocol {
            phase: self.phase,
            last_sent: Bytes::copy_from_slice(last_sent),
            source,
        }
    }

    fn sent(&mut self, n: usize) {
        self.remaining = self.remaining.saturating_sub(n);
    }

    fn report(&self, metadata: &Metadata, chunks: usize, elapsed: Duration) -> SessionReport {
        SessionReport {
            version: metadata.version,
            firmware_size: metadata.firmware_size,
            chunks,
            stats: self.transport.stats().clone(),
            elapsed,
        }
    }
}

/// Bytes the host writes for a whole session
fn wire_len(regions: &BlobRegions<'_>) -> usize {
    let units = regions.layout().chunk_count();
    1 + regions.metadata().len()
        + regions.metadata_hmac().len()
        + regions.chunk_stream().len()
        + (units + 1) * FRAME_HEADER_SIZE
        + regions.tree().len()
}
