//! Frame transport over a byte channel.
//!
//! Every write to the device is answered by exactly one response byte. The
//! transport writes, flushes and then waits for that byte with an explicit
//! timeout, so a dead link surfaces as [`ProtocolError::Timeout`] instead of
//! blocking forever.

use crate::error::ProtocolError;
use bytes::Bytes;
use fwup_wire::{Frame, Response};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, trace};

/// Line rate the bootloader UART runs at
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Counters for one transport
#[derive(Clone, Debug, Default)]
pub struct TransportStats {
    /// Total bytes written
    pub bytes_out: u64,
    /// Number of frames written (sentinel included)
    pub frames_sent: u64,
    /// Number of response bytes read
    pub responses: u64,
    /// Most recent response
    pub last_response: Option<Response>,
}

/// Writes raw regions and length-prefixed frames, reads single-byte
/// responses
pub struct FrameTransport<C> {
    channel: C,
    response_timeout: Duration,
    stats: TransportStats,
}

impl<C> FrameTransport<C>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a channel
    pub fn new(channel: C, response_timeout: Duration) -> Self {
        Self {
            channel,
            response_timeout,
            stats: TransportStats::default(),
        }
    }

    /// Transport counters
    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Release the channel
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Write bytes as-is and flush
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.channel.write_all(bytes).await.map_err(map_io)?;
        self.channel.flush().await.map_err(map_io)?;
        self.stats.bytes_out += bytes.len() as u64;
        trace!("Wrote {} bytes", bytes.len());
        Ok(())
    }

    /// Encode and write a frame; returns the bytes put on the wire
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<Bytes, ProtocolError> {
        let encoded = frame.encode()?;
        self.write_raw(&encoded).await?;
        self.stats.frames_sent += 1;
        Ok(encoded)
    }

    /// Send one frame and wait for its response
    pub async fn send(&mut self, frame: &Frame) -> Result<Response, ProtocolError> {
        self.write_frame(frame).await?;
        self.read_response().await
    }

    /// Write raw bytes and wait for the response
    pub async fn exchange(&mut self, bytes: &[u8]) -> Result<Response, ProtocolError> {
        self.write_raw(bytes).await?;
        self.read_response().await
    }

    /// Wait for one response byte and decode it
    pub async fn read_response(&mut self) -> Result<Response, ProtocolError> {
        let wait = self.response_timeout;
        let byte = tokio::time::timeout(wait, self.read_byte())
            .await
            .map_err(|_| ProtocolError::Timeout(wait))??;

        self.stats.responses += 1;
        let response = Response::try_from(byte).map_err(|_| ProtocolError::UnexpectedByte(byte))?;
        self.stats.last_response = Some(response);
        trace!("Device responded 0x{:02x} ({})", byte, response);
        Ok(response)
    }

    /// Read a single byte with no deadline; callers bound it
    pub(crate) async fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        self.channel.read_u8().await.map_err(map_io)
    }
}

fn map_io(err: std::io::Error) -> ProtocolError {
    match err.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => {
            ProtocolError::Disconnected
        }
        _ => ProtocolError::Io(err),
    }
}

/// Open a serial port as raw 8N1 at `baud_rate`, without flow control.
///
/// The port is polled by the runtime's reactor, so dropping a pending read
/// (as a timeout does) leaves nothing blocked behind it. Must be called
/// from within a tokio runtime.
pub fn open_serial(path: &str, baud_rate: u32) -> std::io::Result<SerialStream> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()?;
    debug!("Opened {} at {} baud (8N1, raw)", path, baud_rate);
    Ok(port)
}
