//! Host side of the firmware update protocol.
//!
//! This crate drives a protected blob across a byte channel to a device
//! bootloader, one bounded request/response step at a time.
//!
//! ## Features
//!
//! - **Frame transport**: raw regions and u16 length-prefixed frames, each
//!   answered by a single response byte within a configured timeout
//! - **Handshake**: update-mode byte echo, tolerant of boot noise
//! - **Update session**: explicit phase machine from `Idle` to `Done` or
//!   `Failed`, with the failing phase and last bytes sent in every error
//!
//! ## Example
//!
//! ```rust,no_run
//! use fwup_session::{open_serial, SessionConfig, UpdateSession, DEFAULT_BAUD_RATE};
//!
//! # async fn example(blob: Vec<u8>) -> anyhow::Result<()> {
//! let port = open_serial("/dev/ttyUSB0", DEFAULT_BAUD_RATE)?;
//! let mut session = UpdateSession::new(port, SessionConfig::default());
//!
//! let report = session.run(&blob).await?;
//! println!("Installed version {} ({} chunks)", report.version, report.chunks);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod handshake;
pub mod session;
pub mod transport;

#[cfg(test)]
mod mock;

pub use error::{DeviceRejection, FailureKind, ProtocolError, SessionError};
pub use handshake::handshake;
pub use session::{Phase, SessionConfig, SessionReport, UpdateSession};
pub use transport::{open_serial, FrameTransport, TransportStats, DEFAULT_BAUD_RATE};
