//! Session and transport error types.

use crate::session::Phase;
use bytes::Bytes;
use fwup_wire::{FormatError, Response};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failures
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Device did not answer in time
    #[error("timed out after {0:?} waiting for the device")]
    Timeout(Duration),

    /// Response byte outside the code table
    #[error("unexpected response byte 0x{0:02x}")]
    UnexpectedByte(u8),

    /// Channel closed
    #[error("device closed the channel")]
    Disconnected,

    /// Frame could not be encoded
    #[error("frame error: {0}")]
    Frame(#[from] FormatError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons the device gives for refusing an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRejection {
    /// Version older than the installed one
    VersionMismatch,
    /// Authenticator did not verify
    HmacInvalid,
    /// Image does not fit in flash
    FlashFull,
    /// Release message over the device limit
    MessageTooLarge,
}

impl DeviceRejection {
    /// Decode a non-Ack response
    pub fn from_response(response: Response) -> Option<Self> {
        match response {
            Response::Ack => None,
            Response::VersionRejected => Some(DeviceRejection::VersionMismatch),
            Response::HmacInvalid => Some(DeviceRejection::HmacInvalid),
            Response::FlashFull => Some(DeviceRejection::FlashFull),
            Response::MessageTooLarge => Some(DeviceRejection::MessageTooLarge),
        }
    }
}

impl fmt::Display for DeviceRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeviceRejection::VersionMismatch => "version is wrong",
            DeviceRejection::HmacInvalid => "HMAC is not verifiable",
            DeviceRejection::FlashFull => "not enough space in flash",
            DeviceRejection::MessageTooLarge => "release message too large",
        };
        f.write_str(text)
    }
}

/// Why a session ended in [`Phase::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No response within the configured wait
    Timeout,
    /// Response byte outside the code table
    UnexpectedByte(u8),
    /// Channel closed
    Disconnected,
    /// Frame could not be encoded
    Frame,
    /// Other I/O failure
    Io,
    /// Device refused the version
    VersionMismatch,
    /// Device could not verify an authenticator
    HmacInvalid,
    /// Device flash too small
    FlashFull,
    /// Release message too large for the device
    MessageTooLarge,
}

impl From<&ProtocolError> for FailureKind {
    fn from(err: &ProtocolError) -> Self {
        match err {
            ProtocolError::Timeout(_) => FailureKind::Timeout,
            ProtocolError::UnexpectedByte(b) => FailureKind::UnexpectedByte(*b),
            ProtocolError::Disconnected => FailureKind::Disconnected,
            ProtocolError::Frame(_) => FailureKind::Frame,
            ProtocolError::Io(_) => FailureKind::Io,
        }
    }
}

impl From<DeviceRejection> for FailureKind {
    fn from(reason: DeviceRejection) -> Self {
        match reason {
            DeviceRejection::VersionMismatch => FailureKind::VersionMismatch,
            DeviceRejection::HmacInvalid => FailureKind::HmacInvalid,
            DeviceRejection::FlashFull => FailureKind::FlashFull,
            DeviceRejection::MessageTooLarge => FailureKind::MessageTooLarge,
        }
    }
}

/// Update session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Blob rejected before anything was written to the channel
    #[error("malformed blob: {0}")]
    Format(#[from] FormatError),

    /// Sessions are single use
    #[error("session already ran (phase: {0})")]
    AlreadyStarted(Phase),

    /// Transport failure
    #[error("{phase}: {source}")]
    Protocol {
        /// Phase the session was in
        phase: Phase,
        /// Last bytes written before the failure
        last_sent: Bytes,
        /// Underlying transport error
        source: ProtocolError,
    },

    /// Device answered with an error code
    #[error("{phase}: device rejected the update: {reason}")]
    DeviceRejected {
        /// Phase the session was in
        phase: Phase,
        /// Last bytes written before the rejection
        last_sent: Bytes,
        /// Decoded reason
        reason: DeviceRejection,
    },
}

impl SessionError {
    /// Failure kind recorded in the session phase, if the session was
    /// under way when the error occurred
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            SessionError::Protocol { source, .. } => Some(FailureKind::from(source)),
            SessionError::DeviceRejected { reason, .. } => Some(FailureKind::from(*reason)),
            SessionError::Format(_) | SessionError::AlreadyStarted(_) => None,
        }
    }

    /// Phase the error occurred in
    pub fn phase(&self) -> Option<Phase> {
        match self {
            SessionError::Protocol { phase, .. } | SessionError::DeviceRejected { phase, .. } => {
                Some(*phase)
            }
            SessionError::AlreadyStarted(phase) => Some(*phase),
            SessionError::Format(_) => None,
        }
    }
}
