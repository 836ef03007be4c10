//! Single-byte device responses.
//!
//! The receiver answers every write with one byte from this table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handshake byte the receiver echoes when it enters update mode
pub const HANDSHAKE_BYTE: u8 = b'U';

/// Device response codes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Response {
    /// Write accepted
    Ack = 0x00,
    /// Version older than the installed firmware
    VersionRejected = 0x01,
    /// HMAC did not verify
    HmacInvalid = 0x02,
    /// Image does not fit in flash
    FlashFull = 0x03,
    /// Release message exceeds the device limit
    MessageTooLarge = 0x04,
}

impl TryFrom<u8> for Response {
    type Error = crate::FormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Response::Ack),
            0x01 => Ok(Response::VersionRejected),
            0x02 => Ok(Response::HmacInvalid),
            0x03 => Ok(Response::FlashFull),
            0x04 => Ok(Response::MessageTooLarge),
            _ => Err(crate::FormatError::Code(value)),
        }
    }
}

impl From<Response> for u8 {
    fn from(response: Response) -> u8 {
        response as u8
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Response::Ack => "ok",
            Response::VersionRejected => "version is wrong",
            Response::HmacInvalid => "HMAC is not verifiable",
            Response::FlashFull => "not enough space in flash",
            Response::MessageTooLarge => "release message too large",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FormatError;

    #[test]
    fn test_response_conversion() {
        assert_eq!(Response::try_from(0x00).unwrap(), Response::Ack);
        assert_eq!(Response::try_from(0x02).unwrap(), Response::HmacInvalid);
        assert_eq!(Response::try_from(0x04).unwrap(), Response::MessageTooLarge);
        assert_eq!(Response::try_from(0x05), Err(FormatError::Code(0x05)));
        assert_eq!(Response::try_from(b'U'), Err(FormatError::Code(b'U')));
    }

    #[test]
    fn test_codes_survive_conversion() {
        for byte in 0u8..=4 {
            let response = Response::try_from(byte).unwrap();
            assert_eq!(response == Response::Ack, byte == 0);
            assert_eq!(u8::from(response), byte);
        }
    }
}
