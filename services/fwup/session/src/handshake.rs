//! Update-mode handshake.
//!
//! The host writes a single handshake byte and waits for the device to echo
//! it. Anything else the device prints while rebooting into the bootloader
//! is discarded. The whole wait is bounded.

use crate::error::ProtocolError;
use crate::transport::FrameTransport;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

/// Write `byte` and wait up to `wait` for the device to echo it.
///
/// Returns the number of unrelated bytes discarded before the echo.
pub async fn handshake<C>(
    transport: &mut FrameTransport<C>,
    byte: u8,
    wait: Duration,
) -> Result<usize, ProtocolError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    transport.write_raw(&[byte]).await?;
    debug!("Waiting for bootloader to enter update mode...");

    let echo = async {
        let mut discarded = 0usize;
        loop {
            let received = transport.read_byte().await?;
            if received == byte {
                return Ok::<usize, ProtocolError>(discarded);
            }
            trace!("Discarding 0x{:02x} while waiting for handshake echo", received);
            discarded += 1;
        }
    };

    let discarded = tokio::time::timeout(wait, echo)
        .await
        .map_err(|_| ProtocolError::Timeout(wait))??;
    debug!("Bootloader entered update mode ({} bytes discarded)", discarded);
    Ok(discarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_echo_after_noise() {
        let (host, mut device) = duplex(64);
        let mut transport = FrameTransport::new(host, Duration::from_secs(1));

        let device_task = tokio::spawn(async move {
            let byte = device.read_u8().await.unwrap();
            device.write_all(b"boot\r\n").await.unwrap();
            device.write_u8(byte).await.unwrap();
            byte
        });

        let discarded = handshake(&mut transport, b'U', Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(discarded, 6);
        assert_eq!(device_task.await.unwrap(), b'U');
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_echo_times_out() {
        let (host, mut device) = duplex(64);
        let mut transport = FrameTransport::new(host, Duration::from_secs(1));

        // device keeps printing but never echoes
        tokio::spawn(async move {
            loop {
                if device.write_u8(b'.').await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        });

        let wait = Duration::from_secs(3);
        let err = handshake(&mut transport, b'U', wait).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Timeout(d) if d == wait));
    }
}
