//! Length-prefixed framing.
//!
//! Stream sockets do not preserve message boundaries, so every message is
//! preceded by its length:
//!
//! ```text
//! +----------------------+---------------------------+
//! | Length L             | Payload                   |
//! | 4 bytes (BE u32)     | L bytes, 0 < L <= max     |
//! +----------------------+---------------------------+
//! ```
//!
//! The claimed length is validated before any payload is allocated or read,
//! so a corrupt or hostile prefix fails fast instead of stalling the reader.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::{TransportError, TransportResult};
use crate::core::constants::FRAME_HEADER_SIZE;
use crate::core::{FrameError, Message};

/// Encode the length prefix for a payload of `len` bytes.
pub fn encode_header(
    len: usize,
    max_frame_size: usize,
) -> Result<[u8; FRAME_HEADER_SIZE], FrameError> {
    check_length(len, max_frame_size)?;
    // check_length bounds len by max_frame_size, which config caps at u32::MAX.
    let len = u32::try_from(len).map_err(|_| FrameError::TooLarge {
        len,
        max: max_frame_size,
    })?;
    Ok(len.to_be_bytes())
}

/// Decode and validate a length prefix.
pub fn decode_header(
    header: [u8; FRAME_HEADER_SIZE],
    max_frame_size: usize,
) -> Result<usize, FrameError> {
    let len = u32::from_be_bytes(header) as usize;
    check_length(len, max_frame_size)?;
    Ok(len)
}

/// Encode a complete frame (prefix + payload) into one buffer.
///
/// Writing a frame with a single `write_all` keeps frames from interleaving.
pub fn encode_frame(payload: &[u8], max_frame_size: usize) -> Result<Vec<u8>, FrameError> {
    let header = encode_header(payload.len(), max_frame_size)?;
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header);
    buf.extend_from_slice(payload);
    Ok(buf)
}

fn check_length(len: usize, max_frame_size: usize) -> Result<(), FrameError> {
    if len == 0 {
        return Err(FrameError::Empty);
    }
    if len > max_frame_size {
        return Err(FrameError::TooLarge {
            len,
            max: max_frame_size,
        });
    }
    Ok(())
}

/// Read one frame.
///
/// End of stream before the first prefix byte is a clean close
/// ([`TransportError::ConnectionClosed`]); end of stream anywhere else is a
/// truncated frame.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> TransportResult<Message>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Err(TransportError::ConnectionClosed);
            }
            return Err(FrameError::Truncated {
                expected: FRAME_HEADER_SIZE,
                actual: filled,
            }
            .into());
        }
        filled += n;
    }

    let len = decode_header(header, max_frame_size)?;

    let mut payload = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read(&mut payload[filled..]).await?;
        if n == 0 {
            return Err(FrameError::Truncated {
                expected: len,
                actual: filled,
            }
            .into());
        }
        filled += n;
    }

    Ok(Message::new(payload))
}

/// Write one frame and flush it.
pub async fn write_frame<W>(
    writer: &mut W,
    message: &Message,
    max_frame_size: usize,
) -> TransportResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let buf = encode_frame(message.as_bytes(), max_frame_size)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read half of a framed channel.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a reader.
    pub fn new(inner: R, max_frame_size: usize) -> Self {
        Self {
            inner,
            max_frame_size,
        }
    }

    /// Wait for the next complete frame.
    pub async fn receive(&mut self) -> TransportResult<Message> {
        read_frame(&mut self.inner, self.max_frame_size).await
    }

    /// Unwrap the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Write half of a framed channel.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    max_frame_size: usize,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap a writer.
    pub fn new(inner: W, max_frame_size: usize) -> Self {
        Self {
            inner,
            max_frame_size,
        }
    }

    /// Write one message as a frame.
    pub async fn send(&mut self, message: &Message) -> TransportResult<()> {
        write_frame(&mut self.inner, message, self.max_frame_size).await
    }

    /// Flush and shut down the write direction (the peer sees end of stream).
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.flush().await?;
        self.inner.shutdown().await
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    #[test]
    fn test_header_is_big_endian() {
        assert_eq!(encode_header(5, MAX).unwrap(), [0, 0, 0, 5]);
        assert_eq!(encode_header(0x0102, MAX).unwrap(), [0, 0, 1, 2]);
        assert_eq!(decode_header([0, 0, 1, 2], MAX).unwrap(), 0x0102);
    }

    #[test]
    fn test_header_limits() {
        assert_eq!(encode_header(0, MAX), Err(FrameError::Empty));
        assert_eq!(decode_header([0, 0, 0, 0], MAX), Err(FrameError::Empty));
        assert_eq!(
            decode_header([0, 0, 4, 1], MAX),
            Err(FrameError::TooLarge { len: 1025, max: MAX })
        );
        assert_eq!(decode_header([0, 0, 4, 0], MAX), Ok(MAX));
    }

    #[test]
    fn test_encode_frame() {
        let frame = encode_frame(b"hello", MAX).unwrap();
        assert_eq!(hex::encode(&frame), "0000000568656c6c6f");
    }

    #[tokio::test]
    async fn test_read_multiple_frames_from_one_buffer() {
        let mut wire = encode_frame(b"first", MAX).unwrap();
        wire.extend(encode_frame(b"second message", MAX).unwrap());
        let mut reader = &wire[..];

        assert_eq!(read_frame(&mut reader, MAX).await.unwrap().as_bytes(), b"first");
        assert_eq!(
            read_frame(&mut reader, MAX).await.unwrap().as_bytes(),
            b"second message"
        );
        assert!(matches!(
            read_frame(&mut reader, MAX).await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_truncated_header() {
        let wire = [0u8, 0];
        let mut reader = &wire[..];
        assert!(matches!(
            read_frame(&mut reader, MAX).await,
            Err(TransportError::Frame(FrameError::Truncated {
                expected: 4,
                actual: 2
            }))
        ));
    }

    #[tokio::test]
    async fn test_read_truncated_payload() {
        let wire = [0u8, 0, 0, 8, b'a', b'b'];
        let mut reader = &wire[..];
        assert!(matches!(
            read_frame(&mut reader, MAX).await,
            Err(TransportError::Frame(FrameError::Truncated {
                expected: 8,
                actual: 2
            }))
        ));
    }

    #[tokio::test]
    async fn test_oversized_prefix_fails_without_payload() {
        // Only the prefix is present: the reader must not wait for 16 MiB.
        let wire = (16u32 << 20).to_be_bytes();
        let mut reader = &wire[..];
        assert!(matches!(
            read_frame(&mut reader, MAX).await,
            Err(TransportError::Frame(FrameError::TooLarge { .. }))
        ));
    }

    #[tokio::test]
    async fn test_split_reader_writer() {
        let (a, b) = tokio::io::duplex(64);
        let mut writer = FrameWriter::new(a, MAX);
        let mut reader = FrameReader::new(b, MAX);

        let payload = vec![0xAB; 300]; // larger than the duplex buffer
        let send = tokio::spawn(async move {
            writer.send(&Message::new(payload)).await.unwrap();
            writer.shutdown().await.unwrap();
        });

        let msg = reader.receive().await.unwrap();
        assert_eq!(msg.len(), 300);
        assert!(msg.as_bytes().iter().all(|b| *b == 0xAB));
        assert!(matches!(
            reader.receive().await,
            Err(TransportError::ConnectionClosed)
        ));
        send.await.unwrap();
    }
}
