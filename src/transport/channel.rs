//! Framed message channel over an established connection.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::error::{TransportError, TransportResult};
use super::frame::{self, FrameReader, FrameWriter};
use crate::core::Message;

/// A message channel owning one connection.
///
/// Any fatal receive error (I/O, end of stream, oversized or malformed frame)
/// closes the channel; afterwards `send` and `receive` fail with
/// [`TransportError::NotConnected`]. The connection is dropped exactly once.
///
/// # Example
///
/// ```ignore
/// let stream = TcpStream::connect(owner).await?;
/// let mut channel = FramedChannel::from_tcp(stream, DEFAULT_MAX_FRAME_SIZE);
/// channel.send(&Message::from("hello")).await?;
/// let reply = channel.receive().await?;
/// ```
#[derive(Debug)]
pub struct FramedChannel<S = TcpStream> {
    io: Option<S>,
    max_frame_size: usize,
    peer: Option<SocketAddr>,
}

impl FramedChannel<TcpStream> {
    /// Wrap a TCP connection.
    pub fn from_tcp(stream: TcpStream, max_frame_size: usize) -> Self {
        // Small frames should not sit in Nagle's buffer.
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to set TCP_NODELAY");
        }
        let peer = stream.peer_addr().ok();
        Self {
            io: Some(stream),
            max_frame_size,
            peer,
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> FramedChannel<S> {
    /// Wrap any bidirectional byte stream.
    pub fn new(io: S, max_frame_size: usize) -> Self {
        Self {
            io: Some(io),
            max_frame_size,
            peer: None,
        }
    }

    /// Remote address, when the stream has one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Configured frame limit.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Whether the connection is still held.
    pub fn is_open(&self) -> bool {
        self.io.is_some()
    }

    /// Send one message.
    ///
    /// Empty or oversized messages are rejected before touching the stream
    /// and leave the channel open. I/O errors close it.
    pub async fn send(&mut self, message: &Message) -> TransportResult<()> {
        let io = self.io.as_mut().ok_or(TransportError::NotConnected)?;
        let buf = frame::encode_frame(message.as_bytes(), self.max_frame_size)?;

        let result = async {
            io.write_all(&buf).await?;
            io.flush().await
        }
        .await;

        if let Err(e) = result {
            self.drop_connection("send failed");
            return Err(TransportError::Io(e));
        }
        trace!(len = message.len(), "frame sent");
        Ok(())
    }

    /// Wait for the next message.
    ///
    /// Each call yields exactly one message; call again for the next one.
    pub async fn receive(&mut self) -> TransportResult<Message> {
        let io = self.io.as_mut().ok_or(TransportError::NotConnected)?;
        match frame::read_frame(io, self.max_frame_size).await {
            Ok(message) => {
                trace!(len = message.len(), "frame received");
                Ok(message)
            }
            Err(e) => {
                if e.is_fatal() {
                    self.drop_connection("receive failed");
                }
                Err(e)
            }
        }
    }

    /// Flush, shut down and release the connection. Idempotent.
    pub async fn close(&mut self) -> TransportResult<()> {
        let Some(mut io) = self.io.take() else {
            return Ok(());
        };
        let result = async {
            io.flush().await?;
            io.shutdown().await
        }
        .await;
        debug!(peer = ?self.peer, "channel closed");
        result.map_err(TransportError::Io)
    }

    /// Split into independently owned halves.
    ///
    /// The connection closes when both halves are dropped.
    pub fn into_split(
        mut self,
    ) -> TransportResult<(FrameReader<ReadHalf<S>>, FrameWriter<WriteHalf<S>>)> {
        let io = self.io.take().ok_or(TransportError::NotConnected)?;
        let (read, write) = tokio::io::split(io);
        Ok((
            FrameReader::new(read, self.max_frame_size),
            FrameWriter::new(write, self.max_frame_size),
        ))
    }

    fn drop_connection(&mut self, why: &str) {
        if self.io.take().is_some() {
            debug!(peer = ?self.peer, why, "channel dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FrameError;
    use tokio::io::{AsyncReadExt, DuplexStream};
    use tokio::net::TcpListener;

    const MAX: usize = 64 * 1024;

    fn pair() -> (FramedChannel<DuplexStream>, FramedChannel<DuplexStream>) {
        let (a, b) = tokio::io::duplex(4096);
        (FramedChannel::new(a, MAX), FramedChannel::new(b, MAX))
    }

    #[tokio::test]
    async fn test_messages_arrive_in_order() {
        let (mut left, mut right) = pair();

        for i in 0..10u8 {
            left.send(&Message::new(vec![i; usize::from(i) + 1])).await.unwrap();
        }
        for i in 0..10u8 {
            let msg = right.receive().await.unwrap();
            assert_eq!(msg.as_bytes(), vec![i; usize::from(i) + 1].as_slice());
        }
    }

    #[tokio::test]
    async fn test_boundary_sizes_roundtrip() {
        let (a, b) = tokio::io::duplex(MAX);
        let mut left = FramedChannel::new(a, MAX);
        let mut right = FramedChannel::new(b, MAX);

        let reader = tokio::spawn(async move {
            let one = right.receive().await.unwrap();
            let max = right.receive().await.unwrap();
            (one, max)
        });

        left.send(&Message::new(vec![7u8])).await.unwrap();
        let big: Vec<u8> = (0..MAX).map(|i| (i % 251) as u8).collect();
        left.send(&Message::new(big.clone())).await.unwrap();

        let (one, max) = reader.await.unwrap();
        assert_eq!(one.as_bytes(), &[7u8]);
        assert_eq!(max.as_bytes(), big.as_slice());
    }

    #[tokio::test]
    async fn test_invalid_outgoing_message_keeps_channel_open() {
        let (mut left, mut right) = pair();

        assert!(matches!(
            left.send(&Message::default()).await,
            Err(TransportError::Frame(FrameError::Empty))
        ));
        assert!(matches!(
            left.send(&Message::new(vec![0u8; MAX + 1])).await,
            Err(TransportError::Frame(FrameError::TooLarge { .. }))
        ));
        assert!(left.is_open());

        left.send(&Message::from("still fine")).await.unwrap();
        assert_eq!(right.receive().await.unwrap().as_bytes(), b"still fine");
    }

    #[tokio::test]
    async fn test_oversized_frame_closes_channel() {
        let (mut raw, b) = tokio::io::duplex(64);
        let mut channel = FramedChannel::new(b, MAX);

        raw.write_all(&((MAX as u32) + 1).to_be_bytes()).await.unwrap();

        assert!(matches!(
            channel.receive().await,
            Err(TransportError::Frame(FrameError::TooLarge { .. }))
        ));
        assert!(!channel.is_open());
        assert!(matches!(
            channel.send(&Message::from("x")).await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            channel.receive().await,
            Err(TransportError::NotConnected)
        ));

        // The connection was released: the raw side sees end of stream.
        let mut buf = [0u8; 1];
        assert_eq!(raw.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_length_prefix_is_malformed() {
        let (mut raw, b) = tokio::io::duplex(64);
        let mut channel = FramedChannel::new(b, MAX);

        raw.write_all(&[0, 0, 0, 0]).await.unwrap();
        let err = channel.receive().await.unwrap_err();
        assert!(err.is_protocol_violation());
        assert!(!channel.is_open());
    }

    #[tokio::test]
    async fn test_peer_close_is_connection_closed() {
        let (mut left, mut right) = pair();
        left.close().await.unwrap();
        left.close().await.unwrap(); // idempotent

        assert!(matches!(
            right.receive().await,
            Err(TransportError::ConnectionClosed)
        ));
        assert!(matches!(
            left.send(&Message::from("late")).await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_tcp_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut channel = FramedChannel::from_tcp(stream, MAX);
            let msg = channel.receive().await.unwrap();
            channel.send(&msg).await.unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut channel = FramedChannel::from_tcp(stream, MAX);
        assert_eq!(channel.peer_addr(), Some(addr));

        channel.send(&Message::from("ping")).await.unwrap();
        assert_eq!(channel.receive().await.unwrap().as_bytes(), b"ping");
        server.await.unwrap();
    }
}
