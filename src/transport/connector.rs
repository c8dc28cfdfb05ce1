//! Member-side dialer.

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use super::error::{TransportError, TransportResult};
use crate::core::PeerAddress;
use crate::core::constants::DEFAULT_CONNECT_TIMEOUT;

/// Dials the owner, one attempt per call.
///
/// Retries belong to the caller. An attempt is a plain future: dropping it
/// (for example by losing a `select!` against a cancellation token) abandons
/// the half-open socket.
#[derive(Debug, Clone, Copy)]
pub struct PeerConnector {
    timeout: Duration,
}

impl Default for PeerConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl PeerConnector {
    /// Create a connector with the given per-attempt timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Make a single connection attempt.
    pub async fn connect(&self, addr: PeerAddress) -> TransportResult<TcpStream> {
        debug!(peer = %addr, timeout = ?self.timeout, "connecting");
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr.socket_addr())).await {
            Err(_) => Err(TransportError::Timeout {
                addr,
                timeout: self.timeout,
            }),
            Ok(Err(e)) => Err(self.classify(addr, e)),
            Ok(Ok(stream)) => Ok(stream),
        }
    }

    /// Map a connect failure onto {Timeout, Refused, Unreachable}.
    fn classify(&self, addr: PeerAddress, e: io::Error) -> TransportError {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => TransportError::Refused(addr),
            io::ErrorKind::TimedOut => TransportError::Timeout {
                addr,
                timeout: self.timeout,
            },
            _ => TransportError::Unreachable { addr, source: e },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = PeerAddress::try_from(listener.local_addr().unwrap()).unwrap();

        let stream = PeerConnector::default().connect(addr).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), addr.socket_addr());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to find a port with nothing behind it.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            PeerAddress::try_from(listener.local_addr().unwrap()).unwrap()
        };

        let err = PeerConnector::new(Duration::from_secs(2))
            .connect(addr)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Refused(a) if a == addr));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_errors() {
        let addr: PeerAddress = "192.168.49.1:20112".parse().unwrap();
        let connector = PeerConnector::default();
        assert!(matches!(
            connector.classify(addr, io::Error::from(io::ErrorKind::ConnectionRefused)),
            TransportError::Refused(_)
        ));
        assert!(matches!(
            connector.classify(addr, io::Error::from(io::ErrorKind::TimedOut)),
            TransportError::Timeout { .. }
        ));
        assert!(matches!(
            connector.classify(addr, io::Error::from(io::ErrorKind::HostUnreachable)),
            TransportError::Unreachable { .. }
        ));
    }
}
