//! Transport layer error types.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::core::{FailureReason, FrameError, PeerAddress};

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Owner could not bind its listening socket.
    #[error("bind to {addr} failed: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Accepting an inbound connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// Listener used before `start`.
    #[error("listener not started")]
    NotListening,

    /// Connect attempt exceeded its timeout.
    #[error("connect to {addr} timed out after {timeout:?}")]
    Timeout {
        /// Dialed address.
        addr: PeerAddress,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// Nothing is listening at the owner address.
    #[error("connection to {0} refused")]
    Refused(PeerAddress),

    /// Owner address is not routable (yet).
    #[error("{addr} unreachable: {source}")]
    Unreachable {
        /// Dialed address.
        addr: PeerAddress,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Wire format violation.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// I/O error on an established connection.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Peer closed the connection on a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// Channel already closed, or never opened.
    #[error("not connected")]
    NotConnected,

    /// Operation abandoned because its session moved on.
    #[error("cancelled")]
    Cancelled,
}

impl TransportError {
    /// Check if this error leaves the channel unusable.
    ///
    /// Every wire format violation read off the stream is fatal; the stream
    /// cannot be resynchronized once a prefix is wrong.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Frame(_)
                | TransportError::Io(_)
                | TransportError::ConnectionClosed
                | TransportError::NotConnected
        )
    }

    /// Check if a connect failure is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout { .. }
                | TransportError::Refused(_)
                | TransportError::Unreachable { .. }
        )
    }

    /// Check if the peer broke the wire format.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, TransportError::Frame(_))
    }

    /// Cloneable snapshot for a `Failed` state.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            TransportError::Bind { addr, source } => {
                FailureReason::Bind(format!("{addr}: {source}"))
            }
            TransportError::Accept(e) => FailureReason::Accept(e.to_string()),
            TransportError::NotListening => FailureReason::Accept(self.to_string()),
            TransportError::Timeout { .. } => FailureReason::Timeout,
            TransportError::Refused(_) => FailureReason::Refused,
            TransportError::Unreachable { addr, source } => {
                FailureReason::Unreachable(format!("{addr}: {source}"))
            }
            TransportError::Frame(FrameError::TooLarge { len, max }) => {
                FailureReason::FrameTooLarge {
                    len: *len,
                    max: *max,
                }
            }
            TransportError::Frame(e) => FailureReason::MalformedFrame(e.to_string()),
            TransportError::Io(e) => FailureReason::Io(e.to_string()),
            TransportError::ConnectionClosed
            | TransportError::NotConnected
            | TransportError::Cancelled => FailureReason::Io(self.to_string()),
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> PeerAddress {
        "192.168.49.1:20112".parse().unwrap()
    }

    #[test]
    fn test_retryable_errors() {
        assert!(TransportError::Refused(owner()).is_retryable());
        assert!(
            TransportError::Timeout {
                addr: owner(),
                timeout: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(
            TransportError::Unreachable {
                addr: owner(),
                source: io::Error::new(io::ErrorKind::Other, "no route")
            }
            .is_retryable()
        );

        assert!(!TransportError::ConnectionClosed.is_retryable());
        assert!(!TransportError::Frame(FrameError::Empty).is_retryable());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(TransportError::ConnectionClosed.is_fatal());
        assert!(TransportError::Frame(FrameError::TooLarge { len: 9, max: 8 }).is_fatal());
        assert!(TransportError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe")).is_fatal());

        assert!(!TransportError::Cancelled.is_fatal());
        assert!(!TransportError::Refused(owner()).is_fatal());
    }

    #[test]
    fn test_failure_reason_mapping() {
        assert_eq!(
            TransportError::Frame(FrameError::TooLarge { len: 9, max: 8 }).failure_reason(),
            FailureReason::FrameTooLarge { len: 9, max: 8 }
        );
        assert_eq!(
            TransportError::Refused(owner()).failure_reason(),
            FailureReason::Refused
        );
        assert!(matches!(
            TransportError::Frame(FrameError::Empty).failure_reason(),
            FailureReason::MalformedFrame(_)
        ));
    }
}
