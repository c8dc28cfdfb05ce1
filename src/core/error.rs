//! Error types shared by every layer.

use thiserror::Error;

/// Errors in the length-prefixed wire format.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Claimed (or requested) frame length exceeds the configured limit.
    #[error("frame too large: {len} bytes exceeds limit of {max}")]
    TooLarge {
        /// Length found in the prefix, or of the message being sent.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Zero-length frame. Frames always carry at least one byte.
    #[error("empty frame")]
    Empty,

    /// Stream ended in the middle of a frame.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes the frame needed.
        expected: usize,
        /// Bytes that arrived before end of stream.
        actual: usize,
    },
}

/// Errors when constructing a [`PeerAddress`](super::PeerAddress).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Port 0 cannot be dialed.
    #[error("invalid port: {0}")]
    InvalidPort(u16),

    /// Host could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Setting name (environment key).
        key: String,
        /// Raw value.
        value: String,
    },

    /// The configuration as a whole is inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Why a session ended up in `Failed`.
///
/// This is a cloneable snapshot of the underlying error so that states can be
/// compared, stored and re-published.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Owner could not bind its listening port.
    #[error("bind failed: {0}")]
    Bind(String),

    /// Owner failed while accepting.
    #[error("accept failed: {0}")]
    Accept(String),

    /// Member connect attempts timed out.
    #[error("connect timed out")]
    Timeout,

    /// Owner refused the connection.
    #[error("connection refused")]
    Refused,

    /// Owner address is not reachable.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// I/O error on an established channel.
    #[error("i/o error: {0}")]
    Io(String),

    /// Peer announced a frame above the limit.
    #[error("frame too large: {len} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Claimed length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Peer sent a frame that does not follow the wire format.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Superseded by a negotiation naming a different peer or role.
    #[error("negotiation conflict")]
    NegotiationConflict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_display() {
        let err = FrameError::TooLarge { len: 10, max: 4 };
        assert_eq!(err.to_string(), "frame too large: 10 bytes exceeds limit of 4");
        assert_eq!(FrameError::Empty.to_string(), "empty frame");
    }

    #[test]
    fn test_failure_reason_eq() {
        assert_eq!(FailureReason::Timeout, FailureReason::Timeout);
        assert_ne!(
            FailureReason::Io("reset".into()),
            FailureReason::Io("broken pipe".into())
        );
    }
}
