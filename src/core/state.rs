//! Session lifecycle states and the transition graph.
//!
//! ```text
//! Idle ──negotiationReady──▶ Connecting ──linkEstablished──▶ Connected
//!                              │    │                          │     │
//!                    linkFailed│    │cancelled   peerClosed/   │     │ioError
//!                              ▼    ▼            localClose    ▼     ▼
//!                          Failed  Closed ◀──drained── Closing     Failed
//! ```
//!
//! `Closed` and `Failed` are terminal for a session; a fresh negotiation
//! creates a new session instead of revisiting a state.

use std::fmt;

use super::error::FailureReason;

/// Lifecycle state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No link negotiated yet.
    #[default]
    Idle,
    /// Listening (owner) or dialing (member).
    Connecting,
    /// Framed channel established.
    Connected,
    /// Draining outbound messages before closing.
    Closing,
    /// Closed cleanly.
    Closed,
    /// Ended by an error.
    Failed(FailureReason),
}

impl SessionState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Connected)
                | (Connecting, Failed(_))
                | (Connecting, Closed)
                | (Connected, Closing)
                | (Connected, Failed(_))
                | (Closing, Closed)
        )
    }

    /// Closed or failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed(_))
    }

    /// A channel exists in exactly these states.
    pub fn has_channel(&self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Closing)
    }

    /// Short lowercase name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Failed(reason) => write!(f, "failed ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}
