//! A single session over one negotiated link.
//!
//! Handles per-link state including:
//! - Session ID management
//! - Lifecycle transitions (validated against the state graph)
//! - Ownership of the cancellation token and outbound queue

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::manager::SessionError;
use super::worker::Outbound;
use crate::core::constants::SESSION_ID_SIZE;
use crate::core::{PeerAddress, Role, SessionState};

/// Session ID (48-bit, random).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId([u8; SESSION_ID_SIZE]);

impl SessionId {
    /// Create a session ID from bytes.
    pub fn new(bytes: [u8; SESSION_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a random session ID.
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// Get the session ID as bytes.
    pub fn as_bytes(&self) -> &[u8; SESSION_ID_SIZE] {
        &self.0
    }

    /// Convert to a u64 (zero-padded).
    pub fn to_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf[2..].copy_from_slice(&self.0);
        u64::from_be_bytes(buf)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:012x}", self.to_u64())
    }
}

impl From<[u8; SESSION_ID_SIZE]> for SessionId {
    fn from(bytes: [u8; SESSION_ID_SIZE]) -> Self {
        Self::new(bytes)
    }
}

/// Point-in-time view of the manager's session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    /// Current session, if one was ever negotiated.
    pub id: Option<SessionId>,
    /// Our role.
    pub role: Option<Role>,
    /// Lifecycle state (`Idle` when no session exists).
    pub state: SessionState,
    /// Far side of the link, once known.
    pub remote: Option<PeerAddress>,
    /// Owner's listening address.
    pub local: Option<SocketAddr>,
}

/// Per-link session.
///
/// The outbound queue is present exactly while the session is `Connected`;
/// once it is taken the writer drains what is left and closes. Dropping the
/// session cancels every worker attached to it.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    role: Role,
    owner: IpAddr,
    state: SessionState,
    remote: Option<PeerAddress>,
    local: Option<SocketAddr>,

    /// Cancels every worker of this session.
    cancel: CancellationToken,
    /// Cancels only the reader (child of `cancel`).
    reader_cancel: CancellationToken,

    outbound: Option<mpsc::Sender<Outbound>>,
    /// Owner's accept/reject task; the next owner session waits on it.
    listener_task: Option<JoinHandle<()>>,
}

impl Session {
    /// Create a session in `Idle`.
    pub fn new(role: Role, owner: IpAddr) -> Self {
        let cancel = CancellationToken::new();
        let reader_cancel = cancel.child_token();
        Self {
            id: SessionId::generate(),
            role,
            owner,
            state: SessionState::Idle,
            remote: None,
            local: None,
            cancel,
            reader_cancel,
            outbound: None,
            listener_task: None,
        }
    }

    /// Session ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether a negotiation result describes this same link.
    pub fn is_same_link(&self, role: Role, owner: IpAddr) -> bool {
        self.role == role && self.owner == owner
    }

    /// Token cancelling every worker.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Token cancelling the reader only.
    pub fn reader_token(&self) -> CancellationToken {
        self.reader_cancel.clone()
    }

    /// Record the owner's bound address.
    pub fn set_local(&mut self, addr: SocketAddr) {
        self.local = Some(addr);
    }

    /// Move to `next`, enforcing the state graph and releasing resources the
    /// new state may not hold.
    pub fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(&next) {
            return Err(SessionError::InvalidTransition {
                from: self.state.clone(),
                to: next,
            });
        }

        match &next {
            SessionState::Closing => {
                // No new sends; the writer drains its queue and then closes.
                self.outbound = None;
                self.reader_cancel.cancel();
            }
            SessionState::Closed | SessionState::Failed(_) => {
                self.outbound = None;
                self.cancel.cancel();
            }
            _ => {}
        }

        self.state = next;
        Ok(())
    }

    /// Attach the established channel's outbound queue and enter `Connected`.
    pub fn connect(
        &mut self,
        outbound: mpsc::Sender<Outbound>,
        remote: Option<PeerAddress>,
    ) -> Result<(), SessionError> {
        self.transition(SessionState::Connected)?;
        self.outbound = Some(outbound);
        if remote.is_some() {
            self.remote = remote;
        }
        Ok(())
    }

    /// Outbound queue, only while `Connected`.
    pub fn outbound(&self) -> Option<&mpsc::Sender<Outbound>> {
        self.outbound
            .as_ref()
            .filter(|_| self.state == SessionState::Connected)
    }

    /// Set the dial target (member side).
    pub fn set_remote(&mut self, remote: PeerAddress) {
        self.remote = Some(remote);
    }

    /// Remember the owner's listener task.
    pub(crate) fn set_listener_task(&mut self, task: JoinHandle<()>) {
        self.listener_task = Some(task);
    }

    /// Hand the listener task to whoever needs the port next.
    pub(crate) fn take_listener_task(&mut self) -> Option<JoinHandle<()>> {
        self.listener_task.take()
    }

    /// Point-in-time view.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: Some(self.id),
            role: Some(self.role),
            state: self.state.clone(),
            remote: self.remote,
            local: self.local,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
