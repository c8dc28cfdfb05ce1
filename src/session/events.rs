//! Event bus and collaborator events.
//!
//! The bus is one-directional: the session manager produces, a single UI or
//! discovery collaborator consumes. Nothing in the core ever calls back into
//! collaborator code.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, mpsc};
use tracing::trace;

use super::session::SessionId;
use crate::core::{PeerDevice, Role, SessionState};

/// Events flowing *into* the core from the discovery/negotiation collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationEvent {
    /// Negotiation finished: we know our role and the owner's address.
    ///
    /// Ignored while `group_formed` is false.
    Ready {
        /// Our role.
        role: Role,
        /// The owner's address on the P2P link.
        owner: IpAddr,
        /// Whether the group is actually formed.
        group_formed: bool,
    },

    /// The link went away.
    Lost,

    /// The discovery collaborator refreshed its peer list.
    PeersChanged(Vec<PeerDevice>),

    /// The P2P radio was enabled or disabled.
    LinkStateChanged {
        /// Whether P2P is usable.
        enabled: bool,
    },
}

/// Events flowing *out of* the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session changed state. Emitted exactly once per transition.
    StateChanged {
        /// Session that changed.
        session: SessionId,
        /// New state.
        state: SessionState,
    },

    /// A message arrived.
    MessageReceived {
        /// Session it arrived on.
        session: SessionId,
        /// Payload.
        payload: Vec<u8>,
    },

    /// The peer list changed.
    PeerListUpdated(Vec<PeerDevice>),

    /// The member's connect attempt failed and another one is scheduled.
    Retrying {
        /// Session that is dialing.
        session: SessionId,
        /// Number of the upcoming attempt (2 for the first retry).
        attempt: u32,
        /// Pause before that attempt.
        delay: Duration,
    },

    /// The owner is listening.
    Listening {
        /// Session that owns the listener.
        session: SessionId,
        /// Bound address.
        addr: SocketAddr,
    },

    /// P2P was enabled or disabled.
    LinkAvailability {
        /// Whether P2P is usable.
        enabled: bool,
    },
}

impl SessionEvent {
    /// Session this event belongs to, if any.
    pub fn session(&self) -> Option<SessionId> {
        match self {
            SessionEvent::StateChanged { session, .. }
            | SessionEvent::MessageReceived { session, .. }
            | SessionEvent::Retrying { session, .. }
            | SessionEvent::Listening { session, .. } => Some(*session),
            SessionEvent::PeerListUpdated(_) | SessionEvent::LinkAvailability { .. } => None,
        }
    }
}

/// An event plus the inbound-window slot it occupies, if any.
#[derive(Debug)]
struct Envelope {
    event: SessionEvent,
    _permit: Option<OwnedSemaphorePermit>,
}

/// Producer side of the event bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventBus {
    /// Publish an event. Events published after the receiver is gone are dropped.
    pub fn publish(&self, event: SessionEvent) {
        self.send(Envelope {
            event,
            _permit: None,
        });
    }

    /// Publish an event that holds `permit` until the consumer takes it.
    ///
    /// Inbound messages travel this way so a consumer that stops reading
    /// stalls the channel reader instead of growing the queue.
    pub(crate) fn publish_held(&self, event: SessionEvent, permit: OwnedSemaphorePermit) {
        self.send(Envelope {
            event,
            _permit: Some(permit),
        });
    }

    fn send(&self, envelope: Envelope) {
        if let Err(e) = self.tx.send(envelope) {
            let event = e.0.event;
            trace!(session = ?event.session(), ?event, "event dropped: no subscriber");
        }
    }
}

/// Consumer side of the event bus.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl EventReceiver {
    /// Wait for the next event. Returns `None` once the manager has shut down
    /// and every queued event was delivered.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await.map(|envelope| envelope.event)
    }

    /// Take an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok().map(|envelope| envelope.event)
    }
}

/// Create a connected bus/receiver pair.
pub fn event_bus() -> (EventBus, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventBus { tx }, EventReceiver { rx })
}
