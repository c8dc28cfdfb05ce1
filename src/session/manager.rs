//! Session manager.
//!
//! A single actor task owns the active [`Session`]. Collaborator commands
//! (through a [`SessionHandle`]) and worker reports are processed one at a
//! time, so every transition is validated and announced exactly once.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use super::config::SessionConfig;
use super::events::{EventBus, EventReceiver, NegotiationEvent, SessionEvent, event_bus};
use super::session::{Session, SessionId, SessionSnapshot};
use super::worker::{self, Outbound, Reports, WorkerReport};
use crate::core::{
    ConfigError, FailureReason, Message, PeerAddress, PeerDevice, PeerList, Role, SessionState,
};
use crate::transport::{FramedChannel, PeerConnector, TransportError, frame};

/// Errors returned to session collaborators.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session is in `Connected`.
    #[error("no connected session")]
    NotConnected,

    /// Illegal lifecycle transition.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// State the session was in.
        from: SessionState,
        /// Requested state.
        to: SessionState,
    },

    /// The manager has stopped.
    #[error("session manager shut down")]
    Shutdown,

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug)]
enum Command {
    Negotiation(NegotiationEvent),
    Send {
        len: usize,
        reply: oneshot::Sender<Result<mpsc::WeakSender<Outbound>, SessionError>>,
    },
    Close,
    Status(oneshot::Sender<SessionSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle to a running [`SessionManager`].
///
/// Dropping every handle shuts the manager down.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    /// Deliver a collaborator event.
    pub fn notify(&self, event: NegotiationEvent) -> Result<(), SessionError> {
        self.command(Command::Negotiation(event))
    }

    /// Negotiation finished with `role`, the owner being reachable at `owner`.
    pub fn negotiation_ready(
        &self,
        role: Role,
        owner: IpAddr,
        group_formed: bool,
    ) -> Result<(), SessionError> {
        self.notify(NegotiationEvent::Ready {
            role,
            owner,
            group_formed,
        })
    }

    /// The link went away.
    pub fn negotiation_lost(&self) -> Result<(), SessionError> {
        self.notify(NegotiationEvent::Lost)
    }

    /// Discovery reported a new peer list.
    pub fn peers_changed(&self, peers: Vec<PeerDevice>) -> Result<(), SessionError> {
        self.notify(NegotiationEvent::PeersChanged(peers))
    }

    /// P2P was enabled or disabled.
    pub fn link_state_changed(&self, enabled: bool) -> Result<(), SessionError> {
        self.notify(NegotiationEvent::LinkStateChanged { enabled })
    }

    /// Send one message over the connected session.
    ///
    /// Resolves once the message was written to the socket. Waits while the
    /// outbound queue is full.
    pub async fn send_message(&self, message: impl Into<Message>) -> Result<(), SessionError> {
        let message = message.into();
        let (reply, queue) = oneshot::channel();
        self.command(Command::Send {
            len: message.len(),
            reply,
        })?;
        let queue = queue.await.map_err(|_| SessionError::Shutdown)??;

        // The session drops its sender when it stops being `Connected`.
        let queue = queue.upgrade().ok_or(SessionError::NotConnected)?;
        let (reply, written) = oneshot::channel();
        queue
            .send(Outbound { message, reply })
            .await
            .map_err(|_| SessionError::NotConnected)?;
        drop(queue);

        written.await.map_err(|_| SessionError::NotConnected)?
    }

    /// Close the current session gracefully.
    pub fn close(&self) -> Result<(), SessionError> {
        self.command(Command::Close)
    }

    /// Snapshot of the current session.
    pub async fn status(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, snapshot) = oneshot::channel();
        self.command(Command::Status(reply))?;
        snapshot.await.map_err(|_| SessionError::Shutdown)
    }

    /// Tear down the current session and stop the manager.
    ///
    /// Returns once the manager has stopped. Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown(reply)).is_err() {
            return Ok(());
        }
        let _ = done.await;
        Ok(())
    }

    fn command(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::Shutdown)
    }
}

/// Owns the single active session and drives its state machine.
pub struct SessionManager {
    config: SessionConfig,
    session: Option<Session>,
    peers: PeerList,
    bus: EventBus,
    commands: mpsc::UnboundedReceiver<Command>,
    reports_tx: Reports,
    reports: mpsc::UnboundedReceiver<WorkerReport>,
}

impl SessionManager {
    /// Validate `config` and start the manager on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(config: SessionConfig) -> Result<(SessionHandle, EventReceiver), SessionError> {
        config.validate()?;

        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (reports_tx, reports) = mpsc::unbounded_channel();
        let (bus, events) = event_bus();

        let manager = Self {
            config,
            session: None,
            peers: PeerList::new(),
            bus,
            commands,
            reports_tx,
            reports,
        };
        tokio::spawn(manager.run());

        Ok((
            SessionHandle {
                commands: commands_tx,
            },
            events,
        ))
    }

    async fn run(mut self) {
        debug!(listen = %self.config.listen_addr(), "session manager started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown(reply)) => {
                        self.teardown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("all session handles dropped");
                        self.teardown();
                        break;
                    }
                },
                Some(report) = self.reports.recv() => self.handle_report(report),
            }
        }

        info!("session manager stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Negotiation(event) => self.handle_negotiation(event),
            Command::Send { len, reply } => {
                let _ = reply.send(self.outbound_for(len));
            }
            Command::Close => self.close_session("close requested"),
            Command::Status(reply) => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the run loop.
            Command::Shutdown(_) => {}
        }
    }

    fn handle_negotiation(&mut self, event: NegotiationEvent) {
        match event {
            NegotiationEvent::Ready {
                group_formed: false,
                role,
                ..
            } => {
                debug!(%role, "negotiation ready without a formed group, ignoring");
            }
            NegotiationEvent::Ready { role, owner, .. } => self.on_ready(role, owner),
            NegotiationEvent::Lost => self.close_session("negotiation lost"),
            NegotiationEvent::PeersChanged(peers) => {
                if self.peers.replace(peers.clone()) {
                    debug!(count = peers.len(), "peer list updated");
                    self.bus.publish(SessionEvent::PeerListUpdated(peers));
                }
            }
            NegotiationEvent::LinkStateChanged { enabled } => {
                info!(enabled, "P2P availability changed");
                self.bus.publish(SessionEvent::LinkAvailability { enabled });
            }
        }
    }

    fn on_ready(&mut self, role: Role, owner: IpAddr) {
        if let Some(session) = &self.session {
            let active = matches!(
                session.state(),
                SessionState::Connecting | SessionState::Connected
            );
            if active && session.is_same_link(role, owner) {
                debug!(session = %session.id(), %role, %owner, "negotiation ready coalesced");
                return;
            }
        }

        self.supersede();
        self.start_session(role, owner);
    }

    /// End the current session because a different link was negotiated.
    fn supersede(&mut self) {
        let next = match self.state() {
            Some(SessionState::Connecting | SessionState::Closing) => SessionState::Closed,
            Some(SessionState::Connected) => {
                SessionState::Failed(FailureReason::NegotiationConflict)
            }
            _ => return,
        };
        self.transition(next);
    }

    fn start_session(&mut self, role: Role, owner: IpAddr) {
        let previous_listener = self
            .session
            .as_mut()
            .and_then(Session::take_listener_task);

        let mut session = Session::new(role, owner);
        let id = session.id();
        let cancel = session.cancel_token();
        let mut unreachable = None;

        match role {
            Role::Owner => {
                let task = tokio::spawn(worker::run_owner(
                    id,
                    self.config.listen_addr(),
                    previous_listener,
                    cancel,
                    self.reports_tx.clone(),
                ));
                session.set_listener_task(task);
            }
            Role::Member => {
                if let Some(previous) = previous_listener {
                    session.set_listener_task(previous);
                }
                match PeerAddress::new(owner, self.config.port) {
                    Ok(target) => {
                        session.set_remote(target);
                        tokio::spawn(worker::run_member(
                            id,
                            target,
                            PeerConnector::new(self.config.connect_timeout),
                            self.config.retry,
                            cancel,
                            self.reports_tx.clone(),
                        ));
                    }
                    Err(error) => unreachable = Some(error),
                }
            }
        }

        info!(session = %id, %role, %owner, "starting session");
        self.session = Some(session);
        self.transition(SessionState::Connecting);

        if let Some(error) = unreachable {
            warn!(session = %id, %error, "owner address is not dialable");
            self.transition(SessionState::Failed(FailureReason::Unreachable(
                error.to_string(),
            )));
        }
    }

    /// Local close or lost link: cancel a pending connect, drain a live one.
    fn close_session(&mut self, why: &'static str) {
        match self.state() {
            Some(SessionState::Connecting) => {
                debug!(reason = why, "cancelling pending connect");
                self.transition(SessionState::Closed);
            }
            Some(SessionState::Connected) => {
                debug!(reason = why, "closing session");
                self.transition(SessionState::Closing);
            }
            _ => trace!(reason = why, "no session to close"),
        }
    }

    /// Shutdown: end the session without waiting for a drain.
    fn teardown(&mut self) {
        match self.state() {
            Some(SessionState::Connecting | SessionState::Closing) => {
                self.transition(SessionState::Closed);
            }
            Some(SessionState::Connected) => {
                self.transition(SessionState::Closing);
                self.transition(SessionState::Closed);
            }
            _ => {}
        }
    }

    fn handle_report(&mut self, report: WorkerReport) {
        let id = report.session();
        if self.session.as_ref().map(Session::id) != Some(id) {
            trace!(session = %id, "discarding report from superseded session");
            return;
        }

        match report {
            WorkerReport::Listening { session, addr } => {
                if let Some(current) = self.session.as_mut() {
                    current.set_local(addr);
                }
                info!(session = %session, %addr, "owner listening");
                self.bus.publish(SessionEvent::Listening { session, addr });
            }
            WorkerReport::Retrying {
                session,
                attempt,
                delay,
            } => {
                if self.state() == Some(&SessionState::Connecting) {
                    self.bus.publish(SessionEvent::Retrying {
                        session,
                        attempt,
                        delay,
                    });
                }
            }
            WorkerReport::Established {
                session,
                stream,
                remote,
            } => self.on_established(session, stream, remote),
            WorkerReport::LinkFailed { reason, .. } => {
                if self.state() == Some(&SessionState::Connecting) {
                    self.transition(SessionState::Failed(reason));
                }
            }
            WorkerReport::Inbound {
                session,
                message,
                permit,
            } => {
                if self.state().is_some_and(SessionState::has_channel) {
                    trace!(session = %session, len = message.len(), "message received");
                    self.bus.publish_held(
                        SessionEvent::MessageReceived {
                            session,
                            payload: message.into_bytes(),
                        },
                        permit,
                    );
                }
            }
            WorkerReport::PeerClosed { .. } => {
                if self.state() == Some(&SessionState::Connected) {
                    self.transition(SessionState::Closing);
                }
            }
            WorkerReport::ChannelFailed { reason, .. } => match self.state() {
                Some(SessionState::Connected) => {
                    self.transition(SessionState::Failed(reason));
                }
                Some(SessionState::Closing) => {
                    debug!(%reason, "channel failed while draining");
                    self.transition(SessionState::Closed);
                }
                _ => {}
            },
            WorkerReport::Drained { .. } => {
                if self.state() == Some(&SessionState::Closing) {
                    self.transition(SessionState::Closed);
                }
            }
            WorkerReport::DrainTimeout { session } => {
                if self.state() == Some(&SessionState::Closing) {
                    let timeout = self.config.drain_timeout;
                    warn!(session = %session, ?timeout, "drain timed out");
                    self.transition(SessionState::Closed);
                }
            }
        }
    }

    fn on_established(&mut self, id: SessionId, stream: TcpStream, remote: SocketAddr) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if *session.state() != SessionState::Connecting {
            debug!(session = %id, peer = %remote, "dropping late connection");
            return;
        }

        let channel = FramedChannel::from_tcp(stream, self.config.max_frame_size);
        let (reader, writer) = match channel.into_split() {
            Ok(halves) => halves,
            Err(error) => {
                let reason = error.failure_reason();
                self.transition(SessionState::Failed(reason));
                return;
            }
        };

        let (queue_tx, queue_rx) = mpsc::channel(self.config.outbound_queue);
        if let Err(error) = session.connect(queue_tx, PeerAddress::try_from(remote).ok()) {
            warn!(session = %id, %error, "cannot enter connected");
            return;
        }

        tokio::spawn(worker::run_writer(
            id,
            writer,
            queue_rx,
            session.cancel_token(),
            self.reports_tx.clone(),
        ));
        tokio::spawn(worker::run_reader(
            id,
            reader,
            Arc::new(Semaphore::new(self.config.inbound_queue)),
            session.reader_token(),
            self.reports_tx.clone(),
        ));

        info!(session = %id, peer = %remote, "session connected");
        self.bus.publish(SessionEvent::StateChanged {
            session: id,
            state: SessionState::Connected,
        });
    }

    /// Apply `next` to the current session and announce it.
    fn transition(&mut self, next: SessionState) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let id = session.id();
        let from = session.state().clone();

        if let Err(error) = session.transition(next.clone()) {
            warn!(session = %id, %error, "transition rejected");
            return;
        }

        match &next {
            SessionState::Failed(reason) => {
                warn!(session = %id, %from, %reason, "session failed");
            }
            _ => info!(session = %id, %from, to = %next, "session state changed"),
        }

        if next == SessionState::Closing {
            tokio::spawn(worker::run_drain_timer(
                id,
                self.config.drain_timeout,
                session.cancel_token(),
                self.reports_tx.clone(),
            ));
        }

        self.bus.publish(SessionEvent::StateChanged {
            session: id,
            state: next,
        });
    }

    fn state(&self) -> Option<&SessionState> {
        self.session.as_ref().map(Session::state)
    }

    fn outbound_for(&self, len: usize) -> Result<mpsc::WeakSender<Outbound>, SessionError> {
        let queue = self
            .session
            .as_ref()
            .and_then(Session::outbound)
            .ok_or(SessionError::NotConnected)?;
        frame::encode_header(len, self.config.max_frame_size).map_err(TransportError::from)?;
        Ok(queue.downgrade())
    }

    fn snapshot(&self) -> SessionSnapshot {
        self.session
            .as_ref()
            .map(Session::snapshot)
            .unwrap_or_default()
    }
}
