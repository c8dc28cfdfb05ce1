//! Worker tasks, one per blocking operation.
//!
//! Workers never touch session state. They report into the manager over an
//! unbounded channel, tagged with the session they were started for, and
//! stop as soon as that session's cancellation token fires.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::manager::SessionError;
use super::session::SessionId;
use crate::core::{FailureReason, Message, PeerAddress, RetryPolicy};
use crate::transport::{EndpointListener, FrameReader, FrameWriter, PeerConnector, TransportError};

/// A queued outbound message and the caller waiting for its result.
#[derive(Debug)]
pub struct Outbound {
    pub(crate) message: Message,
    pub(crate) reply: oneshot::Sender<Result<(), SessionError>>,
}

/// What workers tell the manager.
#[derive(Debug)]
pub(crate) enum WorkerReport {
    Listening {
        session: SessionId,
        addr: SocketAddr,
    },
    Retrying {
        session: SessionId,
        attempt: u32,
        delay: Duration,
    },
    Established {
        session: SessionId,
        stream: TcpStream,
        remote: SocketAddr,
    },
    LinkFailed {
        session: SessionId,
        reason: FailureReason,
    },
    Inbound {
        session: SessionId,
        message: Message,
        /// Inbound-window slot, released once the consumer takes the event.
        permit: OwnedSemaphorePermit,
    },
    PeerClosed {
        session: SessionId,
    },
    ChannelFailed {
        session: SessionId,
        reason: FailureReason,
    },
    Drained {
        session: SessionId,
    },
    DrainTimeout {
        session: SessionId,
    },
}

impl WorkerReport {
    pub(crate) fn session(&self) -> SessionId {
        match self {
            WorkerReport::Listening { session, .. }
            | WorkerReport::Retrying { session, .. }
            | WorkerReport::Established { session, .. }
            | WorkerReport::LinkFailed { session, .. }
            | WorkerReport::Inbound { session, .. }
            | WorkerReport::PeerClosed { session }
            | WorkerReport::ChannelFailed { session, .. }
            | WorkerReport::Drained { session }
            | WorkerReport::DrainTimeout { session } => *session,
        }
    }
}

pub(crate) type Reports = mpsc::UnboundedSender<WorkerReport>;

fn report(reports: &Reports, report: WorkerReport) {
    // The manager outlives its workers unless it is shutting down.
    let _ = reports.send(report);
}

/// Owner: bind, accept one connection, then reject every further one until
/// the session is cancelled.
///
/// `previous` is the listener task of the session this one replaced; it is
/// awaited first so the port is free before binding again.
pub(crate) async fn run_owner(
    session: SessionId,
    addr: SocketAddr,
    previous: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    reports: Reports,
) {
    if let Some(previous) = previous {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = previous => {}
        }
    }

    let mut listener = EndpointListener::new();
    let local = match listener.start(addr).await {
        Ok(local) => local,
        Err(error) => {
            warn!(session = %session, %error, "owner failed to listen");
            report(
                &reports,
                WorkerReport::LinkFailed {
                    session,
                    reason: error.failure_reason(),
                },
            );
            return;
        }
    };
    report(&reports, WorkerReport::Listening { session, addr: local });

    match listener.accept_once(&cancel).await {
        Ok((stream, remote)) => {
            report(
                &reports,
                WorkerReport::Established {
                    session,
                    stream,
                    remote,
                },
            );
        }
        Err(TransportError::Cancelled) => {
            listener.stop();
            return;
        }
        Err(error) => {
            warn!(session = %session, %error, "owner failed to accept");
            report(
                &reports,
                WorkerReport::LinkFailed {
                    session,
                    reason: error.failure_reason(),
                },
            );
            listener.stop();
            return;
        }
    }

    let rejected = listener.reject_until(&cancel).await;
    listener.stop();
    debug!(session = %session, rejected, "owner listener released");
}

/// Member: dial the owner, retrying per `policy` until connected, out of
/// attempts, or cancelled.
pub(crate) async fn run_member<P: RetryPolicy>(
    session: SessionId,
    target: PeerAddress,
    connector: PeerConnector,
    policy: P,
    cancel: CancellationToken,
    reports: Reports,
) {
    debug!(
        session = %session,
        peer = %target,
        max_attempts = policy.max_attempts(),
        "dialing owner"
    );
    let mut attempt = 1;
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(session = %session, attempt, "connect cancelled");
                return;
            }
            result = connector.connect(target) => result,
        };

        let error = match result {
            Ok(stream) => {
                info!(session = %session, peer = %target, attempt, "connected to owner");
                report(
                    &reports,
                    WorkerReport::Established {
                        session,
                        stream,
                        remote: target.socket_addr(),
                    },
                );
                return;
            }
            Err(error) => error,
        };

        let delay = if error.is_retryable() {
            policy.next_delay(attempt)
        } else {
            None
        };
        let Some(delay) = delay else {
            warn!(session = %session, peer = %target, attempt, %error, "giving up on owner");
            report(
                &reports,
                WorkerReport::LinkFailed {
                    session,
                    reason: error.failure_reason(),
                },
            );
            return;
        };

        attempt += 1;
        debug!(session = %session, %error, attempt, ?delay, "retrying connect");
        report(
            &reports,
            WorkerReport::Retrying {
                session,
                attempt,
                delay,
            },
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(session = %session, attempt, "connect cancelled during backoff");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Reader: forward every inbound message until the peer closes, an error
/// occurs, or the reader is cancelled.
///
/// A frame is only read once a slot in `window` is free. Slots are held
/// until the event consumer takes the message, so a consumer that stops
/// reading stops this loop and TCP flow control pushes back on the peer.
pub(crate) async fn run_reader(
    session: SessionId,
    mut reader: FrameReader<ReadHalf<TcpStream>>,
    window: Arc<Semaphore>,
    cancel: CancellationToken,
    reports: Reports,
) {
    loop {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            permit = window.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                // Closed window: the session is gone.
                Err(_) => return,
            },
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = reader.receive() => result,
        };

        match result {
            Ok(message) => report(
                &reports,
                WorkerReport::Inbound {
                    session,
                    message,
                    permit,
                },
            ),
            Err(TransportError::ConnectionClosed) => {
                debug!(session = %session, "peer closed the channel");
                report(&reports, WorkerReport::PeerClosed { session });
                return;
            }
            Err(error) => {
                warn!(session = %session, %error, "channel read failed");
                report(
                    &reports,
                    WorkerReport::ChannelFailed {
                        session,
                        reason: error.failure_reason(),
                    },
                );
                return;
            }
        }
    }
}

/// Writer: write queued messages in order. When the queue closes (session
/// left `Connected`) whatever is still queued is flushed, the write side is
/// shut down and `Drained` is reported.
pub(crate) async fn run_writer(
    session: SessionId,
    mut writer: FrameWriter<WriteHalf<TcpStream>>,
    mut queue: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
    reports: Reports,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = queue.recv() => next,
        };
        let Some(Outbound { message, reply }) = next else {
            break;
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = reply.send(Err(SessionError::NotConnected));
                return;
            }
            result = writer.send(&message) => result,
        };

        match result {
            Ok(()) => {
                let _ = reply.send(Ok(()));
            }
            Err(error) => {
                warn!(session = %session, %error, "channel write failed");
                let reason = error.failure_reason();
                let _ = reply.send(Err(SessionError::Transport(error)));
                report(&reports, WorkerReport::ChannelFailed { session, reason });
                return;
            }
        }
    }

    let shutdown = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = writer.shutdown() => result,
    };
    if let Err(error) = shutdown {
        debug!(session = %session, %error, "write shutdown failed");
    }
    report(&reports, WorkerReport::Drained { session });
}

/// Report `DrainTimeout` unless the session ends first.
pub(crate) async fn run_drain_timer(
    session: SessionId,
    timeout: Duration,
    cancel: CancellationToken,
    reports: Reports,
) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(timeout) => {
            report(&reports, WorkerReport::DrainTimeout { session });
        }
    }
}
