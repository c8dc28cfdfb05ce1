//! # p2p-session
//!
//! Session transport for an already-negotiated point-to-point link.
//!
//! Discovery and group negotiation happen elsewhere. Once they finish, the
//! negotiation collaborator tells this crate which role the device plays and
//! where the owner lives. From there the crate:
//!
//! - **Owner**: listens, accepts exactly one peer, rejects every other
//! - **Member**: dials the owner with a timeout and bounded exponential backoff
//! - **Channel**: exchanges length-prefixed messages (4-byte big-endian length)
//! - **Lifecycle**: runs an explicit state machine, announced on an event bus
//!
//! ## Feature Flags
//!
//! - `transport` (default): framing, listener, connector, backoff
//! - `session` (default): session manager, events, configuration
//!
//! ## Modules
//!
//! - [`core`]: Core types, traits, constants, and error types (always included)
//! - [`transport`]: Transport layer (requires `transport` feature)
//! - [`session`]: Session layer (requires `session` feature)
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use p2p_session::prelude::*;
//!
//! # async fn run() -> Result<(), SessionError> {
//! let config = SessionConfig::builder().port(20112).build()?;
//! let (handle, mut events) = SessionManager::spawn(config)?;
//!
//! // The negotiation collaborator reports the outcome.
//! let owner = IpAddr::V4(Ipv4Addr::new(192, 168, 49, 1));
//! handle.negotiation_ready(Role::Member, owner, true)?;
//!
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::StateChanged { state: SessionState::Connected, .. } = event {
//!         handle.send_message("hello").await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Session layer (feature-gated)
#[cfg(feature = "session")]
#[cfg_attr(docsrs, doc(cfg(feature = "session")))]
pub mod session;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use crate::core::*;

    // Transport types (when enabled)
    #[cfg(feature = "transport")]
    pub use crate::transport::{
        EndpointListener, ExponentialBackoff, FrameReader, FrameWriter, FramedChannel,
        PeerConnector, TransportError, TransportResult,
    };

    // Session types (when enabled)
    #[cfg(feature = "session")]
    pub use crate::session::{
        EventReceiver, NegotiationEvent, SessionConfig, SessionConfigBuilder, SessionError,
        SessionEvent, SessionHandle, SessionId, SessionManager, SessionSnapshot,
    };
}

// Re-export commonly used items at crate root
pub use crate::core::{FailureReason, Message, PeerAddress, Role, SessionState};

#[cfg(feature = "session")]
pub use crate::session::{SessionConfig, SessionError, SessionEvent, SessionHandle, SessionManager};
