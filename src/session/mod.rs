//! Session layer
//!
//! Drives one logical session over the negotiated P2P link:
//!
//! - **Manager**: [`SessionManager`] actor and its cloneable [`SessionHandle`]
//! - **Lifecycle**: `Idle → Connecting → Connected → Closing → Closed`, with
//!   `Failed` reachable from `Connecting` and `Connected`
//! - **Events**: [`NegotiationEvent`] in, [`SessionEvent`] out over the
//!   [`EventReceiver`]
//! - **Config**: [`SessionConfig`] built in code or read from `P2P_*`
//!   environment variables
//!
//! # Example
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use p2p_session::prelude::*;
//!
//! # async fn run() -> Result<(), SessionError> {
//! let (handle, mut events) = SessionManager::spawn(SessionConfig::default())?;
//! handle.negotiation_ready(Role::Owner, IpAddr::V4(Ipv4Addr::new(192, 168, 49, 1)), true)?;
//!
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::MessageReceived { payload, .. } = event {
//!         println!("received {} bytes", payload.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod events;
mod manager;
#[allow(clippy::module_inception)]
mod session;
mod worker;

pub use config::{SessionConfig, SessionConfigBuilder, env};
pub use events::{EventBus, EventReceiver, NegotiationEvent, SessionEvent, event_bus};
pub use manager::{SessionError, SessionHandle, SessionManager};
pub use session::{SessionId, SessionSnapshot};
