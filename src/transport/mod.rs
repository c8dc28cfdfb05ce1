//! Transport layer
//!
//! Everything that touches a socket:
//!
//! - **Framing**: [`FramedChannel`], [`FrameReader`], [`FrameWriter`] and the
//!   length-prefixed wire format in [`frame`]
//! - **Owner side**: [`EndpointListener`] accepting exactly one connection
//! - **Member side**: [`PeerConnector`] dialing with a mandatory timeout
//! - **Backoff**: [`ExponentialBackoff`] for the member's reconnect loop
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │      Session layer (state machine)      │
//! ├─────────────────────────────────────────┤
//! │           Transport layer               │  ← This module
//! │  listener, connector, framed channel    │
//! ├─────────────────────────────────────────┤
//! │   TCP over the negotiated P2P link      │
//! └─────────────────────────────────────────┘
//! ```

mod channel;
mod connector;
mod error;
pub mod frame;
mod listener;
mod timing;

pub use channel::FramedChannel;
pub use connector::PeerConnector;
pub use error::{TransportError, TransportResult};
pub use frame::{FrameReader, FrameWriter};
pub use listener::EndpointListener;
pub use timing::ExponentialBackoff;
