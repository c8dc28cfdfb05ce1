//! Core types, traits, constants and errors (always included).

pub mod constants;
mod error;
mod peer;
mod state;
mod traits;
mod types;

pub use error::{AddressError, ConfigError, FailureReason, FrameError};
pub use peer::{DeviceStatus, PeerDevice, PeerList};
pub use state::SessionState;
pub use traits::{NoRetry, RetryPolicy};
pub use types::{Message, PeerAddress, Role};
