//! Protocol constants and defaults.
//!
//! Wire-format sizes are fixed and MUST NOT be changed; everything under
//! DEFAULTS can be overridden through `SessionConfig`.

use std::time::Duration;

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// Length prefix size (uint32, big-endian).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default maximum payload size of a single frame (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1 << 20;

/// Hard upper bound for a configured frame limit (what a u32 prefix can carry).
pub const MAX_FRAME_SIZE_LIMIT: usize = u32::MAX as usize;

// =============================================================================
// DEFAULTS - LISTENER
// =============================================================================

/// Port the Owner listens on.
pub const DEFAULT_PORT: u16 = 20112;

// =============================================================================
// DEFAULTS - CONNECTOR
// =============================================================================

/// Timeout for a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// Backoff multiplier between retries.
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Upper bound for a single backoff delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Retries after the first connect attempt (200ms, 400ms, 800ms).
pub const DEFAULT_CONNECT_RETRIES: u32 = 3;

// =============================================================================
// DEFAULTS - SESSION
// =============================================================================

/// Time allowed for queued outbound messages to flush when closing.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Depth of the per-session outbound queue.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 64;

/// Inbound messages published but not yet taken by the event consumer.
pub const DEFAULT_INBOUND_QUEUE: usize = 64;

/// Session ID size (48-bit).
pub const SESSION_ID_SIZE: usize = 6;

// =============================================================================
// DEVICE STATUS CODES (as reported by the platform's P2P stack)
// =============================================================================

/// Device is connected to us.
pub const DEVICE_STATUS_CONNECTED: i32 = 0;

/// An invitation to the device is pending.
pub const DEVICE_STATUS_INVITED: i32 = 1;

/// The last connection attempt to the device failed.
pub const DEVICE_STATUS_FAILED: i32 = 2;

/// Device is discoverable and free to connect.
pub const DEVICE_STATUS_AVAILABLE: i32 = 3;

/// Device is out of range or busy.
pub const DEVICE_STATUS_UNAVAILABLE: i32 = 4;
