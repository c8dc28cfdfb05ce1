//! Session configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::core::ConfigError;
use crate::core::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_DRAIN_TIMEOUT, DEFAULT_INBOUND_QUEUE, DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_OUTBOUND_QUEUE, DEFAULT_PORT, MAX_FRAME_SIZE_LIMIT,
};
use crate::transport::ExponentialBackoff;

/// Environment keys read by [`SessionConfig::from_env`].
pub mod env {
    /// Owner bind host.
    pub const LISTEN_HOST: &str = "P2P_LISTEN_HOST";
    /// Owner listen port / member dial port.
    pub const PORT: &str = "P2P_PORT";
    /// Frame limit in bytes.
    pub const MAX_FRAME_SIZE: &str = "P2P_MAX_FRAME_SIZE";
    /// Per-attempt connect timeout in milliseconds.
    pub const CONNECT_TIMEOUT_MS: &str = "P2P_CONNECT_TIMEOUT_MS";
    /// Retries after the first connect attempt.
    pub const CONNECT_RETRIES: &str = "P2P_CONNECT_RETRIES";
    /// First backoff pause in milliseconds.
    pub const INITIAL_BACKOFF_MS: &str = "P2P_INITIAL_BACKOFF_MS";
    /// Drain timeout in milliseconds.
    pub const DRAIN_TIMEOUT_MS: &str = "P2P_DRAIN_TIMEOUT_MS";
    /// Inbound window in messages.
    pub const INBOUND_QUEUE: &str = "P2P_INBOUND_QUEUE";
}

/// Session manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Host the owner binds to.
    pub listen_host: IpAddr,

    /// Port the owner listens on and the member dials.
    ///
    /// `0` lets the owner pick an ephemeral port (reported through
    /// `SessionEvent::Listening`); a member cannot dial port 0.
    pub port: u16,

    /// Largest accepted message.
    pub max_frame_size: usize,

    /// Timeout for a single connect attempt.
    pub connect_timeout: Duration,

    /// Member reconnect policy.
    pub retry: ExponentialBackoff,

    /// How long a closing session may spend flushing queued messages.
    pub drain_timeout: Duration,

    /// Depth of the outbound message queue.
    pub outbound_queue: usize,

    /// Received messages that may wait for the event consumer before the
    /// reader stops reading from the socket.
    pub inbound_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            listen_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry: ExponentialBackoff::default(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            inbound_queue: DEFAULT_INBOUND_QUEUE,
        }
    }
}

impl SessionConfig {
    /// Start a builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// Owner bind address.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_host, self.port)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_size == 0 || self.max_frame_size > MAX_FRAME_SIZE_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_frame_size must be in 1..={MAX_FRAME_SIZE_LIMIT}, got {}",
                self.max_frame_size
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid("connect_timeout must be non-zero".into()));
        }
        if self.outbound_queue == 0 {
            return Err(ConfigError::Invalid("outbound_queue must be non-zero".into()));
        }
        if self.inbound_queue == 0 {
            return Err(ConfigError::Invalid("inbound_queue must be non-zero".into()));
        }
        Ok(())
    }

    /// Defaults overridden by `P2P_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `P2P_*` keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = parse::<IpAddr>(&lookup, env::LISTEN_HOST)? {
            config.listen_host = host;
        }
        if let Some(port) = parse::<u16>(&lookup, env::PORT)? {
            config.port = port;
        }
        if let Some(size) = parse::<usize>(&lookup, env::MAX_FRAME_SIZE)? {
            config.max_frame_size = size;
        }
        if let Some(ms) = parse::<u64>(&lookup, env::CONNECT_TIMEOUT_MS)? {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = parse::<u32>(&lookup, env::CONNECT_RETRIES)? {
            config.retry.max_retries = retries;
        }
        if let Some(ms) = parse::<u64>(&lookup, env::INITIAL_BACKOFF_MS)? {
            config.retry.initial = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, env::DRAIN_TIMEOUT_MS)? {
            config.drain_timeout = Duration::from_millis(ms);
        }
        if let Some(depth) = parse::<usize>(&lookup, env::INBOUND_QUEUE)? {
            config.inbound_queue = depth;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a builder with default values.
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }

    /// Set the owner bind host.
    pub fn listen_host(mut self, host: IpAddr) -> Self {
        self.config.listen_host = host;
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the frame limit.
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the per-attempt connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the reconnect policy.
    pub fn retry(mut self, retry: ExponentialBackoff) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the drain timeout.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.config.drain_timeout = timeout;
        self
    }

    /// Set the outbound queue depth.
    pub fn outbound_queue(mut self, depth: usize) -> Self {
        self.config.outbound_queue = depth;
        self
    }

    /// Set the inbound window.
    pub fn inbound_queue(mut self, depth: usize) -> Self {
        self.config.inbound_queue = depth;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.port, 20112);
        assert_eq!(config.max_frame_size, 1_048_576);
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:20112");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::builder()
            .port(0)
            .max_frame_size(4096)
            .connect_timeout(Duration::from_millis(250))
            .drain_timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        assert_eq!(config.port, 0);
        assert_eq!(config.max_frame_size, 4096);
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_builder_rejects_invalid() {
        assert!(SessionConfig::builder().max_frame_size(0).build().is_err());
        assert!(
            SessionConfig::builder()
                .connect_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(SessionConfig::builder().outbound_queue(0).build().is_err());
        assert!(SessionConfig::builder().inbound_queue(0).build().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = SessionConfig::from_lookup(lookup(&[
            (env::PORT, "30000"),
            (env::LISTEN_HOST, "192.168.49.1"),
            (env::CONNECT_RETRIES, "5"),
            (env::INITIAL_BACKOFF_MS, "50"),
            (env::INBOUND_QUEUE, "8"),
        ]))
        .unwrap();

        assert_eq!(config.port, 30000);
        assert_eq!(config.listen_host.to_string(), "192.168.49.1");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial, Duration::from_millis(50));
        assert_eq!(config.inbound_queue, 8);
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
    }

    #[test]
    fn test_from_lookup_invalid_value() {
        let err = SessionConfig::from_lookup(lookup(&[(env::PORT, "not-a-port")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: env::PORT.to_string(),
                value: "not-a-port".to_string(),
            }
        );
    }
}
