//! Basic value types: addresses, roles and messages.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use super::error::AddressError;

/// Address of the far side of a link.
///
/// Immutable once constructed; the port is always in `1..=65535`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    host: IpAddr,
    port: u16,
}

impl PeerAddress {
    /// Create a peer address, rejecting port 0.
    pub fn new(host: IpAddr, port: u16) -> Result<Self, AddressError> {
        if port == 0 {
            return Err(AddressError::InvalidPort(port));
        }
        Ok(Self { host, port })
    }

    /// Host part.
    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// Port part.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// As a socket address.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl TryFrom<SocketAddr> for PeerAddress {
    type Error = AddressError;

    fn try_from(addr: SocketAddr) -> Result<Self, Self::Error> {
        Self::new(addr.ip(), addr.port())
    }
}

impl From<PeerAddress> for SocketAddr {
    fn from(addr: PeerAddress) -> SocketAddr {
        addr.socket_addr()
    }
}

impl FromStr for PeerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr: SocketAddr = s
            .parse()
            .map_err(|_| AddressError::InvalidAddress(s.to_string()))?;
        Self::try_from(addr)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// Which side of the link we are.
///
/// Decided by the external negotiation and fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Accepts the inbound connection (the P2P group owner).
    Owner,
    /// Dials the owner.
    Member,
}

impl Role {
    /// Whether this side listens.
    pub fn is_owner(self) -> bool {
        matches!(self, Role::Owner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => f.write_str("owner"),
            Role::Member => f.write_str("member"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" | "group_owner" | "go" => Ok(Role::Owner),
            "member" | "client" => Ok(Role::Member),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// An opaque message; one frame on the wire.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Message(Vec<u8>);

impl Message {
    /// Wrap raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Take the payload.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Payload length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty (empty messages cannot be framed).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("len", &self.0.len())
            .field("head", &hex_preview(&self.0))
            .finish()
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Message {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self(text.into_bytes())
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn hex_preview(bytes: &[u8]) -> String {
    if bytes.len() <= 8 {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    } else {
        format!(
            "{}...",
            bytes[..8].iter().map(|b| format!("{:02x}", b)).collect::<String>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_peer_address_rejects_port_zero() {
        let host = IpAddr::V4(Ipv4Addr::new(192, 168, 49, 1));
        assert_eq!(
            PeerAddress::new(host, 0),
            Err(AddressError::InvalidPort(0))
        );

        let addr = PeerAddress::new(host, 20112).unwrap();
        assert_eq!(addr.to_string(), "192.168.49.1:20112");
    }

    #[test]
    fn test_peer_address_parse() {
        let addr: PeerAddress = "10.0.0.2:8080".parse().unwrap();
        assert_eq!(addr.port(), 8080);
        assert!("10.0.0.2".parse::<PeerAddress>().is_err());
        assert!("10.0.0.2:0".parse::<PeerAddress>().is_err());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Owner".parse::<Role>().unwrap(), Role::Owner);
        assert_eq!("client".parse::<Role>().unwrap(), Role::Member);
        assert!("observer".parse::<Role>().is_err());
    }

    #[test]
    fn test_message_debug_preview() {
        let msg = Message::from("hello world, long");
        let debug = format!("{:?}", msg);
        assert!(debug.contains("len: 17"));
        assert!(debug.contains("68656c6c6f20776f..."));
    }
}
