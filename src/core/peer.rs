//! Discovered devices, as reported by the discovery collaborator.

use std::fmt;

use super::constants::{
    DEVICE_STATUS_AVAILABLE, DEVICE_STATUS_CONNECTED, DEVICE_STATUS_FAILED, DEVICE_STATUS_INVITED,
    DEVICE_STATUS_UNAVAILABLE,
};

/// Device status as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    /// Connected to us.
    Connected,
    /// Invitation pending.
    Invited,
    /// Last attempt failed.
    Failed,
    /// Free to connect.
    Available,
    /// Out of range or busy.
    Unavailable,
}

impl DeviceStatus {
    /// Parse a platform status code. Unknown codes map to `Unavailable`.
    pub fn from_code(code: i32) -> Self {
        match code {
            DEVICE_STATUS_CONNECTED => Self::Connected,
            DEVICE_STATUS_INVITED => Self::Invited,
            DEVICE_STATUS_FAILED => Self::Failed,
            DEVICE_STATUS_AVAILABLE => Self::Available,
            DEVICE_STATUS_UNAVAILABLE => Self::Unavailable,
            _ => Self::Unavailable,
        }
    }

    /// Platform status code.
    pub fn code(self) -> i32 {
        match self {
            Self::Connected => DEVICE_STATUS_CONNECTED,
            Self::Invited => DEVICE_STATUS_INVITED,
            Self::Failed => DEVICE_STATUS_FAILED,
            Self::Available => DEVICE_STATUS_AVAILABLE,
            Self::Unavailable => DEVICE_STATUS_UNAVAILABLE,
        }
    }
}

/// A nearby device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerDevice {
    /// Human-readable device name.
    pub name: String,
    /// Link-layer (MAC) address, used by the collaborator to connect.
    pub device_address: String,
    /// Current status.
    pub status: DeviceStatus,
}

impl PeerDevice {
    /// Create a device entry.
    pub fn new(
        name: impl Into<String>,
        device_address: impl Into<String>,
        status: DeviceStatus,
    ) -> Self {
        Self {
            name: name.into(),
            device_address: device_address.into(),
            status,
        }
    }
}

impl fmt::Display for PeerDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {:?})", self.name, self.device_address, self.status)
    }
}

/// Last known peer list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerList {
    peers: Vec<PeerDevice>,
}

impl PeerList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list. Returns `false` when nothing changed.
    pub fn replace(&mut self, peers: Vec<PeerDevice>) -> bool {
        if self.peers == peers {
            return false;
        }
        self.peers = peers;
        true
    }

    /// Current devices.
    pub fn peers(&self) -> &[PeerDevice] {
        &self.peers
    }

    /// Look up a device by its link-layer address.
    pub fn find(&self, device_address: &str) -> Option<&PeerDevice> {
        self.peers.iter().find(|p| p.device_address == device_address)
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no devices are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, addr: &str) -> PeerDevice {
        PeerDevice::new(name, addr, DeviceStatus::Available)
    }

    #[test]
    fn test_status_codes() {
        for code in 0..5 {
            assert_eq!(DeviceStatus::from_code(code).code(), code);
        }
        assert_eq!(DeviceStatus::from_code(42), DeviceStatus::Unavailable);
    }

    #[test]
    fn test_replace_detects_changes() {
        let mut list = PeerList::new();
        assert!(!list.replace(Vec::new()));

        let peers = vec![device("pixel", "aa:bb:cc:00:11:22")];
        assert!(list.replace(peers.clone()));
        assert!(!list.replace(peers));
        assert_eq!(list.len(), 1);

        let mut changed = vec![device("pixel", "aa:bb:cc:00:11:22")];
        changed[0].status = DeviceStatus::Invited;
        assert!(list.replace(changed));
        assert_eq!(
            list.find("aa:bb:cc:00:11:22").map(|p| p.status),
            Some(DeviceStatus::Invited)
        );
    }
}
