//! Bridge types produced by discovery

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::description::BridgeDescription;
use crate::host::HostAddr;

/// How a bridge candidate was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// SSDP M-SEARCH reply on the local network
    Multicast,
    /// Vendor cloud registry lookup
    Registry,
    /// TCP sweep of the local subnet
    SubnetScan,
    /// Address supplied by the user
    Manual,
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Multicast => "multicast",
            Self::Registry => "registry",
            Self::SubnetScan => "subnet-scan",
            Self::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Whether discovery stops at the first confirmed bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryMode {
    /// Return as soon as one bridge is confirmed
    #[default]
    FirstMatch,
    /// Wait for every source to finish (or go quiet) and return all bridges
    Exhaustive,
}

/// Address suspected of hosting a bridge, not yet confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub addr: HostAddr,
    pub method: DiscoveryMethod,
}

impl Candidate {
    pub fn new(addr: impl Into<HostAddr>, method: DiscoveryMethod) -> Self {
        Self {
            addr: addr.into(),
            method,
        }
    }
}

/// A confirmed bridge
///
/// Immutable once built; the username stays empty until the caller pairs
/// with the bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bridge {
    address: HostAddr,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    method: DiscoveryMethod,
    discovered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<BridgeDescription>,
}

impl Bridge {
    /// Create a bridge record for a confirmed candidate
    pub fn confirmed(candidate: Candidate, description: Option<BridgeDescription>) -> Self {
        Self {
            address: candidate.addr,
            username: None,
            method: candidate.method,
            discovered_at: Utc::now(),
            description,
        }
    }

    /// Create a bridge for an address and username already known to the caller
    pub fn known(address: HostAddr, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            address,
            username: (!username.is_empty()).then_some(username),
            method: DiscoveryMethod::Manual,
            discovered_at: Utc::now(),
            description: None,
        }
    }

    pub fn address(&self) -> HostAddr {
        self.address
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn method(&self) -> DiscoveryMethod {
        self.method
    }

    pub fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }

    pub fn description(&self) -> Option<&BridgeDescription> {
        self.description.as_ref()
    }
}

impl std::fmt::Display for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.description.as_ref().and_then(|d| d.friendly_name.as_deref()) {
            Some(name) => write!(f, "{} ({})", self.address, name),
            None => write!(f, "{}", self.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> HostAddr {
        HostAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)))
    }

    #[test]
    fn test_confirmed_bridge_has_no_username() {
        let bridge = Bridge::confirmed(Candidate::new(addr(), DiscoveryMethod::Multicast), None);
        assert_eq!(bridge.address(), addr());
        assert_eq!(bridge.username(), None);
        assert_eq!(bridge.method(), DiscoveryMethod::Multicast);
    }

    #[test]
    fn test_known_bridge_empty_username() {
        assert_eq!(Bridge::known(addr(), "").username(), None);
        assert_eq!(Bridge::known(addr(), "abc").username(), Some("abc"));
    }

    #[test]
    fn test_serialize_address_only() {
        let bridge = Bridge::confirmed(Candidate::new(addr(), DiscoveryMethod::Registry), None);
        let json = serde_json::to_value(&bridge).unwrap();
        assert_eq!(json["address"]["ip"], "10.0.0.5");
        assert!(json["address"].get("port").is_none());
        assert_eq!(json["method"], "registry");
        assert!(json.get("username").is_none());
    }
}
