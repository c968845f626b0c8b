//! Host addresses observed during discovery

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid host address: {0}")]
pub struct HostAddrError(pub String);

/// Network address of a (possible) bridge
///
/// The port is only carried when a source reported one explicitly; `None`
/// means the protocol default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAddr {
    pub ip: IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl HostAddr {
    pub fn new(ip: IpAddr) -> Self {
        Self { ip, port: None }
    }

    pub fn with_port(ip: IpAddr, port: u16) -> Self {
        Self {
            ip,
            port: Some(port),
        }
    }

    /// Host part suitable for a URL (IPv6 is bracketed)
    fn host(&self) -> String {
        match self.ip {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => format!("[{}]", v6),
        }
    }

    /// URL authority, e.g. `10.0.0.5` or `10.0.0.5:8080`
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host(), port),
            None => self.host(),
        }
    }
}

impl From<IpAddr> for HostAddr {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip)
    }
}

impl From<SocketAddr> for HostAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::with_port(addr.ip(), addr.port())
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.authority())
    }
}

impl FromStr for HostAddr {
    type Err = HostAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::new(ip));
        }
        // Bracketed IPv6 without a port
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            if let Ok(ip) = inner.parse::<IpAddr>() {
                return Ok(Self::new(ip));
            }
        }
        s.parse::<SocketAddr>()
            .map(Self::from)
            .map_err(|_| HostAddrError(s.to_string()))
    }
}
