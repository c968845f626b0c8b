//! Cloud registry lookup of bridges known to be on the caller's network

use bridgescout_core::{Candidate, DiscoveryMethod, HostAddr};
use serde::Deserialize;
use std::net::IpAddr;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::DiscoveryError;

/// Vendor directory endpoint
pub const REGISTRY_URL: &str = "https://discovery.meethue.com/";

/// One entry of the registry manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryEntry {
    /// Bridge ID (e.g., "001788fffe09a206")
    pub id: String,
    /// Address of the bridge on the local network
    #[serde(rename = "internalipaddress")]
    pub internal_ip: IpAddr,
    /// Advertised port; 443 is the HTTPS API port, not the description server
    #[serde(default)]
    pub port: Option<u16>,
}

impl RegistryEntry {
    /// Address to confirm; default HTTP(S) ports are dropped
    pub fn host_addr(&self) -> HostAddr {
        match self.port {
            Some(port) if port != 80 && port != 443 => HostAddr::with_port(self.internal_ip, port),
            _ => HostAddr::new(self.internal_ip),
        }
    }
}

/// Decode the registry manifest (a JSON array)
pub fn parse_manifest(body: &[u8]) -> Result<Vec<RegistryEntry>, DiscoveryError> {
    serde_json::from_slice(body).map_err(|e| DiscoveryError::Decode(e.to_string()))
}

/// Query the registry once and report every listed bridge
///
/// Transport and decode failures fail the whole probe; nothing is retried.
pub async fn probe(
    client: &reqwest::Client,
    url: &str,
    candidates: mpsc::Sender<Candidate>,
) -> Result<(), DiscoveryError> {
    debug!(url = %url, "Querying bridge registry");

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(DiscoveryError::Status(response.status()));
    }
    let body = response.bytes().await?;
    let entries = parse_manifest(&body)?;

    info!(count = entries.len(), "Registry lookup complete");

    for entry in entries {
        debug!(id = %entry.id, ip = %entry.internal_ip, "Registry lists bridge");
        let candidate = Candidate::new(entry.host_addr(), DiscoveryMethod::Registry);
        if candidates.send(candidate).await.is_err() {
            break;
        }
    }

    Ok(())
}
