//! Configuration loading

use anyhow::{Context, Result};
use bridgescout_core::HttpSettings;
use bridgescout_discovery::DiscoveryConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub http: HttpSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySection {
    /// Where the SSDP M-SEARCH is sent
    #[serde(default = "default_ssdp_target")]
    pub ssdp_target: SocketAddr,
    /// Cloud registry endpoint
    #[serde(default = "default_registry_url")]
    pub registry_url: String,
    /// Port probed by the subnet sweep
    #[serde(default = "default_scan_port")]
    pub scan_port: u16,
    /// Concurrent connects during the subnet sweep
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            ssdp_target: default_ssdp_target(),
            registry_url: default_registry_url(),
            scan_port: default_scan_port(),
            scan_concurrency: default_scan_concurrency(),
        }
    }
}

fn default_ssdp_target() -> SocketAddr {
    bridgescout_discovery::ssdp::SSDP_MULTICAST
}

fn default_registry_url() -> String {
    bridgescout_discovery::registry::REGISTRY_URL.to_string()
}

fn default_scan_port() -> u16 {
    bridgescout_discovery::subnet::SCAN_PORT
}

fn default_scan_concurrency() -> usize {
    bridgescout_discovery::subnet::SCAN_CONCURRENCY
}

impl Config {
    /// Convert to DiscoveryConfig
    pub fn to_discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            ssdp_target: self.discovery.ssdp_target,
            registry_url: self.discovery.registry_url.clone(),
            scan_port: self.discovery.scan_port,
            scan_concurrency: self.discovery.scan_concurrency.max(1),
            http: self.http.clone(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}
