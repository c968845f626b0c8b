//! Discovery strategies behind one seam, so the orchestrator can be driven
//! by the real network or by a scripted stand-in

use bridgescout_core::{Candidate, HttpSettings};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use tokio::sync::mpsc;

use crate::confirm::{Confirmation, Confirmer};
use crate::discover::DISCOVERY_TIMEOUT;
use crate::error::DiscoveryError;
use crate::registry::{self, REGISTRY_URL};
use crate::ssdp::{self, SSDP_MULTICAST};
use crate::subnet::{self, SCAN_CONCURRENCY, SCAN_CONNECT_TIMEOUT, SCAN_PORT};

/// Sources of candidates plus the confirmation check
///
/// Probes report candidates on the given channel and return when they are
/// done; dropping the sender is what tells the orchestrator a source is
/// exhausted.
pub trait DiscoveryBackend: Send + Sync + 'static {
    /// Local multicast (SSDP) probe
    fn multicast(
        &self,
        candidates: mpsc::Sender<Candidate>,
    ) -> impl Future<Output = Result<(), DiscoveryError>> + Send;

    /// Cloud registry lookup
    fn registry(
        &self,
        candidates: mpsc::Sender<Candidate>,
    ) -> impl Future<Output = Result<(), DiscoveryError>> + Send;

    /// Local subnet sweep, only used after escalation
    fn subnet_scan(
        &self,
        candidates: mpsc::Sender<Candidate>,
    ) -> impl Future<Output = Result<(), DiscoveryError>> + Send;

    /// Check whether a candidate is a genuine bridge
    fn confirm(
        &self,
        candidate: Candidate,
    ) -> impl Future<Output = Result<Confirmation, DiscoveryError>> + Send;
}

/// Network discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Where the M-SEARCH is sent
    pub ssdp_target: SocketAddr,
    /// Cloud registry endpoint
    pub registry_url: String,
    /// Port probed during the subnet sweep
    pub scan_port: u16,
    /// Maximum outstanding connects during the subnet sweep
    pub scan_concurrency: usize,
    /// HTTP transport used for the registry and confirmation
    pub http: HttpSettings,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ssdp_target: SSDP_MULTICAST,
            registry_url: REGISTRY_URL.to_string(),
            scan_port: SCAN_PORT,
            scan_concurrency: SCAN_CONCURRENCY,
            http: HttpSettings::default(),
        }
    }
}

/// Backend talking to the real network
#[derive(Debug, Clone)]
pub struct NetworkBackend {
    config: DiscoveryConfig,
    cloud: reqwest::Client,
    confirmer: Confirmer,
}

impl NetworkBackend {
    pub fn new(config: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let cloud = config.http.cloud_client()?;
        let confirmer = Confirmer::new(&config.http)?;
        Ok(Self {
            config,
            cloud,
            confirmer,
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }
}

impl DiscoveryBackend for NetworkBackend {
    async fn multicast(&self, candidates: mpsc::Sender<Candidate>) -> Result<(), DiscoveryError> {
        ssdp::probe(self.config.ssdp_target, DISCOVERY_TIMEOUT, candidates).await
    }

    async fn registry(&self, candidates: mpsc::Sender<Candidate>) -> Result<(), DiscoveryError> {
        registry::probe(&self.cloud, &self.config.registry_url, candidates).await
    }

    async fn subnet_scan(&self, candidates: mpsc::Sender<Candidate>) -> Result<(), DiscoveryError> {
        subnet::scan(
            self.config.scan_port,
            self.config.scan_concurrency,
            SCAN_CONNECT_TIMEOUT,
            candidates,
        )
        .await
    }

    async fn confirm(&self, candidate: Candidate) -> Result<Confirmation, DiscoveryError> {
        self.confirmer.confirm(candidate).await
    }
}
