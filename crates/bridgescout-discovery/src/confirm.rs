//! Candidate confirmation via the device description resource

use bridgescout_core::{
    check_fingerprint, Bridge, BridgeDescription, Candidate, DescriptionError, HostAddr,
    HttpSettings, RateLimiter, DESCRIPTION_PATH,
};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, trace};

use crate::backend::DiscoveryBackend;
use crate::discover::DiscoveryEvent;
use crate::error::DiscoveryError;

/// Confirmations running at the same time
pub const CONFIRM_CONCURRENCY: usize = 10;

/// Why a reachable candidate is not a bridge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Description request returned HTTP {0}")]
    Status(u16),
    #[error(transparent)]
    Description(#[from] DescriptionError),
}

/// Outcome of checking one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    Confirmed(Bridge),
    Rejected(Rejection),
}

/// URL of the description resource for an address
pub fn description_url(addr: &HostAddr) -> String {
    format!("http://{}{}", addr.authority(), DESCRIPTION_PATH)
}

/// Decide from a description body whether the candidate is a bridge
pub fn evaluate(candidate: Candidate, body: &str) -> Confirmation {
    if let Err(e) = check_fingerprint(body) {
        return Confirmation::Rejected(e.into());
    }

    let description = match BridgeDescription::from_xml(body) {
        Ok(description) => Some(description),
        Err(e) => {
            debug!(ip = %candidate.addr, error = %e, "Could not parse bridge description");
            None
        }
    };
    Confirmation::Confirmed(Bridge::confirmed(candidate, description))
}

/// Fetches `/description.xml` from candidates and checks the fingerprint
#[derive(Debug, Clone)]
pub struct Confirmer {
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl Confirmer {
    pub fn new(settings: &HttpSettings) -> Result<Self, DiscoveryError> {
        Ok(Self {
            client: settings.local_client()?,
            limiter: settings.rate_limiter(),
        })
    }

    /// Check one candidate
    ///
    /// Unreachable hosts surface as errors; the confirmation stage treats
    /// them like a rejection.
    pub async fn confirm(&self, candidate: Candidate) -> Result<Confirmation, DiscoveryError> {
        self.limiter.acquire().await;

        let url = description_url(&candidate.addr);
        trace!(url = %url, "Fetching description");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Ok(Confirmation::Rejected(Rejection::Status(
                response.status().as_u16(),
            )));
        }
        let body = response.text().await?;
        Ok(evaluate(candidate, &body))
    }
}

/// Confirm candidates as they arrive and forward bridges to `results`
///
/// Candidates already seen by this stage are skipped. The key is the full
/// address, so the same IP on another port is still tried; the orchestrator
/// keeps one bridge per IP. `results` closes once
/// `candidates` is closed and every confirmation has finished.
pub(crate) async fn run_stage<B: DiscoveryBackend>(
    backend: Arc<B>,
    mut candidates: mpsc::Receiver<Candidate>,
    results: mpsc::Sender<Bridge>,
    events: broadcast::Sender<DiscoveryEvent>,
) {
    let limit = Arc::new(Semaphore::new(CONFIRM_CONCURRENCY));
    let mut seen = HashSet::new();
    let mut inflight = JoinSet::new();

    while let Some(candidate) = candidates.recv().await {
        if !seen.insert(candidate.addr) {
            trace!(ip = %candidate.addr, method = %candidate.method, "Candidate already queued");
            continue;
        }
        debug!(ip = %candidate.addr, method = %candidate.method, "New candidate");
        let _ = events.send(DiscoveryEvent::CandidateFound(candidate));

        let Ok(permit) = limit.clone().acquire_owned().await else {
            break;
        };
        let backend = backend.clone();
        let results = results.clone();

        inflight.spawn(async move {
            let _permit = permit;
            match backend.confirm(candidate).await {
                Ok(Confirmation::Confirmed(bridge)) => {
                    info!(ip = %candidate.addr, method = %candidate.method, "Confirmed bridge");
                    let _ = results.send(bridge).await;
                }
                Ok(Confirmation::Rejected(reason)) => {
                    debug!(ip = %candidate.addr, reason = %reason, "Candidate rejected");
                }
                Err(e) => {
                    debug!(ip = %candidate.addr, error = %e, "Candidate unreachable");
                }
            }
        });

        while inflight.try_join_next().is_some() {}
    }

    while inflight.join_next().await.is_some() {}
}
