//! HTTP transport settings shared by every bridge-facing request

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Default request timeout (connect + response)
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 2000;

/// Idle connections kept per host
const MAX_IDLE_PER_HOST: usize = 10;

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Accept self-signed certificates (bridges ship with one)
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
    /// Minimum delay between two requests in milliseconds (0 disables)
    #[serde(default)]
    pub min_request_interval_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            accept_invalid_certs: true,
            min_request_interval_ms: 0,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    fn builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .connect_timeout(self.timeout())
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
    }

    /// Client for hosts on the local network
    ///
    /// Proxies are bypassed, LAN appliances are never reachable through one.
    pub fn local_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        self.builder().no_proxy().build()
    }

    /// Client for internet endpoints, honoring the system proxy configuration
    pub fn cloud_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        self.builder().build()
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        if self.min_request_interval_ms == 0 {
            RateLimiter::unlimited()
        } else {
            RateLimiter::new(self.min_request_interval())
        }
    }
}

/// Spaces requests at least `interval` apart
///
/// Clones share the same schedule.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    next: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Arc::new(Mutex::new(None)),
        }
    }

    /// A limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Wait for the next request slot
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        // Lock is held while sleeping so waiters queue up in order
        let mut next = self.next.lock().await;
        if let Some(at) = *next {
            if at > Instant::now() {
                trace!(wait = ?(at - Instant::now()), "Rate limit: delaying request");
                sleep_until(at).await;
            }
        }
        *next = Some(Instant::now() + self.interval);
    }
}
