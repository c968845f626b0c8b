//! Read-only REST client for a discovered bridge

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::bridge::Bridge;
use crate::http::{HttpSettings, RateLimiter};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Bridge returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("Bridge API error {kind} at {address}: {description}")]
    Api {
        kind: i64,
        address: String,
        description: String,
    },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Error object returned by the bridge API inside a 200 response
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    kind: i64,
    #[serde(default)]
    address: String,
    #[serde(default)]
    description: String,
}

/// Basic information about the bridge itself
///
/// Unauthenticated requests only receive the public subset, so every field
/// is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "bridgeid")]
    pub bridge_id: Option<String>,
    #[serde(default, rename = "modelid")]
    pub model_id: Option<String>,
    #[serde(default, rename = "apiversion")]
    pub api_version: Option<String>,
    #[serde(default, rename = "swversion")]
    pub software_version: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default, rename = "factorynew")]
    pub factory_new: Option<bool>,
    #[serde(default, rename = "datastoreversion")]
    pub datastore_version: Option<String>,
    #[serde(default, rename = "zigbeechannel")]
    pub zigbee_channel: Option<u8>,
    #[serde(default, rename = "ipaddress")]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub netmask: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub dhcp: Option<bool>,
    #[serde(default, rename = "linkbutton")]
    pub link_button: Option<bool>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Client for the bridge REST API
pub struct BridgeClient {
    bridge: Bridge,
    use_https: bool,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl BridgeClient {
    pub fn new(bridge: Bridge, settings: &HttpSettings) -> Result<Self, ClientError> {
        Ok(Self {
            bridge,
            use_https: false,
            client: settings.local_client()?,
            limiter: settings.rate_limiter(),
        })
    }

    /// Talk to the bridge over HTTPS (firmware 1.24 and later)
    pub fn with_https(mut self, enable: bool) -> Self {
        self.use_https = enable;
        self
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    fn base_url(&self) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        format!("{}://{}/api", scheme, self.bridge.address().authority())
    }

    /// Build the full URL for an API path, inserting the username when known
    pub fn url(&self, path: &str) -> String {
        match self.bridge.username() {
            Some(user) => format!("{}/{}{}", self.base_url(), user, path),
            None => format!("{}{}", self.base_url(), path),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.limiter.acquire().await;

        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        let body = response.text().await?;
        debug!(url = %url, body = %body, "Response");
        decode_response(&body)
    }

    /// Fetch the bridge configuration
    pub async fn configuration(&self) -> Result<Configuration, ClientError> {
        self.get("/config").await
    }
}

/// Decode a bridge API body, surfacing embedded API errors
fn decode_response<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    if let Ok(errors) = serde_json::from_str::<Vec<ApiErrorEnvelope>>(body) {
        if let Some(first) = errors.into_iter().next() {
            return Err(ClientError::Api {
                kind: first.error.kind,
                address: first.error.address,
                description: first.error.description,
            });
        }
    }
    serde_json::from_str(body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}
