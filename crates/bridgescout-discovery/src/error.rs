//! Discovery error type

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("Failed to enumerate network interfaces: {0}")]
    Interfaces(String),
    /// The only failure `discover` reports: every strategy came up empty
    #[error("Bridge discovery failed: no bridges found")]
    NoBridgesFound,
}
