//! bridgescout core - shared types for bridge discovery
//!
//! This crate provides the foundational types used across bridgescout:
//! - Host addresses and confirmed bridge records
//! - Description fingerprinting and parsing (`/description.xml`)
//! - HTTP transport settings and request rate limiting
//! - A small read-only client for a bridge's REST API

pub mod bridge;
pub mod client;
pub mod description;
pub mod host;
pub mod http;

pub use bridge::{Bridge, Candidate, DiscoveryMethod, DiscoveryMode};
pub use client::{BridgeClient, ClientError, Configuration};
pub use description::{check_fingerprint, BridgeDescription, DescriptionError, DESCRIPTION_PATH};
pub use host::{HostAddr, HostAddrError};
pub use http::{HttpSettings, RateLimiter};
