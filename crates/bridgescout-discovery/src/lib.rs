//! Bridgescout Discovery - Finding bridges on the local network
//!
//! This crate combines several discovery methods:
//! - SSDP multicast search with strict response validation
//! - The vendor cloud registry
//! - A TCP sweep of the local subnets, used only when the others find nothing
//!
//! Every candidate is confirmed by fetching its description document before
//! it is reported.

pub mod backend;
pub mod confirm;
pub mod discover;
pub mod error;
pub mod registry;
pub mod ssdp;
pub mod subnet;
pub mod validate;

pub use backend::{DiscoveryBackend, DiscoveryConfig, NetworkBackend};
pub use confirm::{Confirmation, Confirmer, Rejection};
pub use discover::{discover_bridges, BridgeDiscovery, DiscoveryEvent, DISCOVERY_TIMEOUT};
pub use error::DiscoveryError;
pub use validate::{validate_response, ValidationFailure};
