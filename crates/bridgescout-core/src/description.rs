//! UPnP device description (`/description.xml`) fingerprinting and parsing
//!
//! A host is only accepted as a bridge when its description document carries
//! the vendor fingerprint. The document is then parsed for display metadata.

use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Path of the description resource served by every bridge
pub const DESCRIPTION_PATH: &str = "/description.xml";

/// Fixed substrings every genuine bridge description contains
pub const FINGERPRINT: [&str; 3] = [
    "<deviceType>urn:schemas-upnp-org:device:Basic:1</deviceType>",
    "<manufacturer>Royal Philips Electronics</manufacturer>",
    "<modelURL>http://www.meethue.com</modelURL>",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptionError {
    #[error("Description is missing fingerprint {0:?}")]
    FingerprintMissing(&'static str),
    #[error("Failed to parse description: {0}")]
    ParseError(String),
}

/// Check that a description body carries the complete vendor fingerprint
///
/// Partial matches fail with the first missing substring.
pub fn check_fingerprint(body: &str) -> Result<(), DescriptionError> {
    match FINGERPRINT.iter().find(|needle| !body.contains(**needle)) {
        Some(missing) => Err(DescriptionError::FingerprintMissing(*missing)),
        None => Ok(()),
    }
}

/// Metadata read from a bridge's description document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BridgeDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct DescriptionRoot {
    device: DeviceElement,
}

#[derive(Debug, Deserialize)]
struct DeviceElement {
    #[serde(rename = "friendlyName", default)]
    friendly_name: Option<String>,
    #[serde(rename = "modelName", default)]
    model_name: Option<String>,
    #[serde(rename = "modelNumber", default)]
    model_number: Option<String>,
    #[serde(rename = "serialNumber", default)]
    serial_number: Option<String>,
    #[serde(rename = "UDN", default)]
    udn: Option<String>,
}

impl BridgeDescription {
    /// Parse the interesting fields out of a description document
    pub fn from_xml(xml: &str) -> Result<Self, DescriptionError> {
        let root: DescriptionRoot =
            from_str(xml).map_err(|e| DescriptionError::ParseError(e.to_string()))?;
        let device = root.device;

        // UDN format: "uuid:2f402f80-da50-11e1-9b23-001788xxxxxx"
        let uuid = device
            .udn
            .as_deref()
            .map(|udn| udn.trim().trim_start_matches("uuid:"))
            .and_then(|raw| Uuid::parse_str(raw).ok());

        Ok(Self {
            friendly_name: non_empty(device.friendly_name),
            model_name: non_empty(device.model_name),
            model_number: non_empty(device.model_number),
            serial_number: non_empty(device.serial_number),
            uuid,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
