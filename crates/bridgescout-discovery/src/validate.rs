//! SSDP response validation
//!
//! Checks a raw M-SEARCH reply and decides whether it comes from a bridge.
//! A failed check is an ordinary value; callers drop the response.

use bridgescout_core::HostAddr;
use reqwest::Url;
use std::collections::HashMap;
use std::net::IpAddr;
use thiserror::Error;

/// Token bridges put in their SERVER header, e.g. "FreeRTOS/7.4.2 UPnP/1.0 IpBridge/1.10.0"
pub const VENDOR_TOKEN: &str = "ipbridge";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("Not a success response: {0:?}")]
    BadStatus(String),
    #[error("Missing USN header")]
    MissingUsn,
    #[error("Missing ST header")]
    MissingSearchTarget,
    #[error("SERVER header does not identify a bridge")]
    NotABridge,
    #[error("Missing LOCATION header")]
    MissingLocation,
    #[error("Malformed LOCATION {0:?}")]
    MalformedLocation(String),
    #[error("LOCATION host {claimed} does not match sender {origin}")]
    OriginMismatch { claimed: String, origin: IpAddr },
}

/// Parsed SSDP response: status line plus headers keyed by upper-case name
#[derive(Debug)]
struct SsdpResponse<'a> {
    status_line: &'a str,
    headers: HashMap<String, &'a str>,
}

impl<'a> SsdpResponse<'a> {
    fn parse(text: &'a str) -> Self {
        let mut lines = text.lines().map(str::trim).skip_while(|l| l.is_empty());
        let status_line = lines.next().unwrap_or_default();

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((key, value)) = line.split_once(':') {
                headers
                    .entry(key.trim().to_ascii_uppercase())
                    .or_insert(value.trim());
            }
        }

        Self {
            status_line,
            headers,
        }
    }

    fn header(&self, name: &str) -> Option<&'a str> {
        self.headers.get(name).copied()
    }

    /// "HTTP/1.1 200 OK" -> true
    fn is_success(&self) -> bool {
        let mut parts = self.status_line.split_whitespace();
        let version = parts.next().unwrap_or_default();
        let code = parts.next().unwrap_or_default();
        version.to_ascii_uppercase().starts_with("HTTP/") && code == "200"
    }
}

/// Validate a reply received from `origin`
///
/// Returns the address to confirm: the sender's IP plus any non-default port
/// from LOCATION.
///
/// Example reply:
///
/// ```text
/// HTTP/1.1 200 OK
/// HOST: 239.255.255.250:1900
/// EXT:
/// CACHE-CONTROL: max-age=100
/// LOCATION: http://192.168.178.241:80/description.xml
/// SERVER: FreeRTOS/7.4.2 UPnP/1.0 IpBridge/1.10.0
/// hue-bridgeid: 001788FFFE09A206
/// ST: upnp:rootdevice
/// USN: uuid:2f402f80-da50-11e1-9b23-00178809a206::upnp:rootdevice
/// ```
pub fn validate_response(text: &str, origin: IpAddr) -> Result<HostAddr, ValidationFailure> {
    let response = SsdpResponse::parse(text);

    if !response.is_success() {
        return Err(ValidationFailure::BadStatus(response.status_line.to_string()));
    }

    // MUST fields per UPnP Device Architecture 1.1
    if response.header("USN").is_none() {
        return Err(ValidationFailure::MissingUsn);
    }
    if response.header("ST").is_none() {
        return Err(ValidationFailure::MissingSearchTarget);
    }

    let is_bridge = response
        .header("SERVER")
        .map(|server| server.to_ascii_lowercase().contains(VENDOR_TOKEN))
        .unwrap_or(false);
    if !is_bridge {
        return Err(ValidationFailure::NotABridge);
    }

    let location = response
        .header("LOCATION")
        .filter(|l| !l.is_empty())
        .ok_or(ValidationFailure::MissingLocation)?;
    let url =
        Url::parse(location).map_err(|_| ValidationFailure::MalformedLocation(location.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| ValidationFailure::MalformedLocation(location.to_string()))?;

    let claimed = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .ok();
    if claimed != Some(origin) {
        return Err(ValidationFailure::OriginMismatch {
            claimed: host.to_string(),
            origin,
        });
    }

    Ok(match url.port() {
        Some(port) => HostAddr::with_port(origin, port),
        None => HostAddr::new(origin),
    })
}
