//! SSDP (multicast M-SEARCH) probing for bridges on the local network

use bridgescout_core::{Candidate, DiscoveryMethod, HostAddr};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

use crate::error::DiscoveryError;
use crate::validate::validate_response;

/// SSDP multicast group
pub const SSDP_MULTICAST: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900));

/// Max-wait hint advertised to responders, in seconds
pub const SSDP_MX_SECS: u8 = 2;

/// Receive buffer size; SSDP replies fit in a single datagram
const RECV_BUFFER_SIZE: usize = 8192;

/// Build the M-SEARCH request (CRLF line endings, blank-line terminated)
pub fn search_request() -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         ST: ssdp:all\r\n\
         MAN: ssdp:discover\r\n\
         MX: {}\r\n\
         \r\n",
        SSDP_MULTICAST, SSDP_MX_SECS
    )
}

/// Validates replies and remembers which origins were already reported
///
/// Each probe owns one filter, so an origin is emitted at most once per probe
/// no matter how many datagrams it sends.
#[derive(Debug, Default)]
pub struct ResponseFilter {
    seen: HashSet<IpAddr>,
}

impl ResponseFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the address to confirm when the datagram is a new valid reply
    pub fn accept(&mut self, datagram: &[u8], origin: SocketAddr) -> Option<HostAddr> {
        let text = String::from_utf8_lossy(datagram);
        match validate_response(&text, origin.ip()) {
            Ok(addr) => {
                if self.seen.insert(origin.ip()) {
                    Some(addr)
                } else {
                    trace!(origin = %origin, "Duplicate SSDP reply");
                    None
                }
            }
            Err(reason) => {
                trace!(origin = %origin, reason = %reason, "Ignoring SSDP reply");
                None
            }
        }
    }
}

/// Send one M-SEARCH to `target` and report valid replies until `timeout`
///
/// Candidates are sent in receipt order. The window closing is a normal end;
/// any other socket error ends the probe with that error.
pub async fn probe(
    target: SocketAddr,
    timeout: Duration,
    candidates: mpsc::Sender<Candidate>,
) -> Result<(), DiscoveryError> {
    let bind: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind).await?;
    let deadline = Instant::now() + timeout;

    socket.send_to(search_request().as_bytes(), target).await?;
    debug!(target = %target, local = ?socket.local_addr().ok(), "Sent SSDP M-SEARCH");

    let mut filter = ResponseFilter::new();
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        let (len, origin) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Ok(Ok(received)) => received,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => break,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => break,
        };

        if let Some(addr) = filter.accept(&buf[..len], origin) {
            debug!(ip = %addr, "SSDP reply from bridge");
            if candidates
                .send(Candidate::new(addr, DiscoveryMethod::Multicast))
                .await
                .is_err()
            {
                // Nobody is listening any more
                break;
            }
        }
    }

    debug!(replies = filter.seen.len(), "SSDP probe window closed");
    Ok(())
}
