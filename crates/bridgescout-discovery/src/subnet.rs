//! Local subnet sweep, the expensive fallback when SSDP and the registry come up empty

use bridgescout_core::{Candidate, DiscoveryMethod, HostAddr};
use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::error::DiscoveryError;

/// Port probed on every host (the bridge's HTTP server)
pub const SCAN_PORT: u16 = 80;

/// Maximum outstanding connection attempts
pub const SCAN_CONCURRENCY: usize = 20;

/// Per-attempt connect timeout
pub const SCAN_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Networks wider than this are narrowed to the /24 around the interface
const MIN_PREFIX_LEN: u8 = 24;

/// An IPv4 network attached to one of the machine's interfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNetwork {
    pub interface: String,
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl LocalNetwork {
    /// Hosts to probe: every address in the (narrowed) network except the
    /// network, broadcast and own addresses
    pub fn hosts(&self) -> Vec<Ipv4Addr> {
        let prefix_len = self.prefix_len.max(MIN_PREFIX_LEN);
        if prefix_len >= 31 {
            return Vec::new();
        }
        let mask = prefix_mask(prefix_len);
        let network = u32::from(self.address) & mask;
        let broadcast = network | !mask;

        ((network + 1)..broadcast)
            .map(Ipv4Addr::from)
            .filter(|ip| *ip != self.address)
            .collect()
    }
}

fn prefix_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else if prefix_len >= 32 {
        0xFFFF_FFFF
    } else {
        !0u32 << (32 - prefix_len)
    }
}

/// List the IPv4 networks of all non-loopback interfaces
pub fn local_networks() -> Result<Vec<LocalNetwork>, DiscoveryError> {
    let interfaces =
        NetworkInterface::show().map_err(|e| DiscoveryError::Interfaces(e.to_string()))?;

    let networks = interfaces
        .into_iter()
        .flat_map(|iface| {
            let name = iface.name.clone();
            iface.addr.into_iter().filter_map(move |addr| match addr {
                network_interface::Addr::V4(v4) => {
                    let prefix_len = v4
                        .netmask
                        .map(|m| u32::from(m).count_ones() as u8)
                        .unwrap_or(MIN_PREFIX_LEN);
                    Some(LocalNetwork {
                        interface: name.clone(),
                        address: v4.ip,
                        prefix_len,
                    })
                }
                network_interface::Addr::V6(_) => None,
            })
        })
        .filter(|net| !net.address.is_loopback() && !net.address.is_unspecified())
        .collect();

    Ok(networks)
}

/// Unique hosts across all local networks, in address order
pub fn local_hosts(networks: &[LocalNetwork]) -> Vec<Ipv4Addr> {
    let own: BTreeSet<Ipv4Addr> = networks.iter().map(|n| n.address).collect();
    networks
        .iter()
        .flat_map(LocalNetwork::hosts)
        .filter(|ip| !own.contains(ip))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Try a TCP connect to `port` on every host, at most `concurrency` at once
///
/// Hosts that accept are reported as they are found.
pub async fn scan_hosts(
    hosts: Vec<Ipv4Addr>,
    port: u16,
    concurrency: usize,
    connect_timeout: Duration,
    candidates: mpsc::Sender<Candidate>,
) {
    let limit = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut attempts = JoinSet::new();
    let total = hosts.len();

    for host in hosts {
        if candidates.is_closed() {
            break;
        }
        let Ok(permit) = limit.clone().acquire_owned().await else {
            break;
        };
        let candidates = candidates.clone();

        attempts.spawn(async move {
            let _permit = permit;
            let addr = SocketAddr::from((host, port));
            match timeout(connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(_stream)) => {
                    trace!(ip = %host, port = port, "Host accepted connection");
                    let ip = IpAddr::V4(host);
                    let addr = if port == SCAN_PORT {
                        HostAddr::new(ip)
                    } else {
                        HostAddr::with_port(ip, port)
                    };
                    let _ = candidates
                        .send(Candidate::new(addr, DiscoveryMethod::SubnetScan))
                        .await;
                }
                Ok(Err(e)) => trace!(ip = %host, error = %e, "Connect failed"),
                Err(_) => trace!(ip = %host, "Connect timed out"),
            }
        });

        // Reap finished attempts so the set stays small
        while attempts.try_join_next().is_some() {}
    }

    while attempts.join_next().await.is_some() {}
    debug!(hosts = total, "Subnet sweep finished");
}

/// Sweep every local network for hosts listening on `port`
pub async fn scan(
    port: u16,
    concurrency: usize,
    connect_timeout: Duration,
    candidates: mpsc::Sender<Candidate>,
) -> Result<(), DiscoveryError> {
    let networks = local_networks()?;
    let hosts = local_hosts(&networks);

    info!(
        networks = networks.len(),
        hosts = hosts.len(),
        port = port,
        "Scanning local subnets"
    );
    for net in &networks {
        debug!(interface = %net.interface, address = %net.address, prefix = net.prefix_len, "Local network");
    }

    scan_hosts(hosts, port, concurrency, connect_timeout, candidates).await;
    Ok(())
}
