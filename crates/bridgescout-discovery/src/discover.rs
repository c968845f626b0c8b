//! Discovery orchestrator combining all strategies
//!
//! A run starts the SSDP probe and the registry lookup together, feeds every
//! candidate through one confirmation stage and waits on the confirmed
//! results with a bounded wait. If nothing turns up the run escalates once to
//! a subnet sweep. The sweep runs to completion (it bounds itself through its
//! per-connect timeout), then the wait is re-armed for the remaining
//! confirmations; if that is empty too the run fails.

use bridgescout_core::{Bridge, Candidate, DiscoveryMode};
use std::collections::HashSet;
use std::net::IpAddr;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::backend::{DiscoveryBackend, DiscoveryConfig, NetworkBackend};
use crate::confirm;
use crate::error::DiscoveryError;

/// Bound on every wait for the next confirmed bridge
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Capacity of the candidate and result channels
const CHANNEL_CAPACITY: usize = 10;

/// Discovery event for progress reporting
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// SSDP and registry probes started
    SearchStarted { mode: DiscoveryMode },
    /// A candidate entered confirmation
    CandidateFound(Candidate),
    /// A bridge was confirmed and added to the result set
    BridgeConfirmed(Bridge),
    /// Nothing found so far, subnet sweep started
    ScanEscalated,
    /// Run ended
    Finished { found: usize },
}

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Searching,
    ScanEscalated,
}

/// State of one `discover` call
///
/// Owns every task it spawns; dropping the run aborts them all, which
/// releases their sockets.
struct DiscoveryRun<B> {
    backend: Arc<B>,
    events: broadcast::Sender<DiscoveryEvent>,
    state: RunState,
    /// Bridge identity is the IP; a port only says where its description lives
    seen: HashSet<IpAddr>,
    /// Fires when the subnet sweep has returned
    sweep: Option<oneshot::Receiver<()>>,
    bridges: Vec<Bridge>,
    started: Instant,
    tasks: JoinSet<()>,
}

impl<B: DiscoveryBackend> DiscoveryRun<B> {
    fn new(backend: Arc<B>, events: broadcast::Sender<DiscoveryEvent>) -> Self {
        Self {
            backend,
            events,
            state: RunState::Searching,
            seen: HashSet::new(),
            sweep: None,
            bridges: Vec::new(),
            started: Instant::now(),
            tasks: JoinSet::new(),
        }
    }

    fn spawn_probe<F>(&mut self, name: &'static str, probe: F)
    where
        F: Future<Output = Result<(), DiscoveryError>> + Send + 'static,
    {
        self.tasks.spawn(async move {
            match probe.await {
                Ok(()) => debug!(probe = name, "Probe finished"),
                Err(e) => debug!(probe = name, error = %e, "Probe failed"),
            }
        });
    }

    /// Start a confirmation stage; returns its candidate input plus a result
    /// sender and the result stream
    #[allow(clippy::type_complexity)]
    fn spawn_stage(
        &mut self,
    ) -> (
        mpsc::Sender<Candidate>,
        mpsc::Sender<Bridge>,
        mpsc::Receiver<Bridge>,
    ) {
        let (candidate_tx, candidate_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (result_tx, result_rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.tasks.spawn(confirm::run_stage(
            self.backend.clone(),
            candidate_rx,
            result_tx.clone(),
            self.events.clone(),
        ));
        (candidate_tx, result_tx, result_rx)
    }

    /// Searching: SSDP and registry in parallel
    fn start_search(&mut self) -> mpsc::Receiver<Bridge> {
        let (candidates, _, results) = self.spawn_stage();

        let backend = self.backend.clone();
        let tx = candidates.clone();
        self.spawn_probe("multicast", async move { backend.multicast(tx).await });

        let backend = self.backend.clone();
        self.spawn_probe("registry", async move { backend.registry(candidates).await });

        results
    }

    /// ScanEscalated: subnet sweep into a fresh stage
    ///
    /// Results still pending from the search are forwarded into the new
    /// stream so late confirmations are not lost.
    fn escalate(&mut self, previous: mpsc::Receiver<Bridge>) -> mpsc::Receiver<Bridge> {
        self.state = RunState::ScanEscalated;
        info!(elapsed = ?self.started.elapsed(), "No bridges found yet, scanning local subnets");
        let _ = self.events.send(DiscoveryEvent::ScanEscalated);

        let (candidates, result_tx, results) = self.spawn_stage();

        let (done_tx, done_rx) = oneshot::channel();
        let backend = self.backend.clone();
        self.spawn_probe("subnet-scan", async move {
            let result = backend.subnet_scan(candidates).await;
            let _ = done_tx.send(());
            result
        });
        self.sweep = Some(done_rx);

        self.tasks.spawn(forward(previous, result_tx));

        results
    }

    /// Record a confirmed bridge; false for an address already in the result set
    fn accept(&mut self, bridge: Bridge) -> bool {
        if !self.seen.insert(bridge.address().ip) {
            debug!(ip = %bridge.address(), "Bridge already found");
            return false;
        }
        let _ = self.events.send(DiscoveryEvent::BridgeConfirmed(bridge.clone()));
        self.bridges.push(bridge);
        true
    }

    fn finish(self) -> Vec<Bridge> {
        info!(
            found = self.bridges.len(),
            elapsed = ?self.started.elapsed(),
            escalated = self.state == RunState::ScanEscalated,
            "Discovery finished"
        );
        let _ = self.events.send(DiscoveryEvent::Finished {
            found: self.bridges.len(),
        });
        let mut tasks = self.tasks;
        tasks.abort_all();
        self.bridges
    }
}

/// Pipe an earlier result stream into a later one
async fn forward(mut from: mpsc::Receiver<Bridge>, to: mpsc::Sender<Bridge>) {
    while let Some(bridge) = from.recv().await {
        if to.send(bridge).await.is_err() {
            break;
        }
    }
}

/// Bridge discovery service
pub struct BridgeDiscovery<B = NetworkBackend> {
    backend: Arc<B>,
    event_tx: broadcast::Sender<DiscoveryEvent>,
}

impl BridgeDiscovery<NetworkBackend> {
    /// Create a discovery service using the real network
    pub fn new(config: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        Ok(Self::with_backend(NetworkBackend::new(config)?))
    }
}

impl<B: DiscoveryBackend> BridgeDiscovery<B> {
    pub fn with_backend(backend: B) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            backend: Arc::new(backend),
            event_tx,
        }
    }

    /// Subscribe to discovery events
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.event_tx.subscribe()
    }

    /// Find bridges
    ///
    /// `FirstMatch` returns as soon as one bridge is confirmed. `Exhaustive`
    /// keeps collecting until the sources are done or a wait times out.
    /// Fails with [`DiscoveryError::NoBridgesFound`] only after the subnet
    /// sweep came up empty as well. Dropping the returned future cancels all
    /// probes.
    pub async fn discover(&self, mode: DiscoveryMode) -> Result<Vec<Bridge>, DiscoveryError> {
        let mut run = DiscoveryRun::new(self.backend.clone(), self.event_tx.clone());
        info!(mode = ?mode, "Starting bridge discovery");
        let _ = self.event_tx.send(DiscoveryEvent::SearchStarted { mode });

        let mut results = run.start_search();

        loop {
            // While the sweep is running its own connect timeouts bound the wait
            let waited = match run.sweep.as_mut() {
                Some(done) => tokio::select! {
                    bridge = results.recv() => Some(Ok(bridge)),
                    _ = done => None,
                },
                None => Some(timeout(DISCOVERY_TIMEOUT, results.recv()).await),
            };
            let Some(waited) = waited else {
                debug!(elapsed = ?run.started.elapsed(), "Subnet sweep finished");
                run.sweep = None;
                continue;
            };

            let closed = match waited {
                Ok(Some(bridge)) => {
                    if run.accept(bridge) && mode == DiscoveryMode::FirstMatch {
                        return Ok(run.finish());
                    }
                    continue;
                }
                Ok(None) => true,
                Err(_) => false,
            };

            if !run.bridges.is_empty() {
                return Ok(run.finish());
            }

            match run.state {
                RunState::Searching => {
                    debug!(closed = closed, "Search phase ended without bridges");
                    results = run.escalate(results);
                }
                RunState::ScanEscalated => {
                    warn!("Bridge discovery failed, no bridges found");
                    run.finish();
                    return Err(DiscoveryError::NoBridgesFound);
                }
            }
        }
    }
}

/// Find bridges with the default network configuration
pub async fn discover_bridges(mode: DiscoveryMode) -> Result<Vec<Bridge>, DiscoveryError> {
    BridgeDiscovery::new(DiscoveryConfig::default())?
        .discover(mode)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::{evaluate, Confirmation};
    use crate::ssdp::ResponseFilter;
    use bridgescout_core::{DiscoveryMethod, HostAddr};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    const DESCRIPTION: &str = "<root><device>\
        <deviceType>urn:schemas-upnp-org:device:Basic:1</deviceType>\
        <friendlyName>Philips hue</friendlyName>\
        <manufacturer>Royal Philips Electronics</manufacturer>\
        <modelURL>http://www.meethue.com</modelURL>\
        </device></root>";

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    /// SSDP reply from `origin` advertising `location_host`
    fn reply(origin: &str, location_host: &str) -> (String, SocketAddr) {
        reply_on_port(origin, location_host, 80)
    }

    fn reply_on_port(origin: &str, location_host: &str, port: u16) -> (String, SocketAddr) {
        let datagram = format!(
            "HTTP/1.1 200 OK\r\n\
             LOCATION: http://{}:{}/description.xml\r\n\
             SERVER: Linux/3.14.0 UPnP/1.0 IpBridge/1.48.0\r\n\
             ST: upnp:rootdevice\r\n\
             USN: uuid:2f402f80-da50-11e1-9b23-001788a1b2c3::upnp:rootdevice\r\n\r\n",
            location_host, port
        );
        (datagram, SocketAddr::new(ip(origin), 1900))
    }

    /// Counts live probe futures; aborted tasks drop their guard
    struct ActiveGuard(Arc<AtomicUsize>);

    impl ActiveGuard {
        fn new(active: &Arc<AtomicUsize>) -> Self {
            active.fetch_add(1, Ordering::SeqCst);
            Self(active.clone())
        }
    }

    impl Drop for ActiveGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct ScriptedBackend {
        ssdp_delay: Duration,
        ssdp_replies: Vec<(String, SocketAddr)>,
        ssdp_hangs: bool,
        registry_delay: Duration,
        registry: Vec<IpAddr>,
        registry_fails: bool,
        registry_hangs: bool,
        scan_delay: Duration,
        scan: Vec<IpAddr>,
        scan_calls: AtomicUsize,
        /// Hosts serving a genuine description
        bridges: HashSet<IpAddr>,
        /// Hosts refusing connections
        unreachable: HashSet<IpAddr>,
        active: Arc<AtomicUsize>,
    }

    impl DiscoveryBackend for ScriptedBackend {
        async fn multicast(&self, candidates: mpsc::Sender<Candidate>) -> Result<(), DiscoveryError> {
            let _guard = ActiveGuard::new(&self.active);
            sleep(self.ssdp_delay).await;
            let mut filter = ResponseFilter::new();
            for (datagram, origin) in &self.ssdp_replies {
                if let Some(addr) = filter.accept(datagram.as_bytes(), *origin) {
                    let _ = candidates
                        .send(Candidate::new(addr, DiscoveryMethod::Multicast))
                        .await;
                }
            }
            if self.ssdp_hangs {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn registry(&self, candidates: mpsc::Sender<Candidate>) -> Result<(), DiscoveryError> {
            let _guard = ActiveGuard::new(&self.active);
            sleep(self.registry_delay).await;
            if self.registry_hangs {
                std::future::pending::<()>().await;
            }
            if self.registry_fails {
                return Err(DiscoveryError::Decode("registry unavailable".to_string()));
            }
            for ip in &self.registry {
                let _ = candidates
                    .send(Candidate::new(*ip, DiscoveryMethod::Registry))
                    .await;
            }
            Ok(())
        }

        async fn subnet_scan(&self, candidates: mpsc::Sender<Candidate>) -> Result<(), DiscoveryError> {
            let _guard = ActiveGuard::new(&self.active);
            self.scan_calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.scan_delay).await;
            for ip in &self.scan {
                let _ = candidates
                    .send(Candidate::new(*ip, DiscoveryMethod::SubnetScan))
                    .await;
            }
            Ok(())
        }

        async fn confirm(&self, candidate: Candidate) -> Result<Confirmation, DiscoveryError> {
            sleep(Duration::from_millis(10)).await;
            if self.unreachable.contains(&candidate.addr.ip) {
                return Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into());
            }
            let body = if self.bridges.contains(&candidate.addr.ip) {
                DESCRIPTION
            } else {
                "<html><body>Router login</body></html>"
            };
            Ok(evaluate(candidate, body))
        }
    }

    fn events(rx: &mut broadcast::Receiver<DiscoveryEvent>) -> Vec<DiscoveryEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn addresses(bridges: &[Bridge]) -> Vec<IpAddr> {
        let mut ips: Vec<IpAddr> = bridges.iter().map(|b| b.address().ip).collect();
        ips.sort();
        ips
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_match_returns_on_first_bridge() {
        // Two bridges from two sources confirm at about the same time
        let discovery = BridgeDiscovery::with_backend(ScriptedBackend {
            ssdp_delay: Duration::from_millis(500),
            ssdp_replies: vec![reply("10.0.0.5", "10.0.0.5")],
            registry_delay: Duration::from_millis(500),
            registry: vec![ip("10.0.0.6")],
            bridges: HashSet::from([ip("10.0.0.5"), ip("10.0.0.6")]),
            ..Default::default()
        });

        let started = Instant::now();
        let bridges = discovery.discover(DiscoveryMode::FirstMatch).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(bridges.len(), 1);
        assert!(
            [ip("10.0.0.5"), ip("10.0.0.6")].contains(&bridges[0].address().ip),
            "unexpected bridge {}",
            bridges[0]
        );
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(600), "took {:?}", elapsed);
        assert_eq!(discovery.backend.scan_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustive_collects_distinct_bridges() {
        let discovery = BridgeDiscovery::with_backend(ScriptedBackend {
            ssdp_delay: Duration::from_millis(300),
            registry_delay: Duration::from_millis(1500),
            ssdp_replies: vec![
                reply("10.0.0.5", "10.0.0.5"),
                reply("10.0.0.5", "10.0.0.5"),
                reply("10.0.0.6", "10.0.0.6"),
            ],
            registry: vec![ip("10.0.0.5"), ip("10.0.0.7"), ip("10.0.0.20")],
            bridges: HashSet::from([ip("10.0.0.5"), ip("10.0.0.6"), ip("10.0.0.7")]),
            ..Default::default()
        });
        let mut rx = discovery.subscribe();

        let bridges = discovery.discover(DiscoveryMode::Exhaustive).await.unwrap();

        assert_eq!(
            addresses(&bridges),
            vec![ip("10.0.0.5"), ip("10.0.0.6"), ip("10.0.0.7")]
        );
        assert_eq!(discovery.backend.scan_calls.load(Ordering::SeqCst), 0);

        let events = events(&mut rx);
        let candidates = events
            .iter()
            .filter(|e| matches!(e, DiscoveryEvent::CandidateFound(_)))
            .count();
        let confirmed = events
            .iter()
            .filter(|e| matches!(e, DiscoveryEvent::BridgeConfirmed(_)))
            .count();
        assert_eq!(candidates, 4);
        assert_eq!(confirmed, 3);
        assert!(matches!(
            events.last(),
            Some(DiscoveryEvent::Finished { found: 3 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalates_once_then_fails() {
        let discovery = BridgeDiscovery::with_backend(ScriptedBackend {
            registry_fails: true,
            scan: vec![ip("10.0.0.30")],
            unreachable: HashSet::from([ip("10.0.0.30")]),
            ..Default::default()
        });
        let mut rx = discovery.subscribe();

        let result = discovery.discover(DiscoveryMode::FirstMatch).await;

        assert!(matches!(result, Err(DiscoveryError::NoBridgesFound)));
        assert_eq!(discovery.backend.scan_calls.load(Ordering::SeqCst), 1);

        let events = events(&mut rx);
        assert!(matches!(
            events.first(),
            Some(DiscoveryEvent::SearchStarted {
                mode: DiscoveryMode::FirstMatch
            })
        ));
        let escalations = events
            .iter()
            .filter(|e| matches!(e, DiscoveryEvent::ScanEscalated))
            .count();
        assert_eq!(escalations, 1);
        assert!(matches!(
            events.last(),
            Some(DiscoveryEvent::Finished { found: 0 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalates_after_timeout_when_probes_hang() {
        let discovery = BridgeDiscovery::with_backend(ScriptedBackend {
            ssdp_hangs: true,
            registry_hangs: true,
            scan: vec![ip("10.0.0.2"), ip("10.0.0.8")],
            bridges: HashSet::from([ip("10.0.0.8")]),
            ..Default::default()
        });

        let started = Instant::now();
        let bridges = discovery.discover(DiscoveryMode::FirstMatch).await.unwrap();

        assert!(started.elapsed() >= DISCOVERY_TIMEOUT);
        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].address(), HostAddr::new(ip("10.0.0.8")));
        assert_eq!(bridges[0].method(), DiscoveryMethod::SubnetScan);
        assert_eq!(discovery.backend.scan_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spoofed_location_is_discarded() {
        // 10.0.0.9 is a bridge but only ever advertised by 10.0.0.5
        let discovery = BridgeDiscovery::with_backend(ScriptedBackend {
            ssdp_replies: vec![reply("10.0.0.5", "10.0.0.9")],
            bridges: HashSet::from([ip("10.0.0.9")]),
            ..Default::default()
        });

        let result = discovery.discover(DiscoveryMode::FirstMatch).await;

        assert!(matches!(result, Err(DiscoveryError::NoBridgesFound)));
        assert_eq!(discovery.backend.scan_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustive_returns_on_timeout_with_results() {
        let discovery = BridgeDiscovery::with_backend(ScriptedBackend {
            ssdp_replies: vec![reply("10.0.0.5", "10.0.0.5")],
            ssdp_hangs: true,
            registry_hangs: true,
            bridges: HashSet::from([ip("10.0.0.5")]),
            ..Default::default()
        });

        let started = Instant::now();
        let bridges = discovery.discover(DiscoveryMode::Exhaustive).await.unwrap();

        assert_eq!(addresses(&bridges), vec![ip("10.0.0.5")]);
        assert!(started.elapsed() >= DISCOVERY_TIMEOUT);
        assert!(started.elapsed() < DISCOVERY_TIMEOUT * 2);
        assert_eq!(discovery.backend.scan_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_search_result_survives_escalation() {
        // SSDP answers after the first wait already timed out
        let discovery = BridgeDiscovery::with_backend(ScriptedBackend {
            ssdp_delay: DISCOVERY_TIMEOUT + Duration::from_secs(1),
            ssdp_replies: vec![reply("10.0.0.5", "10.0.0.5")],
            bridges: HashSet::from([ip("10.0.0.5")]),
            ..Default::default()
        });

        let bridges = discovery.discover(DiscoveryMode::FirstMatch).await.unwrap();

        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].method(), DiscoveryMethod::Multicast);
        assert_eq!(discovery.backend.scan_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_probes() {
        let active = Arc::new(AtomicUsize::new(0));
        let discovery = BridgeDiscovery::with_backend(ScriptedBackend {
            ssdp_hangs: true,
            registry_hangs: true,
            active: active.clone(),
            ..Default::default()
        });

        let cancelled = timeout(
            Duration::from_millis(100),
            discovery.discover(DiscoveryMode::Exhaustive),
        )
        .await;
        assert!(cancelled.is_err());

        sleep(Duration::from_millis(10)).await;
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_run_aborts_remaining_probes() {
        let active = Arc::new(AtomicUsize::new(0));
        let discovery = BridgeDiscovery::with_backend(ScriptedBackend {
            ssdp_replies: vec![reply("10.0.0.5", "10.0.0.5")],
            ssdp_hangs: true,
            registry_hangs: true,
            bridges: HashSet::from([ip("10.0.0.5")]),
            active: active.clone(),
            ..Default::default()
        });

        discovery.discover(DiscoveryMode::FirstMatch).await.unwrap();

        sleep(Duration::from_millis(10)).await;
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sweep_runs_to_completion() {
        // The sweep only reaches the bridge after the wait would have expired
        let discovery = BridgeDiscovery::with_backend(ScriptedBackend {
            ssdp_hangs: true,
            registry_hangs: true,
            scan_delay: Duration::from_secs(4),
            scan: vec![ip("10.0.0.200")],
            bridges: HashSet::from([ip("10.0.0.200")]),
            ..Default::default()
        });

        let started = Instant::now();
        let bridges = discovery.discover(DiscoveryMode::FirstMatch).await.unwrap();

        assert_eq!(addresses(&bridges), vec![ip("10.0.0.200")]);
        assert_eq!(bridges[0].method(), DiscoveryMethod::SubnetScan);
        assert!(started.elapsed() >= DISCOVERY_TIMEOUT + Duration::from_secs(4));
        assert_eq!(discovery.backend.scan_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_rearmed_after_sweep_finishes() {
        let discovery = BridgeDiscovery::with_backend(ScriptedBackend {
            ssdp_hangs: true,
            registry_hangs: true,
            scan_delay: Duration::from_secs(10),
            ..Default::default()
        });

        let started = Instant::now();
        let result = discovery.discover(DiscoveryMode::FirstMatch).await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(DiscoveryError::NoBridgesFound)));
        assert!(elapsed >= DISCOVERY_TIMEOUT * 2 + Duration::from_secs(10));
        assert!(elapsed < DISCOVERY_TIMEOUT * 3 + Duration::from_secs(10));
        assert_eq!(discovery.backend.scan_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_ip_on_two_ports_is_one_bridge() {
        let discovery = BridgeDiscovery::with_backend(ScriptedBackend {
            ssdp_replies: vec![reply_on_port("10.0.0.5", "10.0.0.5", 8080)],
            registry: vec![ip("10.0.0.5")],
            bridges: HashSet::from([ip("10.0.0.5")]),
            ..Default::default()
        });
        let mut rx = discovery.subscribe();

        let bridges = discovery.discover(DiscoveryMode::Exhaustive).await.unwrap();

        assert_eq!(addresses(&bridges), vec![ip("10.0.0.5")]);
        let events = events(&mut rx);
        let candidates = events
            .iter()
            .filter(|e| matches!(e, DiscoveryEvent::CandidateFound(_)))
            .count();
        let confirmed = events
            .iter()
            .filter(|e| matches!(e, DiscoveryEvent::BridgeConfirmed(_)))
            .count();
        assert_eq!(candidates, 2);
        assert_eq!(confirmed, 1);
    }
}
