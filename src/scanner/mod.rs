//! Core functionality for actual scanning behaviour.
mod connector;
pub use connector::{Connector, TcpConnector};

use crate::endpoint::{Endpoint, EndpointSet, EndpointStatus};
use crate::input::{ScanOrder, DEFAULT_CEILING};
use log::{debug, info};

use colored::Colorize;
use futures::{stream, StreamExt};
use rand::seq::SliceRandom;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::UnboundedSender;

/// Sink for outcomes as they settle, before the scan is over.
pub type Progress = UnboundedSender<(Endpoint, EndpointStatus)>;

/// Connects to every endpoint of a set exactly once.
///
/// At most `ceiling` connect attempts are in flight at any moment. Each
/// attempt runs on its own tokio task; outcomes are funnelled back to the
/// scanner, which is the only writer of the set.
///
/// With [`output`](Scanner::output) set, every outcome is printed the
/// moment it settles rather than after the whole scan.
///
/// ```rust,no_run
/// # use std::time::Duration;
/// # use reachscan::{input::RunningConfig, scanner::Scanner, target::load};
/// # async fn scan() -> Result<(), reachscan::error::SpecError> {
/// let targets = load("127.0.0.1:22-25".as_bytes(), RunningConfig::default())?;
/// let timeout = Duration::from_secs(targets.config.timeout_secs);
///
/// let results = Scanner::new(targets.endpoints, timeout, 5).run().await;
/// for (endpoint, status) in &results {
///     println!("{endpoint} - {}", status.is_reachable());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Scanner<C = TcpConnector> {
    endpoints: EndpointSet,
    ceiling: usize,
    order: ScanOrder,
    connector: Arc<C>,
    output: Option<OutputMode>,
    progress: Option<Progress>,
}

/// How settled endpoints are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    pub greppable: bool,
    pub accessible: bool,
}

impl OutputMode {
    /// Formats one result line.
    ///
    /// Greppable mode prints only `address:port - true/false`; otherwise a
    /// failure carries its reason and, unless accessible, colour.
    pub fn line(self, endpoint: &Endpoint, status: &EndpointStatus) -> String {
        let line = format!("{endpoint} - {}", status.is_reachable());
        if self.greppable {
            return line;
        }
        match status {
            EndpointStatus::Reachable if self.accessible => line,
            EndpointStatus::Reachable => line.green().to_string(),
            EndpointStatus::Unreachable(reason) if self.accessible => format!("{line} ({reason})"),
            EndpointStatus::Unreachable(reason) => format!("{} ({reason})", line.red()),
            EndpointStatus::Unknown if self.accessible => line,
            EndpointStatus::Unknown => line.yellow().to_string(),
        }
    }
}

impl Scanner<TcpConnector> {
    pub fn new(endpoints: EndpointSet, timeout: Duration, ceiling: usize) -> Self {
        Self::with_connector(endpoints, TcpConnector::new(timeout), ceiling)
    }
}

impl<C: Connector> Scanner<C> {
    /// A ceiling of 0 is corrected to 1.
    pub fn with_connector(endpoints: EndpointSet, connector: C, ceiling: usize) -> Self {
        Self {
            endpoints,
            ceiling: ceiling.max(1),
            order: ScanOrder::Serial,
            connector: Arc::new(connector),
            output: None,
            progress: None,
        }
    }

    /// Print each outcome as soon as it is known.
    #[must_use]
    pub fn output(mut self, greppable: bool, accessible: bool) -> Self {
        self.output = Some(OutputMode {
            greppable,
            accessible,
        });
        self
    }

    /// Also send each outcome to `progress` as soon as it is known.
    #[must_use]
    pub fn progress(mut self, progress: Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn order(mut self, order: ScanOrder) -> Self {
        self.order = order;
        self
    }

    pub const fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Runs the scan and hands back the set with every endpoint settled.
    ///
    /// Connection failures, including timeouts, are recorded as
    /// [`EndpointStatus::Unreachable`]; this never fails as a whole.
    pub async fn run(self) -> EndpointSet {
        let Self {
            mut endpoints,
            ceiling,
            order,
            connector,
            output,
            progress,
        } = self;

        let mut queue: Vec<Endpoint> = endpoints.endpoints().collect();
        if order == ScanOrder::Random {
            queue.shuffle(&mut rand::rng());
        }

        debug!(
            "Start scanning endpoints. \nCeiling {}\nOrder {:?}\nTargets all together {}",
            ceiling,
            order,
            queue.len()
        );

        let mut outcomes = stream::iter(queue)
            .map(|endpoint| {
                let connector = Arc::clone(&connector);
                async move {
                    let socket = endpoint.socket_addr();
                    let attempt = tokio::spawn(async move { connector.connect(socket).await });
                    let status = match attempt.await {
                        Ok(Ok(())) => EndpointStatus::Reachable,
                        Ok(Err(e)) => EndpointStatus::Unreachable(e.to_string()),
                        Err(e) => EndpointStatus::Unreachable(e.to_string()),
                    };
                    (endpoint, status)
                }
            })
            .buffer_unordered(ceiling);

        while let Some((endpoint, status)) = outcomes.next().await {
            debug!("{endpoint} settled as {status:?}");
            if let Some(mode) = output {
                println!("{}", mode.line(&endpoint, &status));
            }
            if let Some(tx) = &progress {
                if tx.send((endpoint, status.clone())).is_err() {
                    debug!("Progress receiver dropped");
                }
            }
            endpoints.settle(endpoint, status);
        }

        info!(
            "Scan finished: {} of {} endpoints reachable",
            endpoints.reachable().count(),
            endpoints.len()
        );
        endpoints
    }
}

impl Default for Scanner<TcpConnector> {
    fn default() -> Self {
        Self::new(
            EndpointSet::new(),
            Duration::from_secs(crate::input::DEFAULT_TIMEOUT_SECS),
            DEFAULT_CEILING,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::encode;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{mpsc, Notify};
    use tokio::{io, net::TcpListener, time};

    /// Records how many attempts overlap and answers by port parity.
    #[derive(Default)]
    struct Gauge {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    struct GaugedConnector(Arc<Gauge>);

    impl Connector for GaugedConnector {
        async fn connect(&self, socket: SocketAddr) -> io::Result<()> {
            let gauge = &self.0;
            gauge.calls.fetch_add(1, Ordering::SeqCst);
            let now = gauge.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            gauge.peak.fetch_max(now, Ordering::SeqCst);

            time::sleep(Duration::from_millis(20)).await;

            gauge.in_flight.fetch_sub(1, Ordering::SeqCst);
            if socket.port() % 2 == 0 {
                Ok(())
            } else {
                Err(io::Error::from(io::ErrorKind::ConnectionRefused))
            }
        }
    }

    /// Port 2 hangs until the gate opens; everything else connects at once.
    struct GatedConnector(Arc<Notify>);

    impl Connector for GatedConnector {
        async fn connect(&self, socket: SocketAddr) -> io::Result<()> {
            if socket.port() == 2 {
                self.0.notified().await;
                return Err(io::Error::from(io::ErrorKind::TimedOut));
            }
            Ok(())
        }
    }

    struct PanickingConnector;

    impl Connector for PanickingConnector {
        async fn connect(&self, _: SocketAddr) -> io::Result<()> {
            panic!("connector blew up");
        }
    }

    fn endpoint_set(address: &str, ports: std::ops::RangeInclusive<u16>) -> EndpointSet {
        let address = encode(address).unwrap();
        let mut set = EndpointSet::new();
        for port in ports {
            set.insert(Endpoint::new(address, port));
        }
        set
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_the_ceiling() {
        let gauge = Arc::new(Gauge::default());
        let set = endpoint_set("10.0.0.1", 1..=40);

        let results = Scanner::with_connector(set, GaugedConnector(Arc::clone(&gauge)), 4)
            .run()
            .await;

        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "peak concurrency was {peak}");
        assert!(peak > 1, "attempts never overlapped");
        assert_eq!(gauge.calls.load(Ordering::SeqCst), 40);
        assert_eq!(gauge.in_flight.load(Ordering::SeqCst), 0);

        assert_eq!(results.len(), 40);
        assert_eq!(results.pending(), 0);
        assert_eq!(results.reachable().count(), 20);
    }

    #[tokio::test]
    async fn zero_ceiling_runs_one_at_a_time() {
        let gauge = Arc::new(Gauge::default());
        let set = endpoint_set("10.0.0.1", 1..=5);

        let scanner = Scanner::with_connector(set, GaugedConnector(Arc::clone(&gauge)), 0);
        assert_eq!(scanner.ceiling(), 1);
        let results = scanner.run().await;

        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
        assert_eq!(results.pending(), 0);
    }

    #[tokio::test]
    async fn random_order_settles_everything() {
        let gauge = Arc::new(Gauge::default());
        let set = endpoint_set("10.0.0.1", 100..=130);

        let results = Scanner::with_connector(set, GaugedConnector(Arc::clone(&gauge)), 8)
            .order(ScanOrder::Random)
            .run()
            .await;

        assert_eq!(results.len(), 31);
        assert_eq!(results.pending(), 0);
        assert_eq!(gauge.calls.load(Ordering::SeqCst), 31);
    }

    #[tokio::test]
    async fn empty_set_returns_immediately() {
        let results = Scanner::<TcpConnector>::default().run().await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn panicking_connector_is_unreachable() {
        let set = endpoint_set("10.0.0.1", 80..=81);
        let results = Scanner::with_connector(set, PanickingConnector, 2).run().await;

        assert_eq!(results.pending(), 0);
        assert!(results
            .iter()
            .all(|(_, status)| matches!(status, EndpointStatus::Unreachable(_))));
    }

    #[tokio::test]
    async fn local_listener_is_reachable_and_closed_port_is_not() {
        let open = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = open.local_addr().unwrap().port();
        let closed_port = closed.local_addr().unwrap().port();
        drop(closed);

        let localhost = encode("127.0.0.1").unwrap();
        let mut set = EndpointSet::new();
        set.insert(Endpoint::new(localhost, open_port));
        set.insert(Endpoint::new(localhost, closed_port));

        let results = Scanner::new(set, Duration::from_secs(2), 5).run().await;

        assert_eq!(
            results.status(&Endpoint::new(localhost, open_port)),
            Some(&EndpointStatus::Reachable)
        );
        assert!(matches!(
            results.status(&Endpoint::new(localhost, closed_port)),
            Some(EndpointStatus::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn outcomes_are_reported_before_the_scan_ends() {
        let gate = Arc::new(Notify::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let set = endpoint_set("10.0.0.1", 1..=2);

        let scan = tokio::spawn(
            Scanner::with_connector(set, GatedConnector(Arc::clone(&gate)), 2)
                .output(true, false)
                .progress(tx)
                .run(),
        );

        let (first, status) = rx.recv().await.unwrap();
        assert_eq!(first.port, 1);
        assert_eq!(status, EndpointStatus::Reachable);
        assert!(!scan.is_finished(), "scan ended before port 2 settled");

        gate.notify_one();
        let results = scan.await.unwrap();

        let (second, status) = rx.recv().await.unwrap();
        assert_eq!(second.port, 2);
        assert!(matches!(status, EndpointStatus::Unreachable(_)));
        assert!(rx.recv().await.is_none());
        assert_eq!(results.pending(), 0);
    }

    #[test]
    fn result_lines_per_output_mode() {
        let endpoint = Endpoint::new(encode("10.0.0.1").unwrap(), 22);
        let refused = EndpointStatus::Unreachable("connection refused".to_owned());

        let greppable = OutputMode {
            greppable: true,
            accessible: false,
        };
        assert_eq!(greppable.line(&endpoint, &EndpointStatus::Reachable), "10.0.0.1:22 - true");
        assert_eq!(greppable.line(&endpoint, &refused), "10.0.0.1:22 - false");

        let accessible = OutputMode {
            greppable: false,
            accessible: true,
        };
        assert_eq!(
            accessible.line(&endpoint, &refused),
            "10.0.0.1:22 - false (connection refused)"
        );
    }

    #[tokio::test]
    async fn quad_zero_scanner_runs() {
        // Makes sure the program still runs and doesn't panic
        let set = endpoint_set("0.0.0.0", 1..=20);
        let results = Scanner::new(set, Duration::from_millis(200), 10).run().await;
        assert_eq!(results.pending(), 0);
    }
}
