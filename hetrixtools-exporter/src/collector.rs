//! On-demand collector that maps HetrixTools monitors to Prometheus gauges.
//!
//! Every scrape builds a fresh [`Registry`], declares the gauge families, asks
//! the upstream API for the current monitor list and fills the families with
//! one sample per (monitor, location) pair. Nothing is cached between scrapes.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use parking_lot::RwLock;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tracing::{debug, error};

use crate::api::Monitor;
use crate::client::{ClientError, HetrixClient};
use crate::config::ApiConfig;

type GaugeF64 = Gauge<f64, AtomicU64>;

/// Labels of the up/down status gauge.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StatusLabels {
    pub id: String,
    pub name: String,
    pub target: String,
    pub location: String,
    /// "up" or "down"
    pub status_text: String,
}

/// Labels of the response time gauge.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResponseTimeLabels {
    pub id: String,
    pub name: String,
    pub location: String,
    pub target: String,
    /// Monitor timeout in seconds.
    pub timeout: String,
}

/// The two gauge families exported per scrape.
#[derive(Debug, Default)]
pub struct MonitorMetrics {
    status: Family<StatusLabels, GaugeF64>,
    response_time: Family<ResponseTimeLabels, GaugeF64>,
}

impl MonitorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare both families in the registry.
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "uptime_monitor_status",
            "Uptime status of recent monitor check (1 for up, 0 for down)",
            self.status.clone(),
        );
        registry.register(
            "uptime_monitor_response_time_seconds",
            "Response time of recent monitor check in seconds",
            self.response_time.clone(),
        );
    }

    /// Set one status and one response time sample per monitor location.
    ///
    /// A (monitor id, location) pair seen twice, e.g. when pagination shifts
    /// between page fetches, keeps its first occurrence. Returns the number of
    /// distinct pairs recorded.
    pub fn record(&self, monitors: &[Monitor]) -> usize {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();

        for monitor in monitors {
            let id = escape_label_value(&monitor.id);
            let name = escape_label_value(&monitor.name);
            let target = escape_label_value(&monitor.target);

            for (location, check) in &monitor.locations {
                if !seen.insert((monitor.id.as_str(), location.as_str())) {
                    debug!(id = %monitor.id, location = %location, "Skipping duplicate monitor location");
                    continue;
                }

                let location = escape_label_value(location);
                let (value, status_text) = if check.is_up() {
                    (1.0, "up")
                } else {
                    (0.0, "down")
                };

                self.status
                    .get_or_create(&StatusLabels {
                        id: id.clone(),
                        name: name.clone(),
                        target: target.clone(),
                        location: location.clone(),
                        status_text: status_text.to_string(),
                    })
                    .set(value);

                self.response_time
                    .get_or_create(&ResponseTimeLabels {
                        id: id.clone(),
                        name: name.clone(),
                        location,
                        target: target.clone(),
                        timeout: monitor.timeout.to_string(),
                    })
                    .set(check.response_time / 1000.0);
            }
        }

        seen.len()
    }
}

/// Escape special characters in label values.
///
/// The prometheus-client text encoder writes label values verbatim.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Scrape statistics.
#[derive(Debug, Clone, Default)]
pub struct CollectorStats {
    /// Total scrapes handled.
    pub scrapes_total: u64,
    /// Scrapes where the upstream fetch failed.
    pub scrapes_failed: u64,
    /// Scrapes rejected by the upstream rate limiter.
    pub scrapes_rate_limited: u64,
    /// Monitors returned by the last successful fetch.
    pub last_monitor_count: usize,
    /// (monitor, location) pairs exported by the last successful fetch.
    pub last_sample_pairs: usize,
}

impl CollectorStats {
    /// Number of scrapes that reached the API and decoded successfully.
    pub fn scrapes_succeeded(&self) -> u64 {
        self.scrapes_total - self.scrapes_failed
    }
}

/// Collector invoked once per scrape request.
pub struct MonitorCollector {
    client: HetrixClient,
    namespace: String,
    stats: RwLock<CollectorStats>,
}

impl MonitorCollector {
    /// Create a new collector.
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: HetrixClient::new(config)?,
            namespace: config.namespace.clone(),
            stats: RwLock::new(CollectorStats::default()),
        })
    }

    /// Fetch monitors and build a registry holding this scrape's samples.
    ///
    /// Upstream failures are logged and yield a registry with the families
    /// declared but no samples.
    pub async fn collect(&self) -> Registry {
        let mut registry = if self.namespace.is_empty() {
            Registry::default()
        } else {
            Registry::with_prefix(&self.namespace)
        };
        let metrics = MonitorMetrics::new();
        metrics.register(&mut registry);

        let started = Instant::now();
        let result = self.client.fetch_monitors().await;

        let mut stats = self.stats.write();
        stats.scrapes_total += 1;

        match result {
            Ok(monitors) => {
                let pairs = metrics.record(&monitors);
                stats.last_monitor_count = monitors.len();
                stats.last_sample_pairs = pairs;
                debug!(
                    monitors = monitors.len(),
                    pairs,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Collected HetrixTools monitors"
                );
            }
            Err(e) => {
                stats.scrapes_failed += 1;
                if matches!(e, ClientError::RateLimited { .. }) {
                    stats.scrapes_rate_limited += 1;
                }
                error!(error = %e, "Failed to collect HetrixTools monitors");
            }
        }

        registry
    }

    /// Run a scrape and render it in the text exposition format.
    pub async fn render(&self) -> Result<String, std::fmt::Error> {
        let registry = self.collect().await;
        let mut output = String::new();
        encode(&mut output, &registry)?;
        Ok(output)
    }

    /// Get collector statistics.
    pub fn stats(&self) -> CollectorStats {
        self.stats.read().clone()
    }
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<MonitorCollector>;
