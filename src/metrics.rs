//! Counter registry with an in-memory snapshot (used by tests and the
//! `snapshot()` accessor) plus an optional Prometheus exporter.
//!
//! When the `prometheus` feature is disabled, or no port was configured, the
//! typed `metrics::counter!`/`histogram!` calls simply have no recorder
//! installed and become no-ops; the in-memory snapshot keeps working either
//! way, matching the "capability with default no-op fallback" design note.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub port: Option<u16>,
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: None,
            addr: "0.0.0.0".to_string(),
        }
    }
}

pub struct MetricsCollector {
    snapshot: Mutex<HashMap<String, f64>>,
}

impl MetricsCollector {
    pub fn new(config: &MetricsConfig) -> Self {
        let collector = Self {
            snapshot: Mutex::new(HashMap::from([
                ("fetch_attempts".to_string(), 0.0),
                ("fetch_success".to_string(), 0.0),
                ("fetch_not_modified".to_string(), 0.0),
                ("fetch_failures".to_string(), 0.0),
                ("fetch_retries".to_string(), 0.0),
                ("new_events".to_string(), 0.0),
                ("snapshots_saved".to_string(), 0.0),
            ])),
        };

        if let Some(port) = config.port {
            collector.install_exporter(&config.addr, port);
        }

        collector
    }

    pub fn disabled() -> Self {
        Self::new(&MetricsConfig::default())
    }

    #[cfg(feature = "prometheus")]
    fn install_exporter(&self, addr: &str, port: u16) {
        let socket: Result<SocketAddr, _> = format!("{addr}:{port}").parse();
        match socket {
            Ok(socket) => {
                match metrics_exporter_prometheus::PrometheusBuilder::new()
                    .with_http_listener(socket)
                    .install()
                {
                    Ok(()) => tracing::info!(%addr, port, "started Prometheus metrics exporter"),
                    Err(err) => tracing::warn!(%err, "failed to start Prometheus exporter"),
                }
            }
            Err(err) => tracing::warn!(%err, addr, port, "invalid metrics bind address"),
        }
    }

    #[cfg(not(feature = "prometheus"))]
    fn install_exporter(&self, _addr: &str, _port: u16) {
        tracing::warn!("Prometheus metrics requested but the prometheus feature is not compiled in");
    }

    fn inc(&self, key: &str, amount: f64) {
        let mut snapshot = self.snapshot.lock().unwrap();
        *snapshot.entry(key.to_string()).or_insert(0.0) += amount;
    }

    pub fn record_fetch_attempt(&self, source: &str) {
        self.inc("fetch_attempts", 1.0);
        metrics::counter!("trend_monitor_fetch_attempts_total", "source" => source.to_string()).increment(1);
    }

    pub fn record_fetch_success(&self, source: &str, not_modified: bool) {
        if not_modified {
            self.inc("fetch_not_modified", 1.0);
            metrics::counter!("trend_monitor_fetch_not_modified_total", "source" => source.to_string())
                .increment(1);
        } else {
            self.inc("fetch_success", 1.0);
            metrics::counter!("trend_monitor_fetch_success_total", "source" => source.to_string()).increment(1);
        }
    }

    pub fn record_fetch_failure(&self, source: &str) {
        self.inc("fetch_failures", 1.0);
        metrics::counter!("trend_monitor_fetch_failure_total", "source" => source.to_string()).increment(1);
    }

    pub fn record_retry(&self, source: &str) {
        self.inc("fetch_retries", 1.0);
        metrics::counter!("trend_monitor_fetch_retry_total", "source" => source.to_string()).increment(1);
    }

    pub fn record_iteration_duration(&self, seconds: f64) {
        metrics::histogram!("trend_monitor_iteration_duration_seconds").record(seconds);
    }

    pub fn record_new_events(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.inc("new_events", count as f64);
        metrics::counter!("trend_monitor_new_events_total").increment(count as u64);
    }

    pub fn record_snapshot_saved(&self) {
        self.inc("snapshots_saved", 1.0);
        metrics::counter!("trend_monitor_snapshots_saved_total").increment(1);
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.snapshot.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_snapshot_updates_without_an_exporter() {
        let collector = MetricsCollector::disabled();
        collector.record_fetch_attempt("hn");
        collector.record_fetch_success("hn", false);
        collector.record_new_events(3);
        let snapshot = collector.snapshot();
        assert_eq!(snapshot["fetch_attempts"], 1.0);
        assert_eq!(snapshot["fetch_success"], 1.0);
        assert_eq!(snapshot["new_events"], 3.0);
    }

    #[test]
    fn zero_new_events_is_a_noop() {
        let collector = MetricsCollector::disabled();
        collector.record_new_events(0);
        assert_eq!(collector.snapshot()["new_events"], 0.0);
    }
}
