//! The trend monitor orchestrator: bounded concurrent fan-out, retry with
//! jittered backoff, dual-key dedup with TTL, sliding-window pruning,
//! scoring, snapshot persistence, metrics emission.
//!
//! `update()` is the only public operation and is not reentrant -- callers
//! must invoke it serially, which is why the dedup maps and event buffer
//! below carry no locking of their own (see the concurrency design note on
//! shared mutable state).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};

use crate::analysis::score_trends;
use crate::clock::{Clock, SystemClock};
use crate::errors::SourceError;
use crate::metrics::MetricsCollector;
use crate::model::{Event, FetchResult, Trend};
use crate::sources::Source;
use crate::storage::SnapshotStore;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub retention: ChronoDuration,
    pub decay_hours: f64,
    pub min_score: f64,
    pub top_k: usize,
    pub dedup_ttl: ChronoDuration,
    pub fetch_concurrency: usize,
    pub fetch_retry_attempts: u32,
    pub fetch_retry_backoff: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retention: ChronoDuration::hours(12),
            decay_hours: 6.0,
            min_score: 0.4,
            top_k: 20,
            dedup_ttl: ChronoDuration::hours(12),
            fetch_concurrency: 5,
            fetch_retry_attempts: 3,
            fetch_retry_backoff: 2.0,
        }
    }
}

pub struct TrendMonitor {
    sources: Vec<Box<dyn Source>>,
    config: MonitorConfig,
    storage: Option<Arc<SnapshotStore>>,
    metrics: Arc<MetricsCollector>,
    clock: Arc<dyn Clock>,
    events: VecDeque<Event>,
    seen_by_id: HashMap<String, DateTime<Utc>>,
    seen_by_fp: HashMap<String, DateTime<Utc>>,
}

impl TrendMonitor {
    pub fn new(
        sources: Vec<Box<dyn Source>>,
        config: MonitorConfig,
        storage: Option<Arc<SnapshotStore>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self::with_clock(sources, config, storage, metrics, Arc::new(SystemClock))
    }

    pub fn with_clock(
        sources: Vec<Box<dyn Source>>,
        config: MonitorConfig,
        storage: Option<Arc<SnapshotStore>>,
        metrics: Arc<MetricsCollector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sources,
            config,
            storage,
            metrics,
            clock,
            events: VecDeque::new(),
            seen_by_id: HashMap::new(),
            seen_by_fp: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub async fn update(&mut self) -> (DateTime<Utc>, Vec<Trend>) {
        let now = self.clock.now();
        let now_naive = now.naive_utc();
        let start = self.clock.monotonic_now();

        let results = self.fetch_all().await;

        let mut new_events = 0usize;
        for (source_name, succeeded, result) in results {
            if succeeded {
                self.metrics.record_fetch_success(&source_name, result.not_modified);
            }
            for item in result.items {
                let fingerprint = item.fingerprint();
                let id_seen = self
                    .seen_by_id
                    .get(&item.id)
                    .map(|expiry| *expiry > now)
                    .unwrap_or(false);
                let fp_seen = self
                    .seen_by_fp
                    .get(&fingerprint)
                    .map(|expiry| *expiry > now)
                    .unwrap_or(false);
                if id_seen || fp_seen {
                    continue;
                }

                let expiry = now + self.config.dedup_ttl;
                self.seen_by_id.insert(item.id.clone(), expiry);
                self.seen_by_fp.insert(fingerprint.clone(), expiry);
                self.events.push_back(Event {
                    source: source_name.clone(),
                    item,
                    fingerprint,
                    seen_at: now,
                });
                new_events += 1;
            }
        }
        self.metrics.record_new_events(new_events);

        self.prune(now_naive);
        self.sweep_dedup(now);

        let items: Vec<_> = self.events.iter().map(|e| e.item.clone()).collect();
        let decay_hours = self.config.decay_hours;
        let trends = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            score_trends(&items, now_naive, decay_hours, 1.0, 0.6)
        }))
        .unwrap_or_else(|_| {
            tracing::error!("analysis engine panicked on valid input, returning no trends this iteration");
            Vec::new()
        });
        let mut filtered: Vec<Trend> = trends
            .into_iter()
            .filter(|trend| trend.score >= self.config.min_score)
            .collect();
        filtered.truncate(self.config.top_k);

        if let Some(storage) = &self.storage {
            match storage.save(&filtered, now_naive).await {
                Ok(()) => self.metrics.record_snapshot_saved(),
                Err(err) => tracing::error!(%err, "failed to persist snapshot, iteration still returns trends"),
            }
        }

        let elapsed = self.clock.monotonic_now().duration_since(start);
        self.metrics.record_iteration_duration(elapsed.as_secs_f64());

        (now, filtered)
    }

    async fn fetch_all(&mut self) -> Vec<(String, bool, FetchResult)> {
        let concurrency = self.config.fetch_concurrency.max(1);
        let monitor_attempts = self.config.fetch_retry_attempts;
        let monitor_backoff = self.config.fetch_retry_backoff;
        let metrics = Arc::clone(&self.metrics);

        let names: Vec<String> = self.sources.iter().map(|s| s.name().to_string()).collect();
        let futures = self.sources.iter_mut().map(|source| {
            let metrics = Arc::clone(&metrics);
            async move { fetch_with_retry(source.as_mut(), monitor_attempts, monitor_backoff, &metrics).await }
        });

        let results: Vec<(bool, FetchResult)> = stream::iter(futures).buffered(concurrency).collect().await;
        names
            .into_iter()
            .zip(results)
            .map(|(name, (succeeded, result))| (name, succeeded, result))
            .collect()
    }

    fn prune(&mut self, now_naive: chrono::NaiveDateTime) {
        let threshold = now_naive - self.config.retention;
        while let Some(front) = self.events.front() {
            if front.item.published < threshold {
                let event = self.events.pop_front().expect("front just checked Some");
                self.seen_by_id.remove(&event.item.id);
                self.seen_by_fp.remove(&event.fingerprint);
            } else {
                break;
            }
        }
    }

    fn sweep_dedup(&mut self, now: DateTime<Utc>) {
        self.seen_by_id.retain(|_, expiry| *expiry > now);
        self.seen_by_fp.retain(|_, expiry| *expiry > now);
    }
}

/// Retry a single source's fetch up to `attempts` times (the source's own
/// config overrides the monitor defaults). Never returns `Err`: the final
/// failure is logged and an empty `FetchResult` is handed back so the
/// iteration continues.
async fn fetch_with_retry(
    source: &mut dyn Source,
    monitor_attempts: u32,
    monitor_backoff: f64,
    metrics: &MetricsCollector,
) -> (bool, FetchResult) {
    let name = source.name().to_string();
    let config = source.config();
    let attempts = config.max_retries.unwrap_or(monitor_attempts).max(1);
    let backoff = config.retry_backoff.unwrap_or(monitor_backoff).max(0.0);

    for attempt in 1..=attempts {
        metrics.record_fetch_attempt(&name);
        match source.fetch().await {
            Ok(result) => return (true, result),
            Err(err) => {
                if attempt == attempts {
                    tracing::warn!(source = %name, error = %err, attempt, attempts, "fetch failed, giving up");
                    metrics.record_fetch_failure(&name);
                    break;
                }
                let delay = if backoff <= 1.0 { backoff } else { backoff.powi((attempt - 1) as i32) };
                let jitter = 0.5 + fastrand::f64();
                let sleep_secs = (delay * jitter).max(0.0);
                tracing::warn!(source = %name, error = %err, attempt, attempts, delay = sleep_secs, "fetch failed, retrying");
                metrics.record_retry(&name);
                if sleep_secs > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(sleep_secs)).await;
                }
            }
        }
    }
    (false, FetchResult::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_clock::TestClock;
    use crate::model::{SourceConfig, SourceItem};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct ScriptedSource {
        config: SourceConfig,
        script: Mutex<Vec<Result<FetchResult, SourceError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(name: &str, script: Vec<Result<FetchResult, SourceError>>) -> Self {
            Self {
                config: SourceConfig::new(name, "https://example.com"),
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Source for ScriptedSource {
        fn name(&self) -> &str {
            &self.config.name
        }
        fn config(&self) -> &SourceConfig {
            &self.config
        }
        async fn fetch(&mut self) -> Result<FetchResult, SourceError> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Ok(FetchResult::empty());
            }
            script.remove(0)
        }
    }

    fn item(id: &str, published: chrono::NaiveDateTime) -> SourceItem {
        SourceItem {
            id: id.to_string(),
            title: "Breaking keyword story".to_string(),
            url: "https://example.com/a".to_string(),
            published,
            summary: None,
            language: Some("en".to_string()),
        }
    }

    fn default_config() -> MonitorConfig {
        MonitorConfig {
            retention: ChronoDuration::hours(12),
            decay_hours: 6.0,
            min_score: 0.0,
            top_k: 20,
            dedup_ttl: ChronoDuration::hours(12),
            fetch_concurrency: 5,
            fetch_retry_attempts: 3,
            fetch_retry_backoff: 2.0,
        }
    }

    #[tokio::test]
    async fn dedup_idempotence_admits_same_id_once() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let clock = Arc::new(TestClock::new(DateTime::from_naive_utc_and_offset(now, Utc)));
        let source = ScriptedSource::new(
            "dup",
            vec![Ok(FetchResult {
                items: vec![item("1", now), item("1", now)],
                not_modified: false,
                headers: None,
            })],
        );
        let mut monitor = TrendMonitor::with_clock(
            vec![Box::new(source)],
            default_config(),
            None,
            Arc::new(MetricsCollector::disabled()),
            clock,
        );
        monitor.update().await;
        assert_eq!(monitor.event_count(), 1);
    }

    #[tokio::test]
    async fn ttl_expiry_sweeps_dedup_entries() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let clock = Arc::new(TestClock::new(DateTime::from_naive_utc_and_offset(now, Utc)));
        let mut config = default_config();
        config.dedup_ttl = ChronoDuration::minutes(10);
        config.retention = ChronoDuration::minutes(10);
        let source = ScriptedSource::new(
            "ttl",
            vec![Ok(FetchResult {
                items: vec![item("1", now)],
                not_modified: false,
                headers: None,
            })],
        );
        let mut monitor = TrendMonitor::with_clock(vec![Box::new(source)], config, None, Arc::new(MetricsCollector::disabled()), clock.clone());
        monitor.update().await;
        assert_eq!(monitor.seen_by_id.len(), 1);

        clock.advance(ChronoDuration::minutes(25));
        monitor.update().await;
        assert!(monitor.seen_by_id.is_empty());
        assert!(monitor.seen_by_fp.is_empty());
    }

    #[tokio::test]
    async fn retention_drops_events_older_than_window() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let clock = Arc::new(TestClock::new(DateTime::from_naive_utc_and_offset(now, Utc)));
        let mut config = default_config();
        config.retention = ChronoDuration::hours(1);
        let old_item = item("old", now - ChronoDuration::hours(2));
        let fresh_item = item("fresh", now);
        let source = ScriptedSource::new(
            "retention",
            vec![Ok(FetchResult {
                items: vec![old_item, fresh_item],
                not_modified: false,
                headers: None,
            })],
        );
        let mut monitor = TrendMonitor::with_clock(vec![Box::new(source)], config, None, Arc::new(MetricsCollector::disabled()), clock);
        monitor.update().await;
        assert_eq!(monitor.event_count(), 1);
    }

    #[tokio::test]
    async fn retry_then_success_is_observed_after_two_attempts() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let clock = Arc::new(TestClock::new(DateTime::from_naive_utc_and_offset(now, Utc)));
        let mut config = default_config();
        config.fetch_retry_backoff = 0.0;
        let source = ScriptedSource::new(
            "flaky",
            vec![
                Err(SourceError::timeout("https://example.com")),
                Ok(FetchResult {
                    items: vec![item("1", now)],
                    not_modified: false,
                    headers: None,
                }),
            ],
        );
        let calls_probe = std::sync::Arc::new(());
        let _ = calls_probe;
        let boxed: Box<dyn Source> = Box::new(source);
        let mut monitor = TrendMonitor::with_clock(vec![boxed], config, None, Arc::new(MetricsCollector::disabled()), clock);
        monitor.update().await;
        assert_eq!(monitor.event_count(), 1);
    }
}
