//! Query monitor: the in-process collector every observed call flows through
//!
//! ## Architecture
//!
//! ```text
//! Instrumentation adapter
//!     ↓ track() (synchronous, no I/O)
//! QueryMonitor ── bounded ring buffers + counters
//!     ↓ slow entries
//! SlowQuerySink (slow-query logger queue)
//! ```
//!
//! Both buffers are lossy: when full, the oldest entry is evicted. Capacity is
//! configuration, not a hidden constant.

pub mod signature;
pub mod stats;
pub mod thresholds;
pub mod types;

pub use thresholds::{PerformanceThresholds, ThresholdPair};
pub use types::{
    ExecutionRecord, PerformanceStats, QueryMetric, Rollup, Severity, SeverityLevel,
    SlowQueryLogEntry, TimeRange,
};

use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Receiver for slow entries; implemented by the slow-query logger
///
/// Implementations must not block: `accept` runs on the instrumented call path.
pub trait SlowQuerySink: Send + Sync {
    fn accept(&self, entry: SlowQueryLogEntry);
}

/// Bounded in-memory collector with severity classification
pub struct QueryMonitor {
    thresholds: PerformanceThresholds,
    environment: String,
    max_metrics: usize,
    max_slow_queries: usize,
    metrics: Mutex<VecDeque<QueryMetric>>,
    slow_queries: Mutex<VecDeque<SlowQueryLogEntry>>,
    total_calls: AtomicU64,
    failure_count: AtomicU64,
    sink: Option<Arc<dyn SlowQuerySink>>,
    clock: Arc<dyn Clock>,
}

impl QueryMonitor {
    /// Create a monitor; thresholds and capacities are validated here
    pub fn new(config: &MonitorConfig, environment: impl Into<String>, clock: Arc<dyn Clock>) -> Result<Self> {
        config.thresholds.validate()?;
        if config.max_metrics == 0 || config.max_slow_queries == 0 {
            return Err(MonitorError::InvalidConfig(
                "monitor buffer capacities must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            thresholds: config.thresholds.clone(),
            environment: environment.into(),
            max_metrics: config.max_metrics,
            max_slow_queries: config.max_slow_queries,
            metrics: Mutex::new(VecDeque::with_capacity(config.max_metrics.min(1024))),
            slow_queries: Mutex::new(VecDeque::with_capacity(config.max_slow_queries.min(1024))),
            total_calls: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            sink: None,
            clock,
        })
    }

    /// Forward every slow entry to `sink` in addition to the in-memory buffer
    pub fn with_sink(mut self, sink: Arc<dyn SlowQuerySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Ingest one observed call
    ///
    /// Never fails and never performs I/O. A record with `error` set also
    /// bumps the failure counter.
    pub fn track(&self, record: ExecutionRecord) {
        let severity = self
            .thresholds
            .severity(&record.model, &record.action, record.duration_ms);
        let query_hash = signature::query_hash(&record.model, &record.action, &record.args_fingerprint);
        let metric = QueryMetric::new(record, query_hash, severity);

        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if metric.failed() {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
            crate::metrics::record_failure(metric.model(), metric.action());
        }
        crate::metrics::record_query(metric.model(), metric.action(), severity, metric.duration_ms());

        if metric.is_slow {
            let entry = SlowQueryLogEntry::new(metric.clone(), self.environment.clone());
            push_bounded(&mut lock(&self.slow_queries), entry.clone(), self.max_slow_queries);

            tracing::debug!(
                model = %metric.model(),
                action = %metric.action(),
                duration_ms = metric.duration_ms(),
                severity = %severity,
                "Slow query tracked"
            );

            if let Some(sink) = &self.sink {
                sink.accept(entry);
            }
        }

        push_bounded(&mut lock(&self.metrics), metric, self.max_metrics);
    }

    /// Count a failed call that produced no execution record
    pub fn track_failure(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_severity(&self, model: &str, action: &str, duration_ms: u64) -> SeverityLevel {
        self.thresholds.severity(model, action, duration_ms).into()
    }

    /// Most recent `limit` metrics (all when `None`), oldest first
    pub fn get_metrics(&self, limit: Option<usize>) -> Vec<QueryMetric> {
        tail(&lock(&self.metrics), limit)
    }

    /// Metrics whose timestamp falls inside `range`, oldest first
    pub fn get_metrics_in_range(&self, range: TimeRange) -> Vec<QueryMetric> {
        lock(&self.metrics)
            .iter()
            .filter(|m| range.contains(m.timestamp()))
            .cloned()
            .collect()
    }

    /// Most recent `limit` slow entries (all when `None`), oldest first
    pub fn get_slow_queries(&self, limit: Option<usize>) -> Vec<SlowQueryLogEntry> {
        tail(&lock(&self.slow_queries), limit)
    }

    /// Snapshot over the whole buffer, or over `time_range` when given
    pub fn get_stats(&self, time_range: Option<TimeRange>) -> PerformanceStats {
        let metrics = lock(&self.metrics);
        match time_range {
            Some(range) => stats::compute_stats(
                metrics.iter().filter(|m| range.contains(m.timestamp())),
                Some(range),
            ),
            None => stats::compute_stats(metrics.iter(), None),
        }
    }

    /// Clear both buffers and all counters
    pub fn reset(&self) {
        lock(&self.metrics).clear();
        lock(&self.slow_queries).clear();
        self.total_calls.store(0, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        tracing::info!("Query monitor reset");
    }

    /// Calls observed since start or last reset, independent of buffer size
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Failed / total calls, 0.0 before any call is observed
    pub fn error_rate(&self) -> f64 {
        let total = self.total_calls();
        if total == 0 {
            return 0.0;
        }
        self.failure_count() as f64 / total as f64
    }

    /// Fraction of buffered metrics served from cache
    pub fn cache_hit_rate(&self) -> f64 {
        let metrics = lock(&self.metrics);
        if metrics.is_empty() {
            return 0.0;
        }
        let cached = metrics.iter().filter(|m| m.record.cached).count();
        cached as f64 / metrics.len() as f64
    }

    pub fn thresholds(&self) -> &PerformanceThresholds {
        &self.thresholds
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn capacity(&self) -> (usize, usize) {
        (self.max_metrics, self.max_slow_queries)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

/// Lock a buffer, recovering from poisoning so observation never panics
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    while buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

fn tail<T: Clone>(buffer: &VecDeque<T>, limit: Option<usize>) -> Vec<T> {
    let skip = limit.map_or(0, |n| buffer.len().saturating_sub(n));
    buffer.iter().skip(skip).cloned().collect()
}
