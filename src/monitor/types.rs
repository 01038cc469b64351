//! Data model shared by the monitor, the slow-query log and the analysis layers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One observed database call, as built by the instrumentation adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub model: String,
    pub action: String,
    /// Call arguments with sensitive fields redacted
    pub args_fingerprint: serde_json::Value,
    pub duration_ms: u64,
    /// Unix milliseconds at completion
    pub timestamp: u64,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn new(model: impl Into<String>, action: impl Into<String>, duration_ms: u64, timestamp: u64) -> Self {
        Self {
            model: model.into(),
            action: action.into(),
            args_fingerprint: serde_json::Value::Null,
            duration_ms,
            timestamp,
            cached: false,
            error: None,
        }
    }

    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args_fingerprint = args;
        self
    }

    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// `Model.action` key used by the N+1 detector and rollups
    pub fn operation(&self) -> String {
        format!("{}.{}", self.model, self.action)
    }
}

/// Latency severity, ordered `Normal < Warning < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    pub fn is_slow(self) -> bool {
        self != Severity::Normal
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a threshold lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityLevel {
    pub is_slow: bool,
    pub severity: Severity,
}

impl From<Severity> for SeverityLevel {
    fn from(severity: Severity) -> Self {
        Self {
            is_slow: severity.is_slow(),
            severity,
        }
    }
}

/// Execution record enriched at ingestion time
///
/// `is_slow == (severity != Normal)` always holds; both are set together by
/// [`QueryMetric::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetric {
    #[serde(flatten)]
    pub record: ExecutionRecord,
    pub query_hash: String,
    pub is_slow: bool,
    pub severity: Severity,
}

impl QueryMetric {
    pub fn new(record: ExecutionRecord, query_hash: String, severity: Severity) -> Self {
        Self {
            record,
            query_hash,
            is_slow: severity.is_slow(),
            severity,
        }
    }

    pub fn model(&self) -> &str {
        &self.record.model
    }

    pub fn action(&self) -> &str {
        &self.record.action
    }

    pub fn duration_ms(&self) -> u64 {
        self.record.duration_ms
    }

    pub fn timestamp(&self) -> u64 {
        self.record.timestamp
    }

    pub fn failed(&self) -> bool {
        self.record.error.is_some()
    }
}

/// Durable form of a slow metric, one NDJSON line per entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowQueryLogEntry {
    #[serde(flatten)]
    pub metric: QueryMetric,
    pub environment: String,
}

impl SlowQueryLogEntry {
    pub fn new(metric: QueryMetric, environment: impl Into<String>) -> Self {
        Self {
            metric,
            environment: environment.into(),
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.metric.timestamp()
    }

    pub fn severity(&self) -> Severity {
        self.metric.severity
    }
}

/// Inclusive time window in Unix milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: u64,
    pub end: u64,
}

impl TimeRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Window of `length_ms` ending at `end`
    pub fn ending_at(end: u64, length_ms: u64) -> Self {
        Self {
            start: end.saturating_sub(length_ms),
            end,
        }
    }

    pub fn contains(&self, timestamp: u64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    pub fn duration_ms(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Window of equal length immediately before this one
    pub fn previous(&self) -> Self {
        let length = self.duration_ms();
        let end = self.start.saturating_sub(1);
        Self {
            start: end.saturating_sub(length),
            end,
        }
    }
}

/// Per-model or per-action aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rollup {
    pub count: u64,
    pub total_duration_ms: u64,
    pub avg_duration_ms: f64,
    pub slow_count: u64,
}

/// Point-in-time statistics over a metric window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total_queries: u64,
    pub slow_queries: u64,
    pub warning_queries: u64,
    pub critical_queries: u64,
    pub failed_queries: u64,
    pub cached_queries: u64,
    pub avg_duration_ms: f64,
    pub median_duration_ms: u64,
    pub p95_duration_ms: u64,
    pub p99_duration_ms: u64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub by_model: BTreeMap<String, Rollup>,
    pub by_action: BTreeMap<String, Rollup>,
    pub top_slowest: Vec<QueryMetric>,
    pub time_range: Option<TimeRange>,
}

impl PerformanceStats {
    /// Percentage of calls in the window classified as slow
    pub fn slow_rate(&self) -> f64 {
        if self.total_queries == 0 {
            return 0.0;
        }
        self.slow_queries as f64 / self.total_queries as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metric() -> QueryMetric {
        let record = ExecutionRecord::new("User", "findMany", 1500, 1_700_000_000_000)
            .with_args(serde_json::json!({"where": {"id": 1}}));
        QueryMetric::new(record, "abcd1234abcd1234".to_string(), Severity::Warning)
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Normal < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert!(!Severity::Normal.is_slow());
        assert!(Severity::Critical.is_slow());
    }

    #[test]
    fn test_metric_slow_flag_matches_severity() {
        let metric = sample_metric();
        assert!(metric.is_slow);

        let normal = QueryMetric::new(metric.record.clone(), metric.query_hash.clone(), Severity::Normal);
        assert!(!normal.is_slow);
    }

    #[test]
    fn test_log_entry_json_is_flat() {
        let entry = SlowQueryLogEntry::new(sample_metric(), "production");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["model"], "User");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["environment"], "production");
        assert_eq!(json["is_slow"], true);

        let parsed: SlowQueryLogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_time_range_previous_window() {
        // 2026-10-18T11:00Z .. 12:00Z
        let range = TimeRange::new(1_792_321_200_000, 1_792_324_800_000);
        let previous = range.previous();
        assert_eq!(previous.end, range.start - 1);
        assert_eq!(previous.duration_ms(), range.duration_ms());
        assert!(!previous.contains(range.start));
        assert!(range.contains(range.start));
        assert!(range.contains(range.end));
        assert!(!range.contains(range.end + 1));
    }

    #[test]
    fn test_time_range_previous_saturates_at_zero() {
        let range = TimeRange::new(10_000, 20_000);
        let previous = range.previous();
        assert_eq!(previous.start, 0);
        assert_eq!(previous.end, 9_999);
        assert!(previous.duration_ms() < range.duration_ms());

        assert_eq!(TimeRange::new(0, 500).previous(), TimeRange::new(0, 0));
    }
}
