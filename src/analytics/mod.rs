//! Query analytics and reporting
//!
//! Everything here is derived on request from the monitor's buffer or the
//! durable log; nothing is cached between calls.

pub mod comparison;
pub mod patterns;
pub mod recommendations;

pub use comparison::{compare_performance, ComparisonStatus, PerformanceComparison};
pub use patterns::{analyze_patterns, QueryPattern, Trend};
pub use recommendations::{generate_recommendations, OptimizationRecommendation, RecommendationKind};

use crate::error::Result;
use crate::monitor::signature::structural_signature;
use crate::monitor::stats::compute_stats;
use crate::monitor::{PerformanceStats, QueryMonitor, Rollup, Severity, SlowQueryLogEntry, TimeRange};
use crate::slow_log::rotation::day_of;
use crate::slow_log::SlowQueryLogger;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const HOUR_MS: u64 = 60 * 60 * 1000;
pub const DAY_MS: u64 = 24 * HOUR_MS;

const TOP_PATTERNS: usize = 10;
const TOP_RECOMMENDATIONS: usize = 10;
const TOP_SIGNATURES: usize = 10;
const HIGHLIGHTS: usize = 5;

/// Patterns worth a look regardless of recommendations
const PROBLEM_SLOW_RATE: f64 = 30.0;
const PROBLEM_AVG_MS: f64 = 1000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Highlights {
    pub fastest: Vec<QueryPattern>,
    pub slowest: Vec<QueryPattern>,
    pub most_frequent: Vec<QueryPattern>,
    pub most_improved: Vec<PerformanceComparison>,
    pub most_regressed: Vec<PerformanceComparison>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub generated_at: u64,
    pub time_range: TimeRange,
    pub previous_range: TimeRange,
    pub stats: PerformanceStats,
    pub previous_stats: PerformanceStats,
    pub comparison: Vec<PerformanceComparison>,
    pub top_patterns: Vec<QueryPattern>,
    pub problematic_patterns: Vec<QueryPattern>,
    pub recommendations: Vec<OptimizationRecommendation>,
    pub highlights: Highlights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureInsight {
    pub signature: String,
    pub model: String,
    pub action: String,
    pub count: usize,
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
}

/// Multi-day digest of slow queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowQueryInsights {
    pub days: u32,
    pub total: usize,
    pub warning: usize,
    pub critical: usize,
    pub by_day: BTreeMap<NaiveDate, usize>,
    pub by_model: BTreeMap<String, Rollup>,
    pub top_signatures: Vec<SignatureInsight>,
    /// Slow queries per UTC hour of day
    pub hourly_distribution: [usize; 24],
    pub peak_hour: Option<u32>,
}

pub struct QueryAnalytics {
    monitor: Arc<QueryMonitor>,
    logger: Option<SlowQueryLogger>,
}

impl QueryAnalytics {
    pub fn new(monitor: Arc<QueryMonitor>, logger: Option<SlowQueryLogger>) -> Self {
        Self { monitor, logger }
    }

    /// Report over `time_range` (default: the last hour) against the
    /// equal-length window right before it
    pub fn generate_report(&self, time_range: Option<TimeRange>) -> AnalyticsReport {
        let now = self.monitor.clock().now_millis();
        let range = time_range.unwrap_or_else(|| TimeRange::ending_at(now, HOUR_MS));
        let previous_range = range.previous();

        let current = self.monitor.get_metrics_in_range(range);
        let previous = self.monitor.get_metrics_in_range(previous_range);

        let patterns = analyze_patterns(&current);
        let previous_patterns = analyze_patterns(&previous);
        let comparison = compare_performance(&patterns, &previous_patterns);

        let mut recommendations = generate_recommendations(&patterns, &current);
        recommendations.truncate(TOP_RECOMMENDATIONS);

        let problematic_patterns = patterns
            .iter()
            .filter(|p| p.slow_rate > PROBLEM_SLOW_RATE || p.avg_duration_ms > PROBLEM_AVG_MS)
            .cloned()
            .collect();

        let highlights = highlights(&patterns, &comparison);

        tracing::debug!(
            metrics = current.len(),
            patterns = patterns.len(),
            recommendations = recommendations.len(),
            "Analytics report generated"
        );

        AnalyticsReport {
            generated_at: now,
            time_range: range,
            previous_range,
            stats: compute_stats(current.iter(), Some(range)),
            previous_stats: compute_stats(previous.iter(), Some(previous_range)),
            comparison,
            top_patterns: patterns.into_iter().take(TOP_PATTERNS).collect(),
            problematic_patterns,
            recommendations,
            highlights,
        }
    }

    /// Slow-query digest for the last `days` days
    ///
    /// Reads the durable log; falls back to the monitor's slow buffer when
    /// file logging is off.
    pub async fn get_slow_query_insights(&self, days: u32) -> Result<SlowQueryInsights> {
        let days = days.max(1);
        let now = self.monitor.clock().now_millis();
        let start = now.saturating_sub(u64::from(days) * DAY_MS);

        let entries = match &self.logger {
            Some(logger) if logger.config().enable_file_logging => logger.get_logs_in_range(start, now).await?,
            _ => self
                .monitor
                .get_slow_queries(None)
                .into_iter()
                .filter(|e| e.timestamp() >= start && e.timestamp() <= now)
                .collect(),
        };

        Ok(slow_query_insights(days, &entries))
    }
}

fn highlights(patterns: &[QueryPattern], comparison: &[PerformanceComparison]) -> Highlights {
    let top = |mut v: Vec<QueryPattern>, cmp: fn(&QueryPattern, &QueryPattern) -> std::cmp::Ordering| {
        v.sort_by(cmp);
        v.truncate(HIGHLIGHTS);
        v
    };

    let most_improved = comparison
        .iter()
        .filter(|c| c.status == ComparisonStatus::Improved)
        .take(HIGHLIGHTS)
        .cloned()
        .collect();
    let most_regressed = comparison
        .iter()
        .filter(|c| c.status == ComparisonStatus::Regressed)
        .take(HIGHLIGHTS)
        .cloned()
        .collect();

    Highlights {
        fastest: top(patterns.to_vec(), |a, b| a.avg_duration_ms.total_cmp(&b.avg_duration_ms)),
        slowest: top(patterns.to_vec(), |a, b| b.avg_duration_ms.total_cmp(&a.avg_duration_ms)),
        most_frequent: top(patterns.to_vec(), |a, b| b.count.cmp(&a.count)),
        most_improved,
        most_regressed,
    }
}

pub fn slow_query_insights(days: u32, entries: &[SlowQueryLogEntry]) -> SlowQueryInsights {
    let mut insights = SlowQueryInsights {
        days,
        total: entries.len(),
        warning: 0,
        critical: 0,
        by_day: BTreeMap::new(),
        by_model: BTreeMap::new(),
        top_signatures: Vec::new(),
        hourly_distribution: [0; 24],
        peak_hour: None,
    };

    let mut signatures: HashMap<String, SignatureInsight> = HashMap::new();

    for entry in entries {
        let metric = &entry.metric;
        let duration = metric.duration_ms();

        match entry.severity() {
            Severity::Warning => insights.warning += 1,
            Severity::Critical => insights.critical += 1,
            Severity::Normal => {}
        }

        *insights.by_day.entry(day_of(entry.timestamp())).or_default() += 1;

        let rollup = insights.by_model.entry(metric.model().to_string()).or_default();
        rollup.count += 1;
        rollup.total_duration_ms += duration;
        rollup.slow_count += 1;

        if let Some(time) = DateTime::<Utc>::from_timestamp_millis(entry.timestamp() as i64) {
            insights.hourly_distribution[time.hour() as usize] += 1;
        }

        let signature = structural_signature(metric.model(), metric.action(), &metric.record.args_fingerprint);
        let insight = signatures.entry(signature.clone()).or_insert_with(|| SignatureInsight {
            signature,
            model: metric.model().to_string(),
            action: metric.action().to_string(),
            count: 0,
            avg_duration_ms: 0.0,
            max_duration_ms: 0,
        });
        // Running sum; divided below
        insight.count += 1;
        insight.avg_duration_ms += duration as f64;
        insight.max_duration_ms = insight.max_duration_ms.max(duration);
    }

    for rollup in insights.by_model.values_mut() {
        rollup.avg_duration_ms = rollup.total_duration_ms as f64 / rollup.count as f64;
    }

    let mut top: Vec<SignatureInsight> = signatures
        .into_values()
        .map(|mut s| {
            s.avg_duration_ms /= s.count as f64;
            s
        })
        .collect();
    top.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.max_duration_ms.cmp(&a.max_duration_ms))
            .then_with(|| a.signature.cmp(&b.signature))
    });
    top.truncate(TOP_SIGNATURES);
    insights.top_signatures = top;

    insights.peak_hour = insights
        .hourly_distribution
        .iter()
        .enumerate()
        .filter(|(_, n)| **n > 0)
        .max_by(|(ha, a), (hb, b)| a.cmp(b).then_with(|| hb.cmp(ha)))
        .map(|(hour, _)| hour as u32);

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::MonitorConfig;
    use crate::monitor::{ExecutionRecord, QueryMetric};
    use serde_json::json;

    // 2026-10-18T12:00:00Z
    const NOON: u64 = 1_792_324_800_000;

    fn monitor() -> Arc<QueryMonitor> {
        Arc::new(QueryMonitor::new(&MonitorConfig::default(), "test", Arc::new(ManualClock::new(NOON))).unwrap())
    }

    #[test]
    fn test_report_compares_with_previous_window() {
        let monitor = monitor();
        // previous hour: fast
        for i in 0..5 {
            monitor.track(
                ExecutionRecord::new("User", "findMany", 100, NOON - HOUR_MS - 60_000 + i)
                    .with_args(json!({"where": {"id": i}})),
            );
        }
        // current hour: slow
        for i in 0..5 {
            monitor.track(
                ExecutionRecord::new("User", "findMany", 2500, NOON - 60_000 + i)
                    .with_args(json!({"where": {"id": i}})),
            );
        }

        let report = QueryAnalytics::new(monitor, None).generate_report(None);

        assert_eq!(report.stats.total_queries, 5);
        assert_eq!(report.previous_stats.total_queries, 5);
        assert_eq!(report.top_patterns.len(), 1);
        assert_eq!(report.top_patterns[0].signature, "User.findMany[where]");
        assert_eq!(report.problematic_patterns.len(), 1);
        assert_eq!(report.comparison[0].status, ComparisonStatus::Regressed);
        assert_eq!(report.highlights.most_regressed.len(), 1);
        assert!(report.highlights.most_improved.is_empty());
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn test_empty_report() {
        let report = QueryAnalytics::new(monitor(), None).generate_report(None);
        assert_eq!(report.stats.total_queries, 0);
        assert!(report.top_patterns.is_empty());
        assert!(report.recommendations.is_empty());
        assert_eq!(report.time_range.duration_ms(), HOUR_MS);
    }

    #[tokio::test]
    async fn test_insights_from_memory_buffer() {
        let monitor = monitor();
        monitor.track(ExecutionRecord::new("User", "findMany", 1500, NOON - 1000));
        monitor.track(ExecutionRecord::new("User", "findMany", 4500, NOON - 500));
        monitor.track(ExecutionRecord::new("Post", "count", 1200, NOON - 3 * HOUR_MS));
        monitor.track(ExecutionRecord::new("Post", "count", 20, NOON));

        let insights = QueryAnalytics::new(monitor, None).get_slow_query_insights(1).await.unwrap();

        assert_eq!(insights.total, 3);
        assert_eq!(insights.critical, 1);
        assert_eq!(insights.warning, 2);
        assert_eq!(insights.by_model["User"].count, 2);
        assert_eq!(insights.top_signatures[0].signature, "User.findMany");
        assert_eq!(insights.top_signatures[0].avg_duration_ms, 3000.0);
        assert_eq!(insights.hourly_distribution[11], 2);
        assert_eq!(insights.hourly_distribution[9], 1);
        assert_eq!(insights.peak_hour, Some(11));
    }

    #[test]
    fn test_insights_peak_hour_empty() {
        let insights = slow_query_insights(7, &[]);
        assert_eq!(insights.peak_hour, None);
        assert_eq!(insights.total, 0);
    }

    #[test]
    fn test_insights_group_by_signature() {
        let entry = |args| {
            let record = ExecutionRecord::new("User", "findMany", 1000, NOON).with_args(args);
            SlowQueryLogEntry::new(QueryMetric::new(record, "h".into(), Severity::Warning), "test")
        };
        let entries = vec![entry(json!({"where": {}})), entry(json!({"where": {}})), entry(json!({}))];
        let insights = slow_query_insights(1, &entries);
        assert_eq!(insights.top_signatures.len(), 2);
        assert_eq!(insights.top_signatures[0].count, 2);
        assert_eq!(insights.by_day.values().sum::<usize>(), 3);
    }
}
