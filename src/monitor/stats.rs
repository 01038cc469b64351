//! Statistical snapshots over metric windows

use super::types::{PerformanceStats, QueryMetric, Rollup, Severity, TimeRange};
use std::collections::BTreeMap;

/// Number of entries kept in `PerformanceStats::top_slowest`
pub const TOP_SLOWEST: usize = 10;

/// Nearest-rank percentile over an ascending slice
///
/// Index is `ceil(p/100 * n) - 1` clamped to `[0, n-1]`; returns 0 for an
/// empty slice.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let n = sorted.len();
    let rank = (p / 100.0 * n as f64).ceil() as i64 - 1;
    let index = rank.clamp(0, n as i64 - 1) as usize;
    sorted[index]
}

pub fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<u64>() as f64 / values.len() as f64
}

/// Build a snapshot from the metrics of one window
pub fn compute_stats<'a, I>(metrics: I, time_range: Option<TimeRange>) -> PerformanceStats
where
    I: IntoIterator<Item = &'a QueryMetric>,
{
    let mut stats = PerformanceStats {
        time_range,
        ..Default::default()
    };

    let mut durations = Vec::new();
    let mut slowest: Vec<&QueryMetric> = Vec::new();
    let mut by_model: BTreeMap<String, Rollup> = BTreeMap::new();
    let mut by_action: BTreeMap<String, Rollup> = BTreeMap::new();

    for metric in metrics {
        let duration = metric.duration_ms();
        durations.push(duration);
        stats.total_queries += 1;

        match metric.severity {
            Severity::Warning => stats.warning_queries += 1,
            Severity::Critical => stats.critical_queries += 1,
            Severity::Normal => {}
        }
        if metric.is_slow {
            stats.slow_queries += 1;
        }
        if metric.failed() {
            stats.failed_queries += 1;
        }
        if metric.record.cached {
            stats.cached_queries += 1;
        }

        accumulate(by_model.entry(metric.model().to_string()).or_default(), metric);
        accumulate(by_action.entry(metric.action().to_string()).or_default(), metric);
        slowest.push(metric);
    }

    if durations.is_empty() {
        return stats;
    }

    durations.sort_unstable();
    stats.avg_duration_ms = mean(&durations);
    stats.median_duration_ms = percentile(&durations, 50.0);
    stats.p95_duration_ms = percentile(&durations, 95.0);
    stats.p99_duration_ms = percentile(&durations, 99.0);
    stats.min_duration_ms = durations[0];
    stats.max_duration_ms = durations[durations.len() - 1];

    for rollup in by_model.values_mut().chain(by_action.values_mut()) {
        rollup.avg_duration_ms = rollup.total_duration_ms as f64 / rollup.count as f64;
    }
    stats.by_model = by_model;
    stats.by_action = by_action;

    slowest.sort_by(|a, b| b.duration_ms().cmp(&a.duration_ms()));
    stats.top_slowest = slowest.into_iter().take(TOP_SLOWEST).cloned().collect();

    stats
}

fn accumulate(rollup: &mut Rollup, metric: &QueryMetric) {
    rollup.count += 1;
    rollup.total_duration_ms += metric.duration_ms();
    if metric.is_slow {
        rollup.slow_count += 1;
    }
}
