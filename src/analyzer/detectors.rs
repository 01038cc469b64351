//! Issue detection rules
//!
//! Each rule is a pure function over a snapshot of the monitor, so a run
//! never mutates monitor state.

use super::issue::{IssueImpact, IssueSeverity, IssueType, PerformanceIssue};
use crate::config::AnalyzerConfig;
use crate::monitor::QueryMetric;
use std::collections::BTreeMap;

/// Point-in-time view of the monitor handed to every rule
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub metrics: &'a [QueryMetric],
    pub slow: &'a [QueryMetric],
    pub total_calls: u64,
    pub failure_count: u64,
    pub now: u64,
}

/// Run every rule and return the combined issues, most severe first
pub fn detect_all(snapshot: &Snapshot<'_>, config: &AnalyzerConfig) -> Vec<PerformanceIssue> {
    let mut issues = detect_n_plus_one(snapshot, config);
    issues.extend(detect_slow_queries(snapshot, config));
    issues.extend(detect_poor_cache_hit_rate(snapshot, config));
    issues.extend(detect_high_error_rate(snapshot, config));

    // Stable sort keeps rule order within a severity
    issues.sort_by(|a, b| b.severity.cmp(&a.severity));
    issues.truncate(config.max_issues);
    issues
}

/// Repeated `Model.action` calls packed into a short window
///
/// Uses the densest window per operation: a two-pointer sweep over the
/// chronologically sorted calls.
pub fn detect_n_plus_one(snapshot: &Snapshot<'_>, config: &AnalyzerConfig) -> Vec<PerformanceIssue> {
    let mut by_operation: BTreeMap<(&str, &str), Vec<&QueryMetric>> = BTreeMap::new();
    for metric in snapshot.metrics {
        by_operation
            .entry((metric.model(), metric.action()))
            .or_default()
            .push(metric);
    }

    let mut issues = Vec::new();
    for ((model, action), mut calls) in by_operation {
        if calls.len() < config.n1_threshold {
            continue;
        }
        calls.sort_by_key(|m| m.timestamp());

        let (start, count) = densest_window(&calls, config.n1_time_window_ms);
        if count < config.n1_threshold {
            continue;
        }

        let window = &calls[start..start + count];
        let severity = if count >= 50 {
            IssueSeverity::Critical
        } else if count >= 20 {
            IssueSeverity::High
        } else {
            IssueSeverity::Medium
        };

        issues.push(
            PerformanceIssue::new(
                IssueType::NPlusOne,
                severity,
                format!("Possible N+1 query on {}.{}", model, action),
                format!(
                    "{} calls to {}.{} within {}ms; a single batched query would replace them",
                    count, model, action, config.n1_time_window_ms
                ),
                IssueImpact::from_durations(window.iter().map(|m| m.duration_ms())),
                snapshot.now,
            )
            .with_records(window.iter().copied()),
        );
    }

    issues
}

/// Start index and length of the largest run with `last - first < window_ms`
fn densest_window(sorted: &[&QueryMetric], window_ms: u64) -> (usize, usize) {
    let mut best = (0, 0);
    let mut left = 0;
    for right in 0..sorted.len() {
        while sorted[right].timestamp() - sorted[left].timestamp() >= window_ms.max(1) {
            left += 1;
        }
        let len = right - left + 1;
        if len > best.1 {
            best = (left, len);
        }
    }
    best
}

/// Slow records grouped by query shape, reported when the worst call is
/// past `slow_query_threshold_ms`
pub fn detect_slow_queries(snapshot: &Snapshot<'_>, config: &AnalyzerConfig) -> Vec<PerformanceIssue> {
    let mut groups: BTreeMap<&str, Vec<&QueryMetric>> = BTreeMap::new();
    for metric in snapshot.slow {
        groups.entry(metric.query_hash.as_str()).or_default().push(metric);
    }

    let mut issues = Vec::new();
    for (hash, mut group) in groups {
        let impact = IssueImpact::from_durations(group.iter().map(|m| m.duration_ms()));
        let max = group.iter().map(|m| m.duration_ms()).max().unwrap_or(0);
        if max < config.slow_query_threshold_ms {
            continue;
        }

        let avg = impact.avg_duration_ms;
        let severity = if max >= 5000 {
            IssueSeverity::Critical
        } else if avg >= 1000.0 {
            IssueSeverity::High
        } else if avg >= 500.0 {
            IssueSeverity::Medium
        } else {
            IssueSeverity::Low
        };

        group.sort_by(|a, b| b.duration_ms().cmp(&a.duration_ms()));
        let first = group[0];

        issues.push(
            PerformanceIssue::new(
                IssueType::SlowQuery,
                severity,
                format!("Slow query on {}.{}", first.model(), first.action()),
                format!(
                    "{} slow executions of query {} (avg {:.0}ms, max {}ms)",
                    group.len(),
                    hash,
                    avg,
                    max
                ),
                impact,
                snapshot.now,
            )
            .with_records(group.iter().copied()),
        );
    }

    issues
}

pub fn detect_poor_cache_hit_rate(snapshot: &Snapshot<'_>, config: &AnalyzerConfig) -> Vec<PerformanceIssue> {
    let sample = snapshot.metrics.len();
    if sample == 0 || sample < config.min_sample_size {
        return Vec::new();
    }

    let cached = snapshot.metrics.iter().filter(|m| m.record.cached).count();
    let rate = cached as f64 / sample as f64;
    if rate >= config.poor_cache_hit_rate_threshold {
        return Vec::new();
    }

    let severity = if rate < 0.10 {
        IssueSeverity::High
    } else {
        IssueSeverity::Medium
    };
    let misses: Vec<&QueryMetric> = snapshot.metrics.iter().filter(|m| !m.record.cached).collect();

    vec![PerformanceIssue::new(
        IssueType::PoorCacheHitRate,
        severity,
        "Poor cache hit rate",
        format!(
            "Cache hit rate is {:.1}% over {} calls, below the {:.1}% floor",
            rate * 100.0,
            sample,
            config.poor_cache_hit_rate_threshold * 100.0
        ),
        IssueImpact::from_durations(misses.iter().map(|m| m.duration_ms())),
        snapshot.now,
    )
    .with_records(misses)]
}

pub fn detect_high_error_rate(snapshot: &Snapshot<'_>, config: &AnalyzerConfig) -> Vec<PerformanceIssue> {
    let total = snapshot.total_calls;
    if total == 0 || total < config.min_sample_size as u64 {
        return Vec::new();
    }

    let rate = snapshot.failure_count as f64 / total as f64;
    if rate <= config.high_error_rate_threshold {
        return Vec::new();
    }

    let severity = if rate > 0.20 {
        IssueSeverity::Critical
    } else {
        IssueSeverity::High
    };
    let failed: Vec<&QueryMetric> = snapshot.metrics.iter().filter(|m| m.failed()).collect();
    let mut impact = IssueImpact::from_durations(failed.iter().map(|m| m.duration_ms()));
    impact.query_count = snapshot.failure_count as usize;

    vec![PerformanceIssue::new(
        IssueType::HighErrorRate,
        severity,
        "High query error rate",
        format!(
            "{} of {} calls failed ({:.1}%), above the {:.1}% ceiling",
            snapshot.failure_count,
            total,
            rate * 100.0,
            config.high_error_rate_threshold * 100.0
        ),
        impact,
        snapshot.now,
    )
    .with_records(failed)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{ExecutionRecord, Severity};

    fn metric(model: &str, action: &str, duration: u64, ts: u64) -> QueryMetric {
        let severity = if duration >= 3000 {
            Severity::Critical
        } else if duration >= 1000 {
            Severity::Warning
        } else {
            Severity::Normal
        };
        QueryMetric::new(
            ExecutionRecord::new(model, action, duration, ts),
            format!("{}.{}", model, action),
            severity,
        )
    }

    fn snapshot<'a>(metrics: &'a [QueryMetric], slow: &'a [QueryMetric]) -> Snapshot<'a> {
        Snapshot {
            metrics,
            slow,
            total_calls: metrics.len() as u64,
            failure_count: metrics.iter().filter(|m| m.failed()).count() as u64,
            now: 0,
        }
    }

    #[test]
    fn test_n_plus_one_densest_window() {
        // 12 calls packed into 440ms, plus stragglers far away
        let mut metrics: Vec<_> = (0..12).map(|i| metric("Post", "findUnique", 3, 10_000 + i * 40)).collect();
        metrics.push(metric("Post", "findUnique", 3, 1_000));
        metrics.push(metric("Post", "findUnique", 3, 50_000));

        let issues = detect_n_plus_one(&snapshot(&metrics, &[]), &AnalyzerConfig::default());

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::NPlusOne);
        assert_eq!(issues[0].severity, IssueSeverity::Medium);
        assert_eq!(issues[0].impact.query_count, 12);
        assert_eq!(issues[0].impact.total_duration_ms, 36);
    }

    #[test]
    fn test_n_plus_one_spread_out_calls_not_flagged() {
        let metrics: Vec<_> = (0..30).map(|i| metric("Post", "findUnique", 3, i * 200)).collect();
        assert!(detect_n_plus_one(&snapshot(&metrics, &[]), &AnalyzerConfig::default()).is_empty());
    }

    #[test]
    fn test_n_plus_one_severity_tiers() {
        let metrics: Vec<_> = (0..55).map(|i| metric("Post", "findUnique", 1, i)).collect();
        let issues = detect_n_plus_one(&snapshot(&metrics, &[]), &AnalyzerConfig::default());
        assert_eq!(issues[0].severity, IssueSeverity::Critical);

        let metrics: Vec<_> = (0..25).map(|i| metric("Post", "findUnique", 1, i)).collect();
        let issues = detect_n_plus_one(&snapshot(&metrics, &[]), &AnalyzerConfig::default());
        assert_eq!(issues[0].severity, IssueSeverity::High);
    }

    #[test]
    fn test_slow_query_tiers() {
        let slow = vec![
            metric("User", "findMany", 6000, 1),
            metric("User", "findMany", 1200, 2),
            metric("Post", "count", 1100, 3),
            metric("Post", "count", 1300, 4),
        ];
        let issues = detect_slow_queries(&snapshot(&[], &slow), &AnalyzerConfig::default());

        assert_eq!(issues.len(), 2);
        let by_title = |t: &str| issues.iter().find(|i| i.title.contains(t)).unwrap();
        assert_eq!(by_title("User.findMany").severity, IssueSeverity::Critical);
        assert_eq!(by_title("User.findMany").affected_records[0].duration_ms(), 6000);
        assert_eq!(by_title("Post.count").severity, IssueSeverity::High);
    }

    #[test]
    fn test_slow_group_below_threshold_skipped() {
        let slow = vec![metric("User", "findMany", 800, 1)];
        let config = AnalyzerConfig::default();
        assert!(detect_slow_queries(&snapshot(&[], &slow), &config).is_empty());

        let config = AnalyzerConfig {
            slow_query_threshold_ms: 500,
            ..AnalyzerConfig::default()
        };
        let issues = detect_slow_queries(&snapshot(&[], &slow), &config);
        assert_eq!(issues[0].severity, IssueSeverity::Medium);
    }

    #[test]
    fn test_cache_rule_needs_sample() {
        let config = AnalyzerConfig::default();
        let few: Vec<_> = (0..10).map(|i| metric("User", "findMany", 5, i)).collect();
        assert!(detect_poor_cache_hit_rate(&snapshot(&few, &[]), &config).is_empty());

        let mut many: Vec<_> = (0..100).map(|i| metric("User", "findMany", 5, i)).collect();
        for m in many.iter_mut().take(20) {
            m.record.cached = true;
        }
        let issues = detect_poor_cache_hit_rate(&snapshot(&many, &[]), &config);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Medium);
        assert_eq!(issues[0].impact.query_count, 80);

        for m in many.iter_mut().take(40) {
            m.record.cached = true;
        }
        assert!(detect_poor_cache_hit_rate(&snapshot(&many, &[]), &config).is_empty());
    }

    #[test]
    fn test_error_rate_tiers() {
        let config = AnalyzerConfig::default();
        let mut metrics: Vec<_> = (0..100).map(|i| metric("User", "create", 5, i)).collect();
        for m in metrics.iter_mut().take(10) {
            m.record.error = Some("unique constraint".into());
        }
        let issues = detect_high_error_rate(&snapshot(&metrics, &[]), &config);
        assert_eq!(issues[0].severity, IssueSeverity::High);
        assert_eq!(issues[0].impact.query_count, 10);

        for m in metrics.iter_mut().take(30) {
            m.record.error = Some("timeout".into());
        }
        let issues = detect_high_error_rate(&snapshot(&metrics, &[]), &config);
        assert_eq!(issues[0].severity, IssueSeverity::Critical);

        for m in metrics.iter_mut() {
            m.record.error = None;
        }
        assert!(detect_high_error_rate(&snapshot(&metrics, &[]), &config).is_empty());
    }

    #[test]
    fn test_detect_all_sorted_and_capped() {
        let config = AnalyzerConfig {
            max_issues: 1,
            ..AnalyzerConfig::default()
        };
        let metrics: Vec<_> = (0..12).map(|i| metric("Post", "findUnique", 3, i)).collect();
        let slow = vec![metric("User", "findMany", 6000, 1)];
        let issues = detect_all(&snapshot(&metrics, &slow), &config);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::SlowQuery);
    }
}
