//! Optimization recommendations derived from query patterns

use super::patterns::{QueryPattern, Trend};
use crate::analyzer::IssueSeverity;
use crate::monitor::signature::structural_signature;
use crate::monitor::QueryMetric;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Models whose rows churn often enough to warrant extra hints
const HIGH_CHURN_MODELS: &[&str] = &["Session", "Event", "AuditLog", "Log", "Notification", "Message"];

/// Slowest calls attached to each recommendation
pub const MAX_EXAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    HighSlowRate,
    HighLatency,
    Degrading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    pub signature: String,
    pub model: String,
    pub action: String,
    pub kind: RecommendationKind,
    pub severity: IssueSeverity,
    pub reason: String,
    pub suggestions: Vec<String>,
    /// Time spent in the pattern, the upper bound of any saving
    pub estimated_impact_ms: u64,
    /// The pattern's slowest calls, slowest first
    pub examples: Vec<QueryMetric>,
}

/// One recommendation per triggered rule, most severe first
///
/// `metrics` adds context the pattern alone lacks: how many of the pattern's
/// calls were served from cache, and which calls were the slowest.
pub fn generate_recommendations(patterns: &[QueryPattern], metrics: &[QueryMetric]) -> Vec<OptimizationRecommendation> {
    let mut cached: HashMap<(&str, &str), usize> = HashMap::new();
    let mut by_signature: HashMap<String, Vec<&QueryMetric>> = HashMap::new();
    for metric in metrics {
        if metric.record.cached {
            *cached.entry((metric.model(), metric.action())).or_default() += 1;
        }
        by_signature
            .entry(structural_signature(metric.model(), metric.action(), &metric.record.args_fingerprint))
            .or_default()
            .push(metric);
    }

    let mut recommendations = Vec::new();
    for pattern in patterns {
        let uncached = cached
            .get(&(pattern.model.as_str(), pattern.action.as_str()))
            .map_or(true, |n| *n == 0);
        let examples = slowest(by_signature.get(&pattern.signature));

        if pattern.slow_rate > 50.0 {
            let severity = if pattern.slow_rate >= 90.0 {
                IssueSeverity::Critical
            } else if pattern.slow_rate >= 75.0 {
                IssueSeverity::High
            } else {
                IssueSeverity::Medium
            };
            recommendations.push(recommend(
                pattern,
                RecommendationKind::HighSlowRate,
                severity,
                format!("{:.0}% of {} calls were slow", pattern.slow_rate, pattern.count),
                uncached,
                &examples,
            ));
        }

        if pattern.avg_duration_ms > 2000.0 {
            let severity = if pattern.avg_duration_ms >= 10_000.0 {
                IssueSeverity::Critical
            } else if pattern.avg_duration_ms >= 5000.0 {
                IssueSeverity::High
            } else {
                IssueSeverity::Medium
            };
            recommendations.push(recommend(
                pattern,
                RecommendationKind::HighLatency,
                severity,
                format!("average duration is {:.0}ms", pattern.avg_duration_ms),
                uncached,
                &examples,
            ));
        }

        if pattern.trend == Trend::Degrading && pattern.count > 10 {
            recommendations.push(recommend(
                pattern,
                RecommendationKind::Degrading,
                IssueSeverity::Low,
                format!("latency is trending up across {} calls", pattern.count),
                uncached,
                &examples,
            ));
        }
    }

    rank(&mut recommendations);
    recommendations
}

/// Severity descending, then estimated impact descending
pub fn rank(recommendations: &mut [OptimizationRecommendation]) {
    recommendations.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.estimated_impact_ms.cmp(&a.estimated_impact_ms))
    });
}

fn recommend(
    pattern: &QueryPattern,
    kind: RecommendationKind,
    severity: IssueSeverity,
    reason: String,
    uncached: bool,
    examples: &[QueryMetric],
) -> OptimizationRecommendation {
    let mut suggestions: Vec<String> = action_hints(&pattern.action).iter().map(|s| s.to_string()).collect();

    if HIGH_CHURN_MODELS.contains(&pattern.model.as_str()) {
        suggestions.push(format!(
            "{} is a high-churn table: archive or partition old rows and keep indexes narrow",
            pattern.model
        ));
    }
    if uncached && is_read(&pattern.action) {
        suggestions.push("Cache the result if it tolerates brief staleness".to_string());
    }

    OptimizationRecommendation {
        signature: pattern.signature.clone(),
        model: pattern.model.clone(),
        action: pattern.action.clone(),
        kind,
        severity,
        reason: format!("{}: {}", pattern.signature, reason),
        suggestions,
        estimated_impact_ms: pattern.total_duration_ms,
        examples: examples.to_vec(),
    }
}

fn slowest(group: Option<&Vec<&QueryMetric>>) -> Vec<QueryMetric> {
    let mut calls: Vec<&QueryMetric> = group.map(|g| g.to_vec()).unwrap_or_default();
    calls.sort_by(|a, b| b.duration_ms().cmp(&a.duration_ms()));
    calls.into_iter().take(MAX_EXAMPLES).cloned().collect()
}

fn is_read(action: &str) -> bool {
    matches!(
        action,
        "findMany" | "findFirst" | "findUnique" | "findFirstOrThrow" | "findUniqueOrThrow" | "count" | "aggregate" | "groupBy"
    )
}

/// Static hints keyed by action kind
fn action_hints(action: &str) -> &'static [&'static str] {
    match action {
        "findMany" => &[
            "Paginate with take/skip or a cursor instead of loading every row",
            "Select only the columns the caller uses",
            "Index the columns used in where and orderBy",
        ],
        "findFirst" | "findUnique" | "findFirstOrThrow" | "findUniqueOrThrow" => &[
            "Look rows up by a unique or indexed column",
            "Batch repeated single-row lookups into one findMany",
        ],
        "count" => &[
            "Index the filtered columns so the count can use an index scan",
            "Keep a maintained counter for hot totals instead of counting rows",
        ],
        "aggregate" | "groupBy" => &[
            "Pre-compute the aggregate in a summary table or materialized view",
            "Narrow the aggregated range with an indexed filter",
        ],
        "create" | "createMany" | "update" | "updateMany" | "upsert" | "delete" | "deleteMany" => &[
            "Batch writes with createMany/updateMany inside one transaction",
            "Drop indexes the write path maintains but no query uses",
            "Keep transactions short to reduce lock contention",
        ],
        _ => &["Inspect the query plan for sequential scans"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{ExecutionRecord, Severity};
    use serde_json::json;

    fn call(model: &str, action: &str, duration: u64) -> QueryMetric {
        let record = ExecutionRecord::new(model, action, duration, duration).with_args(json!({"take": 10}));
        QueryMetric::new(record, "h".to_string(), Severity::Critical)
    }

    fn pattern(action: &str, model: &str, count: usize, slow_rate: f64, avg: f64, trend: Trend) -> QueryPattern {
        QueryPattern {
            signature: format!("{}.{}", model, action),
            model: model.to_string(),
            action: action.to_string(),
            count,
            avg_duration_ms: avg,
            min_duration_ms: 0,
            max_duration_ms: avg as u64,
            median_duration_ms: avg as u64,
            p95_duration_ms: avg as u64,
            total_duration_ms: (avg * count as f64) as u64,
            slow_count: (slow_rate / 100.0 * count as f64) as usize,
            slow_rate,
            error_count: 0,
            trend,
            first_seen: 0,
            last_seen: 0,
        }
    }

    #[test]
    fn test_rules_trigger_independently() {
        let patterns = vec![
            pattern("findMany", "User", 20, 95.0, 12_000.0, Trend::Degrading),
            pattern("count", "Post", 5, 10.0, 50.0, Trend::Stable),
        ];
        let metrics: Vec<QueryMetric> = [9_000, 15_000, 11_000, 14_000]
            .into_iter()
            .map(|d| call("User", "findMany", d))
            .chain(std::iter::once(call("Post", "count", 60_000)))
            .collect();
        let recs = generate_recommendations(&patterns, &metrics);

        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].severity, IssueSeverity::Critical);
        assert_eq!(recs[2].kind, RecommendationKind::Degrading);
        assert!(recs.iter().all(|r| r.model == "User"));

        let durations: Vec<u64> = recs[0].examples.iter().map(|m| m.duration_ms()).collect();
        assert_eq!(durations, vec![15_000, 14_000, 11_000]);
        assert!(recs.iter().all(|r| r.examples.iter().all(|m| m.model() == "User")));
    }

    #[test]
    fn test_severity_scales_with_slow_rate() {
        let recs = generate_recommendations(&[pattern("count", "Post", 4, 60.0, 100.0, Trend::Stable)], &[]);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].severity, IssueSeverity::Medium);
        assert!(recs[0].suggestions.iter().any(|s| s.contains("counter")));
    }

    #[test]
    fn test_degrading_needs_volume() {
        let recs = generate_recommendations(&[pattern("update", "User", 10, 0.0, 10.0, Trend::Degrading)], &[]);
        assert!(recs.is_empty());
    }

    #[test]
    fn test_high_churn_hint() {
        let recs = generate_recommendations(&[pattern("create", "AuditLog", 12, 80.0, 3000.0, Trend::Stable)], &[]);
        assert_eq!(recs[0].severity, IssueSeverity::High);
        assert!(recs[0].suggestions.iter().any(|s| s.contains("high-churn")));
        assert!(!recs[0].suggestions.iter().any(|s| s.contains("Cache")));
    }
}
