//! Query pattern grouping by structural signature

use crate::monitor::signature::structural_signature;
use crate::monitor::stats::{mean, percentile};
use crate::monitor::QueryMetric;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Relative change of the second-half mean that counts as a trend
pub const TREND_BAND: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Improving => "improving",
            Trend::Stable => "stable",
            Trend::Degrading => "degrading",
        };
        f.write_str(s)
    }
}

/// Aggregate over every call sharing one structural signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPattern {
    pub signature: String,
    pub model: String,
    pub action: String,
    pub count: usize,
    pub avg_duration_ms: f64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub median_duration_ms: u64,
    pub p95_duration_ms: u64,
    pub total_duration_ms: u64,
    pub slow_count: usize,
    /// Percentage, 0..=100
    pub slow_rate: f64,
    pub error_count: usize,
    pub trend: Trend,
    pub first_seen: u64,
    pub last_seen: u64,
}

/// Group metrics into patterns, most total time first
pub fn analyze_patterns(metrics: &[QueryMetric]) -> Vec<QueryPattern> {
    let mut groups: HashMap<String, Vec<&QueryMetric>> = HashMap::new();
    for metric in metrics {
        let signature = structural_signature(metric.model(), metric.action(), &metric.record.args_fingerprint);
        groups.entry(signature).or_default().push(metric);
    }

    let mut patterns: Vec<QueryPattern> = groups
        .into_iter()
        .map(|(signature, mut group)| {
            group.sort_by_key(|m| m.timestamp());
            build_pattern(signature, &group)
        })
        .collect();

    patterns.sort_by(|a, b| {
        b.total_duration_ms
            .cmp(&a.total_duration_ms)
            .then_with(|| a.signature.cmp(&b.signature))
    });
    patterns
}

/// `group` must be non-empty and in chronological order
fn build_pattern(signature: String, group: &[&QueryMetric]) -> QueryPattern {
    let chronological: Vec<u64> = group.iter().map(|m| m.duration_ms()).collect();
    let mut sorted = chronological.clone();
    sorted.sort_unstable();

    let count = group.len();
    let slow_count = group.iter().filter(|m| m.is_slow).count();

    QueryPattern {
        signature,
        model: group[0].model().to_string(),
        action: group[0].action().to_string(),
        count,
        avg_duration_ms: mean(&sorted),
        min_duration_ms: sorted.first().copied().unwrap_or(0),
        max_duration_ms: sorted.last().copied().unwrap_or(0),
        median_duration_ms: percentile(&sorted, 50.0),
        p95_duration_ms: percentile(&sorted, 95.0),
        total_duration_ms: sorted.iter().sum(),
        slow_count,
        slow_rate: slow_count as f64 / count as f64 * 100.0,
        error_count: group.iter().filter(|m| m.failed()).count(),
        trend: trend(&chronological),
        first_seen: group[0].timestamp(),
        last_seen: group[count - 1].timestamp(),
    }
}

/// Compare the means of the two chronological halves
pub fn trend(chronological: &[u64]) -> Trend {
    if chronological.len() < 2 {
        return Trend::Stable;
    }
    let (first, second) = chronological.split_at(chronological.len() / 2);
    let before = mean(first);
    let after = mean(second);
    if before == 0.0 {
        return if after > 0.0 { Trend::Degrading } else { Trend::Stable };
    }

    let change = (after - before) / before;
    if change < -TREND_BAND {
        Trend::Improving
    } else if change > TREND_BAND {
        Trend::Degrading
    } else {
        Trend::Stable
    }
}
