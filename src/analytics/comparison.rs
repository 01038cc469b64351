use super::patterns::QueryPattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relative change in average duration that counts as a real difference
pub const CHANGE_BAND: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonStatus {
    Improved,
    Regressed,
    Unchanged,
    New,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceComparison {
    pub signature: String,
    pub status: ComparisonStatus,
    pub current_avg_ms: Option<f64>,
    pub previous_avg_ms: Option<f64>,
    pub current_count: usize,
    pub previous_count: usize,
    /// Percent change of the average; `None` unless present in both windows
    pub change_percent: Option<f64>,
}

/// Match patterns of two windows by signature
///
/// Sorted by absolute change, largest first; new and removed patterns last.
pub fn compare_performance(current: &[QueryPattern], previous: &[QueryPattern]) -> Vec<PerformanceComparison> {
    let mut joined: BTreeMap<&str, (Option<&QueryPattern>, Option<&QueryPattern>)> = BTreeMap::new();
    for pattern in current {
        joined.entry(pattern.signature.as_str()).or_default().0 = Some(pattern);
    }
    for pattern in previous {
        joined.entry(pattern.signature.as_str()).or_default().1 = Some(pattern);
    }

    let mut comparisons: Vec<PerformanceComparison> = joined
        .into_iter()
        .map(|(signature, (cur, prev))| {
            let current_avg_ms = cur.map(|p| p.avg_duration_ms);
            let previous_avg_ms = prev.map(|p| p.avg_duration_ms);

            let (status, change_percent) = match (current_avg_ms, previous_avg_ms) {
                (Some(now), Some(before)) => {
                    let change = if before > 0.0 {
                        (now - before) / before
                    } else if now > 0.0 {
                        1.0
                    } else {
                        0.0
                    };
                    let status = if change < -CHANGE_BAND {
                        ComparisonStatus::Improved
                    } else if change > CHANGE_BAND {
                        ComparisonStatus::Regressed
                    } else {
                        ComparisonStatus::Unchanged
                    };
                    (status, Some(change * 100.0))
                }
                (Some(_), None) => (ComparisonStatus::New, None),
                _ => (ComparisonStatus::Removed, None),
            };

            PerformanceComparison {
                signature: signature.to_string(),
                status,
                current_avg_ms,
                previous_avg_ms,
                current_count: cur.map_or(0, |p| p.count),
                previous_count: prev.map_or(0, |p| p.count),
                change_percent,
            }
        })
        .collect();

    comparisons.sort_by(|a, b| {
        let magnitude = |c: &PerformanceComparison| c.change_percent.map(f64::abs);
        match (magnitude(a), magnitude(b)) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
    comparisons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::patterns::Trend;

    fn pattern(signature: &str, avg: f64) -> QueryPattern {
        QueryPattern {
            signature: signature.to_string(),
            model: "User".into(),
            action: "findMany".into(),
            count: 3,
            avg_duration_ms: avg,
            min_duration_ms: 0,
            max_duration_ms: 0,
            median_duration_ms: 0,
            p95_duration_ms: 0,
            total_duration_ms: 0,
            slow_count: 0,
            slow_rate: 0.0,
            error_count: 0,
            trend: Trend::Stable,
            first_seen: 0,
            last_seen: 0,
        }
    }

    #[test]
    fn test_statuses() {
        let current = vec![pattern("a", 50.0), pattern("b", 300.0), pattern("c", 102.0), pattern("new", 1.0)];
        let previous = vec![pattern("a", 100.0), pattern("b", 100.0), pattern("c", 100.0), pattern("gone", 1.0)];

        let result = compare_performance(&current, &previous);
        let status = |s: &str| result.iter().find(|c| c.signature == s).unwrap().status;

        assert_eq!(status("a"), ComparisonStatus::Improved);
        assert_eq!(status("b"), ComparisonStatus::Regressed);
        assert_eq!(status("c"), ComparisonStatus::Unchanged);
        assert_eq!(status("new"), ComparisonStatus::New);
        assert_eq!(status("gone"), ComparisonStatus::Removed);

        assert_eq!(result[0].signature, "b");
        assert_eq!(result[0].change_percent, Some(200.0));
        assert!(result[3].change_percent.is_none());
    }
}
