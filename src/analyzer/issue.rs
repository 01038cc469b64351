use crate::monitor::QueryMetric;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Sample records attached to an issue
pub const MAX_AFFECTED_RECORDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    NPlusOne,
    SlowQuery,
    PoorCacheHitRate,
    HighErrorRate,
}

impl IssueType {
    pub const ALL: [IssueType; 4] = [
        IssueType::NPlusOne,
        IssueType::SlowQuery,
        IssueType::PoorCacheHitRate,
        IssueType::HighErrorRate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::NPlusOne => "n_plus_one",
            IssueType::SlowQuery => "slow_query",
            IssueType::PoorCacheHitRate => "poor_cache_hit_rate",
            IssueType::HighErrorRate => "high_error_rate",
        }
    }

    /// Fixed remediation hints for the category
    pub fn remediation(self) -> &'static [&'static str] {
        match self {
            IssueType::NPlusOne => &[
                "Batch the lookups with eager loading (include) instead of one query per row",
                "Replace per-row findUnique calls with a single findMany using an `in` filter",
                "Add a request-scoped loader to deduplicate repeated lookups",
            ],
            IssueType::SlowQuery => &[
                "Add an index on the filtered and sorted columns",
                "Select only the fields the caller needs",
                "Paginate large result sets with take/skip or a cursor",
                "Inspect the query plan for sequential scans",
            ],
            IssueType::PoorCacheHitRate => &[
                "Review cache keys and TTLs for the hottest queries",
                "Cache read-heavy lookups that rarely change",
                "Warm the cache for predictable access patterns",
            ],
            IssueType::HighErrorRate => &[
                "Review connection pool size and timeouts",
                "Check recent schema changes and constraint violations",
                "Add retries with backoff for transient failures",
            ],
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity, ordered `Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IssueSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueSeverity::Low => "low",
            IssueSeverity::Medium => "medium",
            IssueSeverity::High => "high",
            IssueSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IssueSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(IssueSeverity::Low),
            "medium" => Ok(IssueSeverity::Medium),
            "high" => Ok(IssueSeverity::High),
            "critical" => Ok(IssueSeverity::Critical),
            other => Err(format!("unknown issue severity: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueImpact {
    pub query_count: usize,
    pub total_duration_ms: u64,
    pub avg_duration_ms: f64,
}

impl IssueImpact {
    pub fn from_durations(durations: impl IntoIterator<Item = u64>) -> Self {
        let (count, total) = durations
            .into_iter()
            .fold((0usize, 0u64), |(n, sum), d| (n + 1, sum + d));
        Self {
            query_count: count,
            total_duration_ms: total,
            avg_duration_ms: if count == 0 { 0.0 } else { total as f64 / count as f64 },
        }
    }
}

/// A detected performance problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceIssue {
    pub id: Uuid,
    pub issue_type: IssueType,
    pub severity: IssueSeverity,
    pub title: String,
    pub description: String,
    pub affected_records: Vec<QueryMetric>,
    pub impact: IssueImpact,
    pub recommendations: Vec<String>,
    /// Unix milliseconds
    pub detected_at: u64,
}

impl PerformanceIssue {
    pub fn new(
        issue_type: IssueType,
        severity: IssueSeverity,
        title: impl Into<String>,
        description: impl Into<String>,
        impact: IssueImpact,
        detected_at: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            issue_type,
            severity,
            title: title.into(),
            description: description.into(),
            affected_records: Vec::new(),
            impact,
            recommendations: issue_type.remediation().iter().map(|s| s.to_string()).collect(),
            detected_at,
        }
    }

    /// Attach sample records, capped at [`MAX_AFFECTED_RECORDS`]
    pub fn with_records<'a>(mut self, records: impl IntoIterator<Item = &'a QueryMetric>) -> Self {
        self.affected_records = records.into_iter().take(MAX_AFFECTED_RECORDS).cloned().collect();
        self
    }
}
