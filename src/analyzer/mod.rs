//! Performance analyzer
//!
//! Reads a snapshot of the [`QueryMonitor`] and turns it into
//! [`PerformanceIssue`]s. Each run replaces the previous issue list.

pub mod detectors;
pub mod issue;

pub use detectors::Snapshot;
pub use issue::{IssueImpact, IssueSeverity, IssueType, PerformanceIssue};

use crate::config::{validate_analyzer_config, AnalyzerConfig};
use crate::error::{MonitorError, Result};
use crate::monitor::{QueryMetric, QueryMonitor};
use crate::ticker::PeriodicTask;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Partial analyzer settings; `None` keeps the current value
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnalyzerConfigUpdate {
    pub n1_threshold: Option<usize>,
    pub n1_time_window_ms: Option<u64>,
    pub slow_query_threshold_ms: Option<u64>,
    pub poor_cache_hit_rate_threshold: Option<f64>,
    pub high_error_rate_threshold: Option<f64>,
    pub min_sample_size: Option<usize>,
    pub auto_detect: Option<bool>,
    pub analysis_interval_ms: Option<u64>,
    pub max_issues: Option<usize>,
}

impl AnalyzerConfigUpdate {
    fn apply(&self, base: &AnalyzerConfig) -> AnalyzerConfig {
        AnalyzerConfig {
            n1_threshold: self.n1_threshold.unwrap_or(base.n1_threshold),
            n1_time_window_ms: self.n1_time_window_ms.unwrap_or(base.n1_time_window_ms),
            slow_query_threshold_ms: self.slow_query_threshold_ms.unwrap_or(base.slow_query_threshold_ms),
            poor_cache_hit_rate_threshold: self
                .poor_cache_hit_rate_threshold
                .unwrap_or(base.poor_cache_hit_rate_threshold),
            high_error_rate_threshold: self
                .high_error_rate_threshold
                .unwrap_or(base.high_error_rate_threshold),
            min_sample_size: self.min_sample_size.unwrap_or(base.min_sample_size),
            auto_detect: self.auto_detect.unwrap_or(base.auto_detect),
            analysis_interval_ms: self.analysis_interval_ms.unwrap_or(base.analysis_interval_ms),
            max_issues: self.max_issues.unwrap_or(base.max_issues),
        }
    }
}

pub struct PerformanceAnalyzer {
    monitor: Arc<QueryMonitor>,
    config: ArcSwap<AnalyzerConfig>,
    issues: Mutex<Vec<PerformanceIssue>>,
    auto_task: Mutex<Option<PeriodicTask>>,
}

impl PerformanceAnalyzer {
    pub fn new(monitor: Arc<QueryMonitor>, config: AnalyzerConfig) -> Result<Self> {
        validate_analyzer_config(&config).map_err(|e| MonitorError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            monitor,
            config: ArcSwap::from_pointee(config),
            issues: Mutex::new(Vec::new()),
            auto_task: Mutex::new(None),
        })
    }

    pub fn config(&self) -> Arc<AnalyzerConfig> {
        self.config.load_full()
    }

    /// Analyze the monitor's current window and replace the stored issues
    pub fn run_analysis(&self) -> Vec<PerformanceIssue> {
        let config = self.config.load();
        let metrics = self.monitor.get_metrics(None);
        let slow: Vec<QueryMetric> = self
            .monitor
            .get_slow_queries(None)
            .into_iter()
            .map(|entry| entry.metric)
            .collect();

        let snapshot = Snapshot {
            metrics: &metrics,
            slow: &slow,
            total_calls: self.monitor.total_calls(),
            failure_count: self.monitor.failure_count(),
            now: self.monitor.clock().now_millis(),
        };
        let issues = detectors::detect_all(&snapshot, &config);

        for issue_type in IssueType::ALL {
            let count = issues.iter().filter(|i| i.issue_type == issue_type).count();
            crate::metrics::record_issues(issue_type.as_str(), count);
        }

        if issues.is_empty() {
            tracing::debug!(metrics = metrics.len(), "Analysis found no issues");
        } else {
            tracing::info!(
                issues = issues.len(),
                critical = issues.iter().filter(|i| i.severity == IssueSeverity::Critical).count(),
                metrics = metrics.len(),
                "Analysis found performance issues"
            );
        }

        *lock(&self.issues) = issues.clone();
        issues
    }

    /// Stored issues, optionally only those of exactly `severity`
    pub fn get_issues(&self, severity: Option<IssueSeverity>) -> Vec<PerformanceIssue> {
        let issues = lock(&self.issues);
        match severity {
            Some(severity) => issues.iter().filter(|i| i.severity == severity).cloned().collect(),
            None => issues.clone(),
        }
    }

    pub fn clear_issues(&self) {
        lock(&self.issues).clear();
    }

    /// Merge `update` into the current settings and swap them in atomically
    ///
    /// A new interval applies from the next cycle. Turning `auto_detect` off
    /// stops the loop; turning it back on needs [`Self::start_auto_analysis`].
    pub fn update_config(&self, update: AnalyzerConfigUpdate) -> Result<Arc<AnalyzerConfig>> {
        let next = update.apply(&self.config.load());
        validate_analyzer_config(&next).map_err(|e| MonitorError::InvalidConfig(e.to_string()))?;

        let auto_detect = next.auto_detect;
        let next = Arc::new(next);
        self.config.store(next.clone());
        tracing::info!(
            n1_threshold = next.n1_threshold,
            analysis_interval_ms = next.analysis_interval_ms,
            auto_detect = auto_detect,
            "Analyzer configuration updated"
        );

        if !auto_detect {
            let task = lock(&self.auto_task).take();
            if let Some(task) = task {
                // The loop also checks the flag, so a detached stop is enough
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(task.stop());
                }
            }
        }

        Ok(next)
    }

    /// Start periodic analysis; no-op when `auto_detect` is off or already running
    pub fn start_auto_analysis(self: &Arc<Self>) {
        if !self.config.load().auto_detect {
            return;
        }

        let mut slot = lock(&self.auto_task);
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let for_period: Weak<Self> = Arc::downgrade(self);
        let for_tick = for_period.clone();
        let fallback = self.config.load().analysis_interval();

        let task = PeriodicTask::spawn(
            "auto-analysis",
            move || {
                for_period
                    .upgrade()
                    .map(|analyzer| analyzer.config.load().analysis_interval())
                    .unwrap_or(fallback)
            },
            move || {
                let analyzer = for_tick.upgrade();
                async move {
                    let Some(analyzer) = analyzer else {
                        return false;
                    };
                    if !analyzer.config.load().auto_detect {
                        return false;
                    }
                    let run = std::panic::catch_unwind(AssertUnwindSafe(|| analyzer.run_analysis()));
                    if run.is_err() {
                        tracing::error!("Auto-analysis run panicked; keeping previous issues");
                    }
                    true
                }
            },
        );

        tracing::info!(interval_ms = self.config.load().analysis_interval_ms, "Auto-analysis started");
        *slot = Some(task);
    }

    pub async fn stop_auto_analysis(&self) {
        let task = lock(&self.auto_task).take();
        if let Some(task) = task {
            task.stop().await;
            tracing::info!("Auto-analysis stopped");
        }
    }

    pub fn is_auto_analysis_running(&self) -> bool {
        lock(&self.auto_task)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
