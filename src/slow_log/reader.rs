//! Replay of the durable slow-query log

use super::rotation::{self, day_of, day_prefix, LogFileInfo};
use crate::clock::Clock;
use crate::error::{MonitorError, Result};
use crate::monitor::{Rollup, Severity, SlowQueryLogEntry};
use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Entries listed in a summary's `slowest`
pub const SUMMARY_TOP_N: usize = 5;

/// Per-day digest of the durable log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSummary {
    pub date: NaiveDate,
    pub total: usize,
    pub warning: usize,
    pub critical: usize,
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
    pub by_model: BTreeMap<String, Rollup>,
    pub by_action: BTreeMap<String, Rollup>,
    pub slowest: Vec<SlowQueryLogEntry>,
    pub files: Vec<String>,
}

/// Read side of the slow-query log directory
#[derive(Debug, Clone)]
pub struct LogReader {
    directory: PathBuf,
    rotate_daily: bool,
    clock: Arc<dyn Clock>,
}

impl LogReader {
    pub fn new(directory: impl Into<PathBuf>, rotate_daily: bool, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory: directory.into(),
            rotate_daily,
            clock,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn today(&self) -> NaiveDate {
        day_of(self.clock.now_millis())
    }

    /// Entries for one calendar day (default: today), oldest first
    ///
    /// With daily rotation the day's files and the next day's are read;
    /// without it every log file is. Entries are filtered by their own day.
    pub async fn read_logs(&self, date: Option<NaiveDate>) -> Result<Vec<SlowQueryLogEntry>> {
        let date = date.unwrap_or_else(|| self.today());
        let files = rotation::list_log_files(&self.directory).await?;

        let files: Vec<&LogFileInfo> = if self.rotate_daily {
            // A drain right after midnight lands in the next day's file
            let prefixes: Vec<String> = std::iter::once(date)
                .chain(date.succ_opt())
                .map(day_prefix)
                .collect();
            files
                .iter()
                .filter(|f| prefixes.iter().any(|p| f.name.starts_with(p)))
                .collect()
        } else {
            files.iter().collect()
        };

        let contents = try_join_all(files.iter().map(|file| read_log_file(&file.path))).await?;

        let mut entries: Vec<SlowQueryLogEntry> = contents
            .into_iter()
            .flatten()
            .filter(|e| day_of(e.timestamp()) == date)
            .collect();
        entries.sort_by_key(|e| e.timestamp());
        Ok(entries)
    }

    /// Entries with `start <= timestamp <= end`, oldest first
    pub async fn get_logs_in_range(&self, start: u64, end: u64) -> Result<Vec<SlowQueryLogEntry>> {
        if start > end {
            return Ok(Vec::new());
        }

        // A drain right after midnight lands in the next day's file
        let first_day = day_of(start);
        let last_day = day_of(end).succ_opt().unwrap_or_else(|| day_of(end));

        let files: Vec<LogFileInfo> = rotation::list_log_files(&self.directory)
            .await?
            .into_iter()
            .filter(|file| {
                !self.rotate_daily
                    || file_day(file).map_or(true, |day| day >= first_day && day <= last_day)
            })
            .collect();

        // Files are independent; read them concurrently
        let contents = try_join_all(files.iter().map(|file| read_log_file(&file.path))).await?;

        let mut entries: Vec<SlowQueryLogEntry> = contents
            .into_iter()
            .flatten()
            .filter(|e| e.timestamp() >= start && e.timestamp() <= end)
            .collect();
        entries.sort_by_key(|e| e.timestamp());
        Ok(entries)
    }

    /// File names in the log directory, oldest first
    pub async fn get_log_files(&self) -> Result<Vec<String>> {
        Ok(rotation::list_log_files(&self.directory)
            .await?
            .into_iter()
            .map(|f| f.name)
            .collect())
    }

    pub async fn list_files(&self) -> Result<Vec<LogFileInfo>> {
        rotation::list_log_files(&self.directory).await
    }

    pub async fn get_log_summary(&self, date: Option<NaiveDate>) -> Result<LogSummary> {
        let date = date.unwrap_or_else(|| self.today());
        let entries = self.read_logs(Some(date)).await?;

        let files = if self.rotate_daily {
            let prefix = day_prefix(date);
            self.get_log_files()
                .await?
                .into_iter()
                .filter(|name| name.starts_with(&prefix))
                .collect()
        } else {
            self.get_log_files().await?
        };

        Ok(summarize(date, &entries, files))
    }
}

/// Parse one NDJSON file
///
/// A missing file reads as empty; malformed lines are skipped with a warning.
pub async fn read_log_file(path: &Path) -> Result<Vec<SlowQueryLogEntry>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(MonitorError::io(path, e)),
    };

    let mut entries = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<SlowQueryLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(
                    file = %path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping malformed slow-query log line"
                );
            }
        }
    }

    Ok(entries)
}

/// Day encoded in a daily file name (`slow-queries-YYYY-MM-DD[...]`)
fn file_day(file: &LogFileInfo) -> Option<NaiveDate> {
    let rest = file.name.strip_prefix(rotation::LOG_FILE_PREFIX)?.strip_prefix('-')?;
    NaiveDate::parse_from_str(rest.get(..10)?, "%Y-%m-%d").ok()
}

fn summarize(date: NaiveDate, entries: &[SlowQueryLogEntry], files: Vec<String>) -> LogSummary {
    let mut by_model: BTreeMap<String, Rollup> = BTreeMap::new();
    let mut by_action: BTreeMap<String, Rollup> = BTreeMap::new();
    let mut warning = 0;
    let mut critical = 0;
    let mut total_duration = 0u64;
    let mut max_duration = 0u64;

    for entry in entries {
        let duration = entry.metric.duration_ms();
        match entry.severity() {
            Severity::Warning => warning += 1,
            Severity::Critical => critical += 1,
            Severity::Normal => {}
        }
        total_duration += duration;
        max_duration = max_duration.max(duration);

        for rollup in [
            by_model.entry(entry.metric.model().to_string()).or_default(),
            by_action.entry(entry.metric.action().to_string()).or_default(),
        ] {
            rollup.count += 1;
            rollup.total_duration_ms += duration;
            if entry.severity().is_slow() {
                rollup.slow_count += 1;
            }
        }
    }

    for rollup in by_model.values_mut().chain(by_action.values_mut()) {
        rollup.avg_duration_ms = rollup.total_duration_ms as f64 / rollup.count as f64;
    }

    let mut slowest = entries.to_vec();
    slowest.sort_by(|a, b| b.metric.duration_ms().cmp(&a.metric.duration_ms()));
    slowest.truncate(SUMMARY_TOP_N);

    LogSummary {
        date,
        total: entries.len(),
        warning,
        critical,
        avg_duration_ms: if entries.is_empty() {
            0.0
        } else {
            total_duration as f64 / entries.len() as f64
        },
        max_duration_ms: max_duration,
        by_model,
        by_action,
        slowest,
        files,
    }
}
