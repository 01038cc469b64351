//! Command implementations for the CLI
//!
//! - logs: Show slow-query log entries
//! - summary: Summarize one day of the log
//! - files: List log files
//! - report: Replay the log into a monitor and print the analysis
//! - config: Configuration display and validation

pub mod config;
pub mod files;
pub mod logs;
pub mod report;
pub mod summary;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use query_monitor::clock::SystemClock;
use query_monitor::config::Config;
use query_monitor::slow_log::LogReader;
use std::sync::Arc;

/// Reader over the configured log directory
pub fn log_reader(cfg: &Config) -> LogReader {
    LogReader::new(
        cfg.slow_log.log_directory.clone(),
        cfg.slow_log.rotate_daily,
        Arc::new(SystemClock::new()),
    )
}

/// Parse an optional `YYYY-MM-DD` argument
pub fn parse_date(date: Option<&str>) -> Result<Option<NaiveDate>> {
    date.map(|d| {
        NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", d))
    })
    .transpose()
}

/// Milliseconds as a UTC timestamp string
pub fn format_timestamp(millis: u64) -> String {
    chrono::DateTime::from_timestamp_millis(millis as i64)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}
