//! Logs query command
//!
//! Read and display entries from the durable slow-query log.

use super::{format_timestamp, log_reader, parse_date};
use anyhow::{bail, Result};
use clap::Parser;
use colored::Colorize;
use query_monitor::analytics::DAY_MS;
use query_monitor::clock::current_millis;
use query_monitor::config::Config;
use query_monitor::monitor::{Severity, SlowQueryLogEntry};
use query_monitor::slow_log::console::format_console_line;

/// Show slow-query log entries
#[derive(Debug, Clone, Parser)]
pub struct LogsArgs {
    /// Day to read (YYYY-MM-DD, UTC); defaults to today
    #[arg(short, long, conflicts_with = "days")]
    pub date: Option<String>,

    /// Read the last N days instead of a single day
    #[arg(long)]
    pub days: Option<u32>,

    /// Filter by model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Minimum severity (warning, critical)
    #[arg(short, long)]
    pub severity: Option<String>,

    /// Maximum number of entries (most recent kept)
    #[arg(long, default_value = "100")]
    pub limit: usize,

    /// Include redacted arguments
    #[arg(long)]
    pub show_args: bool,

    /// Output format (text, json)
    #[arg(short = 'f', long, default_value = "text")]
    pub format: String,
}

/// Execute the logs command
pub async fn execute(cfg: &Config, args: LogsArgs) -> Result<()> {
    let min_severity = parse_severity(args.severity.as_deref())?;
    let reader = log_reader(cfg);

    let entries = match args.days {
        Some(days) => {
            let now = current_millis();
            reader
                .get_logs_in_range(now.saturating_sub(u64::from(days.max(1)) * DAY_MS), now)
                .await?
        }
        None => reader.read_logs(parse_date(args.date.as_deref())?).await?,
    };

    let entries = filter_entries(entries, args.model.as_deref(), min_severity, args.limit);

    if entries.is_empty() {
        println!("{}", "No slow queries found matching the criteria".yellow());
        return Ok(());
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        _ => display_entries_text(&entries, args.show_args),
    }

    Ok(())
}

fn parse_severity(severity: Option<&str>) -> Result<Severity> {
    match severity.map(|s| s.to_ascii_lowercase()).as_deref() {
        None | Some("warning") => Ok(Severity::Warning),
        Some("critical") => Ok(Severity::Critical),
        Some(other) => bail!("Unknown severity '{}', expected warning or critical", other),
    }
}

fn filter_entries(
    entries: Vec<SlowQueryLogEntry>,
    model: Option<&str>,
    min_severity: Severity,
    limit: usize,
) -> Vec<SlowQueryLogEntry> {
    let mut entries: Vec<SlowQueryLogEntry> = entries
        .into_iter()
        .filter(|e| model.map_or(true, |m| e.metric.model() == m))
        .filter(|e| e.severity() >= min_severity)
        .collect();

    let skip = entries.len().saturating_sub(limit);
    entries.drain(..skip);
    entries
}

fn display_entries_text(entries: &[SlowQueryLogEntry], show_args: bool) {
    println!("{}", format!("Found {} slow queries", entries.len()).bold());
    println!();

    for entry in entries {
        println!(
            "{} {}",
            format_timestamp(entry.timestamp()).dimmed(),
            format_console_line(entry, show_args)
        );
    }
}
