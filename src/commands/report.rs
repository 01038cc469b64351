//! Report command
//!
//! Replays the durable slow-query log into a fresh in-memory monitor and runs
//! the analyzer and the reporter over it.

use super::log_reader;
use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use query_monitor::analytics::{slow_query_insights, AnalyticsReport, QueryAnalytics, SlowQueryInsights, DAY_MS};
use query_monitor::analyzer::{IssueSeverity, PerformanceAnalyzer, PerformanceIssue};
use query_monitor::clock::{Clock, SystemClock};
use query_monitor::config::{Config, MonitorConfig};
use query_monitor::monitor::{QueryMonitor, SlowQueryLogEntry, TimeRange};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Parser)]
pub struct ReportArgs {
    /// Days of log to replay
    #[arg(short, long, default_value = "1")]
    pub days: u32,

    /// Output format (text, json, prometheus)
    #[arg(short = 'f', long, default_value = "text")]
    pub format: String,
}

#[derive(Debug, Serialize)]
struct FullReport {
    report: AnalyticsReport,
    issues: Vec<PerformanceIssue>,
    insights: SlowQueryInsights,
}

/// Execute the report command
pub async fn execute(cfg: &Config, args: ReportArgs) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let days = args.days.max(1);
    let range = TimeRange::ending_at(clock.now_millis(), u64::from(days) * DAY_MS);

    // The replay feeds the recorder, so it has to be in place first
    let prometheus = match args.format.as_str() {
        "prometheus" => Some(query_monitor::metrics::init_metrics()?),
        _ => None,
    };

    let entries = log_reader(cfg).get_logs_in_range(range.start, range.end).await?;
    tracing::info!(entries = entries.len(), days = days, "Replaying slow-query log");

    let full = build_report(cfg, clock, range, days, &entries)?;

    match (args.format.as_str(), prometheus) {
        (_, Some(handle)) => print!("{}", handle.render()),
        ("json", None) => println!("{}", serde_json::to_string_pretty(&full)?),
        _ => display_report(&full),
    }

    Ok(())
}

fn build_report(
    cfg: &Config,
    clock: Arc<dyn Clock>,
    range: TimeRange,
    days: u32,
    entries: &[SlowQueryLogEntry],
) -> Result<FullReport> {
    let capacity = entries.len().max(1);
    let monitor_cfg = MonitorConfig {
        max_metrics: capacity,
        max_slow_queries: capacity,
        thresholds: cfg.monitor.thresholds.clone(),
    };
    let monitor = Arc::new(QueryMonitor::new(&monitor_cfg, cfg.environment.clone(), clock)?);
    for entry in entries {
        monitor.track(entry.metric.record.clone());
    }

    let analyzer = PerformanceAnalyzer::new(monitor.clone(), cfg.analyzer.clone())?;
    let issues = analyzer.run_analysis();
    let report = QueryAnalytics::new(monitor, None).generate_report(Some(range));

    Ok(FullReport {
        report,
        issues,
        insights: slow_query_insights(days, entries),
    })
}

fn display_report(full: &FullReport) {
    let stats = &full.report.stats;

    println!("{}", "Slow-query report".green().bold());
    println!();
    println!("  Replayed:  {}", stats.total_queries);
    println!("  Warning:   {}", stats.warning_queries.to_string().yellow());
    println!("  Critical:  {}", stats.critical_queries.to_string().red());
    println!("  Failed:    {}", stats.failed_queries);
    println!(
        "  Latency:   avg {:.1}ms  p50 {}ms  p95 {}ms  p99 {}ms  max {}ms",
        stats.avg_duration_ms,
        stats.median_duration_ms,
        stats.p95_duration_ms,
        stats.p99_duration_ms,
        stats.max_duration_ms
    );
    if let Some(hour) = full.insights.peak_hour {
        println!("  Peak hour: {:02}:00 UTC", hour);
    }
    println!();

    println!("{}", "Issues:".bold());
    if full.issues.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for issue in &full.issues {
        let severity = match issue.severity {
            IssueSeverity::Critical => issue.severity.as_str().red().bold(),
            IssueSeverity::High => issue.severity.as_str().red(),
            IssueSeverity::Medium => issue.severity.as_str().yellow(),
            IssueSeverity::Low => issue.severity.as_str().normal(),
        };
        println!("  [{}] {}", severity, issue.title);
        println!("    {}", issue.description.dimmed());
    }
    println!();

    println!("{}", "Top patterns:".bold());
    for pattern in &full.report.top_patterns {
        println!(
            "  {:<48} {:>6} calls  avg {:>8.1}ms  slow {:>5.1}%  {}",
            pattern.signature, pattern.count, pattern.avg_duration_ms, pattern.slow_rate, pattern.trend
        );
    }
    println!();

    println!("{}", "Recommendations:".bold());
    if full.report.recommendations.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for rec in &full.report.recommendations {
        println!("  [{}] {}", rec.severity, rec.reason);
        for suggestion in &rec.suggestions {
            println!("    - {}", suggestion);
        }
    }
}
