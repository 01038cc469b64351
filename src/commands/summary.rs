use super::{format_timestamp, log_reader, parse_date};
use anyhow::Result;
use colored::Colorize;
use query_monitor::config::Config;
use query_monitor::slow_log::LogSummary;
use tracing::info;

/// Execute the summary command
pub async fn execute(cfg: &Config, date: Option<String>, format: &str) -> Result<()> {
    let date = parse_date(date.as_deref())?;
    info!(directory = %cfg.slow_log.log_directory.display(), "Summarizing slow-query log");

    let summary = log_reader(cfg).get_log_summary(date).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => display_summary(&summary),
    }

    Ok(())
}

fn display_summary(summary: &LogSummary) {
    println!("{}", format!("Slow-query summary for {}", summary.date).green().bold());
    println!();

    if summary.total == 0 {
        println!("{}", "No slow queries logged".yellow());
        return;
    }

    println!("  Total:    {}", summary.total);
    println!("  Warning:  {}", summary.warning.to_string().yellow());
    println!("  Critical: {}", summary.critical.to_string().red());
    println!("  Avg:      {:.1}ms", summary.avg_duration_ms);
    println!("  Max:      {}ms", summary.max_duration_ms);
    println!();

    println!("{}", "By model:".bold());
    for (model, rollup) in &summary.by_model {
        println!(
            "  {:<24} {:>6} calls  avg {:>8.1}ms",
            model, rollup.count, rollup.avg_duration_ms
        );
    }
    println!();

    println!("{}", "By action:".bold());
    for (action, rollup) in &summary.by_action {
        println!(
            "  {:<24} {:>6} calls  avg {:>8.1}ms",
            action, rollup.count, rollup.avg_duration_ms
        );
    }
    println!();

    println!("{}", "Slowest:".bold());
    for entry in &summary.slowest {
        println!(
            "  {} {}.{} {}ms",
            format_timestamp(entry.timestamp()).dimmed(),
            entry.metric.model(),
            entry.metric.action(),
            entry.metric.duration_ms().to_string().red()
        );
    }
    println!();

    println!("{} {}", "Files:".bold(), summary.files.join(", ").dimmed());
}
