use anyhow::Result;
use colored::Colorize;
use query_monitor::config::{self, Config};
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the effective configuration (file plus environment overrides)
pub fn show(path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!(path = %path.display(), "Loading configuration for display");

    let cfg = config::load_config(path)?;

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&cfg)?;
    println!("{}", toml_string);

    info!("Configuration displayed successfully");
    Ok(())
}

/// Execute the config validate command
pub fn validate(path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!(path = %path.display(), "Validating configuration file");

    let cfg = config::load_config(path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    for line in summary_lines(&cfg) {
        println!("  {}", line);
    }

    info!("Configuration validation successful");
    Ok(())
}

fn summary_lines(cfg: &Config) -> Vec<String> {
    let thresholds = &cfg.monitor.thresholds;
    vec![
        format!("Environment: {}", cfg.environment),
        format!(
            "Global thresholds: warning {}ms, critical {}ms",
            thresholds.global.warning_ms, thresholds.global.critical_ms
        ),
        format!(
            "Overrides: {} model(s), {} action(s)",
            thresholds.models.len(),
            thresholds.actions.len()
        ),
        format!(
            "Buffers: {} metrics, {} slow queries",
            cfg.monitor.max_metrics, cfg.monitor.max_slow_queries
        ),
        if cfg.slow_log.enable_file_logging {
            format!(
                "Slow log: {} (keep {} files, rotate at {} bytes)",
                cfg.slow_log.log_directory.display(),
                cfg.slow_log.max_log_files,
                cfg.slow_log.max_log_size_bytes
            )
        } else {
            "Slow log: disabled".to_string()
        },
        format!(
            "Auto-analysis: {}",
            if cfg.analyzer.auto_detect {
                format!("every {}ms", cfg.analyzer.analysis_interval_ms)
            } else {
                "off".to_string()
            }
        ),
    ]
}
