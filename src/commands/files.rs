use super::{format_timestamp, log_reader};
use anyhow::Result;
use colored::Colorize;
use query_monitor::config::Config;
use std::time::UNIX_EPOCH;

/// Execute the files command
pub async fn execute(cfg: &Config) -> Result<()> {
    let files = log_reader(cfg).list_files().await?;

    println!(
        "{} {}",
        "Log directory:".bold(),
        cfg.slow_log.log_directory.display()
    );

    if files.is_empty() {
        println!("{}", "No log files found".yellow());
        return Ok(());
    }

    let total: u64 = files.iter().map(|f| f.size).sum();
    for file in &files {
        let modified = file
            .modified
            .duration_since(UNIX_EPOCH)
            .map(|d| format_timestamp(d.as_millis() as u64))
            .unwrap_or_default();
        println!(
            "  {:<48} {:>10}  {}",
            file.name,
            format_size(file.size),
            modified.dimmed()
        );
    }
    println!();
    println!(
        "{} files, {} (retention cap {})",
        files.len(),
        format_size(total),
        cfg.slow_log.max_log_files
    );

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}
