//! Console mirroring of slow-query entries

use crate::monitor::{Severity, SlowQueryLogEntry};
use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Minimum severity mirrored to the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLogLevel {
    All,
    #[default]
    Warning,
    Critical,
}

impl ConsoleLogLevel {
    pub fn allows(self, severity: Severity) -> bool {
        match self {
            ConsoleLogLevel::All => true,
            ConsoleLogLevel::Warning => severity >= Severity::Warning,
            ConsoleLogLevel::Critical => severity >= Severity::Critical,
        }
    }
}

/// One-line, colored rendering of an entry
pub fn format_console_line(entry: &SlowQueryLogEntry, show_args: bool) -> String {
    let metric = &entry.metric;

    let tag = match metric.severity {
        Severity::Critical => "[CRITICAL QUERY]".red().bold(),
        Severity::Warning => "[SLOW QUERY]".yellow().bold(),
        Severity::Normal => "[QUERY]".normal(),
    };

    let duration = format!("{}ms", metric.duration_ms());
    let duration = match metric.severity {
        Severity::Critical => duration.red(),
        Severity::Warning => duration.yellow(),
        Severity::Normal => duration.normal(),
    };

    let mut line = format!(
        "{} {}.{} took {} [{}]",
        tag,
        metric.model(),
        metric.action(),
        duration,
        entry.environment
    );

    if metric.record.cached {
        line.push_str(" (cached)");
    }

    if let Some(error) = &metric.record.error {
        line.push_str(&format!(" error={}", error.red()));
    }

    if show_args && !metric.record.args_fingerprint.is_null() {
        line.push_str(&format!(
            " args={}",
            metric.record.args_fingerprint.to_string().dimmed()
        ));
    }

    line
}

/// Print an entry to stderr when `level` lets it through
pub fn mirror(entry: &SlowQueryLogEntry, level: ConsoleLogLevel, show_args: bool) {
    if level.allows(entry.severity()) {
        eprintln!("{}", format_console_line(entry, show_args));
    }
}
