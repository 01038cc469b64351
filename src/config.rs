use crate::monitor::PerformanceThresholds;
use crate::slow_log::ConsoleLogLevel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Deployment label stamped on every slow-query log entry
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub slow_log: SlowLogConfig,

    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            logging: LoggingConfig::default(),
            monitor: MonitorConfig::default(),
            slow_log: SlowLogConfig::default(),
            analyzer: AnalyzerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default tracing level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// In-memory collector settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Ring buffer capacity for all metrics (default: 10000)
    #[serde(default = "default_max_metrics")]
    pub max_metrics: usize,

    /// Ring buffer capacity for slow entries (default: 1000)
    #[serde(default = "default_max_slow_queries")]
    pub max_slow_queries: usize,

    /// Layered latency limits; an override's warning limit may not exceed
    /// the critical limit of any less specific layer (see
    /// [`PerformanceThresholds::validate`])
    #[serde(default)]
    pub thresholds: PerformanceThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_metrics: default_max_metrics(),
            max_slow_queries: default_max_slow_queries(),
            thresholds: PerformanceThresholds::default(),
        }
    }
}

/// Durable slow-query log settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlowLogConfig {
    #[serde(default = "default_true")]
    pub enable_file_logging: bool,

    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,

    /// Retention cap on log files in the directory (default: 30)
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,

    /// Size ceiling before the active file is archived (default: 10 MiB)
    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    #[serde(default = "default_true")]
    pub enable_console_logging: bool,

    #[serde(default)]
    pub console_log_level: ConsoleLogLevel,

    /// Include redacted arguments in console lines
    #[serde(default)]
    pub console_show_args: bool,

    /// One file per calendar day (UTC) instead of a fixed file name
    #[serde(default = "default_true")]
    pub rotate_daily: bool,

    /// Background drain period in milliseconds (default: 10000)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Queue length that triggers an early drain (default: 100)
    #[serde(default = "default_flush_batch_size")]
    pub flush_batch_size: usize,

    /// Queue bound; oldest queued entries are dropped beyond it (default: 10000)
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

impl Default for SlowLogConfig {
    fn default() -> Self {
        Self {
            enable_file_logging: true,
            log_directory: default_log_directory(),
            max_log_files: default_max_log_files(),
            max_log_size_bytes: default_max_log_size_bytes(),
            enable_console_logging: true,
            console_log_level: ConsoleLogLevel::default(),
            console_show_args: false,
            rotate_daily: true,
            flush_interval_ms: default_flush_interval_ms(),
            flush_batch_size: default_flush_batch_size(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

impl SlowLogConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Issue detection settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    /// Repetitions of one `Model.action` inside the window that flag N+1 (default: 10)
    #[serde(default = "default_n1_threshold")]
    pub n1_threshold: usize,

    /// N+1 sliding window in milliseconds (default: 1000)
    #[serde(default = "default_n1_time_window_ms")]
    pub n1_time_window_ms: u64,

    /// Minimum max-duration for a slow group to be reported (default: 1000)
    #[serde(default = "default_slow_query_threshold_ms")]
    pub slow_query_threshold_ms: u64,

    /// Cache-hit fraction below which an issue is raised (default: 0.30)
    #[serde(default = "default_poor_cache_hit_rate_threshold")]
    pub poor_cache_hit_rate_threshold: f64,

    /// Failure fraction above which an issue is raised (default: 0.05)
    #[serde(default = "default_high_error_rate_threshold")]
    pub high_error_rate_threshold: f64,

    /// Observed calls required before rate-based rules apply (default: 50)
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,

    #[serde(default = "default_true")]
    pub auto_detect: bool,

    /// Auto-analysis period in milliseconds (default: 60000)
    #[serde(default = "default_analysis_interval_ms")]
    pub analysis_interval_ms: u64,

    /// Upper bound on retained issues (default: 100)
    #[serde(default = "default_max_issues")]
    pub max_issues: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            n1_threshold: default_n1_threshold(),
            n1_time_window_ms: default_n1_time_window_ms(),
            slow_query_threshold_ms: default_slow_query_threshold_ms(),
            poor_cache_hit_rate_threshold: default_poor_cache_hit_rate_threshold(),
            high_error_rate_threshold: default_high_error_rate_threshold(),
            min_sample_size: default_min_sample_size(),
            auto_detect: true,
            analysis_interval_ms: default_analysis_interval_ms(),
            max_issues: default_max_issues(),
        }
    }
}

impl AnalyzerConfig {
    pub fn analysis_interval(&self) -> Duration {
        Duration::from_millis(self.analysis_interval_ms)
    }
}

fn default_environment() -> String {
    std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_metrics() -> usize {
    10_000
}

fn default_max_slow_queries() -> usize {
    1_000
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("./logs/slow-queries")
}

fn default_max_log_files() -> usize {
    30
}

fn default_max_log_size_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_flush_interval_ms() -> u64 {
    10_000
}

fn default_flush_batch_size() -> usize {
    100
}

fn default_max_queue_size() -> usize {
    10_000
}

fn default_n1_threshold() -> usize {
    10
}

fn default_n1_time_window_ms() -> u64 {
    1_000
}

fn default_slow_query_threshold_ms() -> u64 {
    1_000
}

fn default_poor_cache_hit_rate_threshold() -> f64 {
    0.30
}

fn default_high_error_rate_threshold() -> f64 {
    0.05
}

fn default_min_sample_size() -> usize {
    50
}

fn default_analysis_interval_ms() -> u64 {
    60_000
}

fn default_max_issues() -> usize {
    100
}

/// Load configuration from a TOML file (optional) plus `QUERY_MONITOR__*` env overrides
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("QUERY_MONITOR").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    cfg.monitor.thresholds.validate()?;

    if cfg.monitor.max_metrics == 0 || cfg.monitor.max_slow_queries == 0 {
        anyhow::bail!("monitor.max_metrics and monitor.max_slow_queries must be greater than zero");
    }

    if cfg.slow_log.enable_file_logging {
        if cfg.slow_log.max_log_files == 0 {
            anyhow::bail!("slow_log.max_log_files must be at least 1");
        }
        if cfg.slow_log.max_log_size_bytes == 0 {
            anyhow::bail!("slow_log.max_log_size_bytes must be greater than zero");
        }
        if cfg.slow_log.log_directory.as_os_str().is_empty() {
            anyhow::bail!("slow_log.log_directory cannot be empty");
        }
    }

    if cfg.slow_log.flush_interval_ms == 0 {
        anyhow::bail!("slow_log.flush_interval_ms must be greater than zero");
    }

    validate_analyzer_config(&cfg.analyzer)?;

    match cfg.logging.format.as_str() {
        "text" | "json" => {}
        other => anyhow::bail!("logging.format must be 'text' or 'json', got '{}'", other),
    }

    Ok(())
}

pub fn validate_analyzer_config(cfg: &AnalyzerConfig) -> anyhow::Result<()> {
    if cfg.n1_threshold < 2 {
        anyhow::bail!("analyzer.n1_threshold must be at least 2");
    }
    if cfg.n1_time_window_ms == 0 {
        anyhow::bail!("analyzer.n1_time_window_ms must be greater than zero");
    }
    if !(0.0..=1.0).contains(&cfg.poor_cache_hit_rate_threshold) {
        anyhow::bail!("analyzer.poor_cache_hit_rate_threshold must be within 0.0..=1.0");
    }
    if !(0.0..=1.0).contains(&cfg.high_error_rate_threshold) {
        anyhow::bail!("analyzer.high_error_rate_threshold must be within 0.0..=1.0");
    }
    if cfg.analysis_interval_ms == 0 {
        anyhow::bail!("analyzer.analysis_interval_ms must be greater than zero");
    }
    if cfg.max_issues == 0 {
        anyhow::bail!("analyzer.max_issues must be greater than zero");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ThresholdPair;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(validate_config(&cfg).is_ok());
        assert_eq!(cfg.monitor.max_metrics, 10_000);
        assert_eq!(cfg.monitor.max_slow_queries, 1_000);
        assert_eq!(cfg.analyzer.n1_threshold, 10);
        assert_eq!(cfg.analyzer.analysis_interval(), Duration::from_secs(60));
        assert_eq!(cfg.slow_log.flush_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_zero_retention() {
        let mut cfg = Config::default();
        cfg.slow_log.max_log_files = 0;

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_log_files"));
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut cfg = Config::default();
        cfg.monitor.thresholds.global = ThresholdPair::new(5000, 100);
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_rates() {
        let mut cfg = Config::default();
        cfg.analyzer.high_error_rate_threshold = 1.5;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
            environment = "staging"

            [monitor]
            max_metrics = 500

            [monitor.thresholds.global]
            warning_ms = 200
            critical_ms = 800

            [monitor.thresholds.models.AuditLog]
            warning_ms = 100
            critical_ms = 400

            [slow_log]
            console_log_level = "critical"
            rotate_daily = false

            [analyzer]
            n1_threshold = 5
        "#;

        let cfg: Config = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.environment, "staging");
        assert_eq!(cfg.monitor.max_metrics, 500);
        assert_eq!(cfg.monitor.max_slow_queries, 1_000);
        assert_eq!(cfg.monitor.thresholds.global.warning_ms, 200);
        assert_eq!(cfg.monitor.thresholds.models["AuditLog"].critical_ms, 400);
        assert_eq!(cfg.slow_log.console_log_level, ConsoleLogLevel::Critical);
        assert!(!cfg.slow_log.rotate_daily);
        assert!(cfg.slow_log.enable_file_logging);
        assert_eq!(cfg.analyzer.n1_threshold, 5);
        assert_eq!(cfg.analyzer.n1_time_window_ms, 1_000);
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.analyzer.n1_threshold, 10);
    }
}
