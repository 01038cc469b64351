use crate::monitor::Severity;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder
///
/// Fails if a recorder is already installed (e.g. a second engine in the same
/// process).
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "query_monitor_queries_total",
        "Total number of observed database calls"
    );
    describe_counter!(
        "query_monitor_slow_queries_total",
        "Observed calls classified warning or critical"
    );
    describe_counter!(
        "query_monitor_failures_total",
        "Observed calls whose underlying operation failed"
    );
    describe_histogram!(
        "query_monitor_query_duration_seconds",
        "Observed call duration in seconds"
    );
    describe_gauge!(
        "query_monitor_issues_detected",
        "Issues found by the last analysis run"
    );
    describe_counter!(
        "query_monitor_log_write_failures_total",
        "Failed slow-query log drain cycles"
    );
    describe_gauge!(
        "query_monitor_info",
        "Query monitor version information"
    );

    gauge!("query_monitor_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record one observed call
pub fn record_query(model: &str, action: &str, severity: Severity, duration_ms: u64) {
    counter!(
        "query_monitor_queries_total",
        "model" => model.to_string(),
        "action" => action.to_string(),
    )
    .increment(1);

    histogram!(
        "query_monitor_query_duration_seconds",
        "model" => model.to_string(),
        "action" => action.to_string(),
    )
    .record(duration_ms as f64 / 1000.0);

    if severity.is_slow() {
        record_slow(model, action, severity);
    }
}

pub fn record_slow(model: &str, action: &str, severity: Severity) {
    counter!(
        "query_monitor_slow_queries_total",
        "model" => model.to_string(),
        "action" => action.to_string(),
        "severity" => severity.as_str(),
    )
    .increment(1);
}

pub fn record_failure(model: &str, action: &str) {
    counter!(
        "query_monitor_failures_total",
        "model" => model.to_string(),
        "action" => action.to_string(),
    )
    .increment(1);
}

/// Set the issue gauge for one issue type after an analysis run
pub fn record_issues(issue_type: &'static str, count: usize) {
    gauge!("query_monitor_issues_detected", "type" => issue_type).set(count as f64);
}

pub fn record_log_write_failure(error_kind: &'static str) {
    counter!(
        "query_monitor_log_write_failures_total",
        "error_type" => error_kind,
    )
    .increment(1);
}
