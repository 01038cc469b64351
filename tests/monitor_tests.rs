/// Integration tests for severity classification, buffering and statistics
use query_monitor::{
    clock::ManualClock,
    config::MonitorConfig,
    monitor::{ExecutionRecord, PerformanceThresholds, QueryMonitor, Severity, ThresholdPair},
};
use std::sync::Arc;

fn monitor_with(config: MonitorConfig) -> QueryMonitor {
    QueryMonitor::new(&config, "test", Arc::new(ManualClock::new(1_000))).unwrap()
}

#[test]
fn test_user_count_scenario() {
    let monitor = monitor_with(MonitorConfig::default());

    for (i, duration) in [50, 60, 55, 5000, 45].into_iter().enumerate() {
        monitor.track(ExecutionRecord::new("User", "count", duration, 1_000 + i as u64));
    }

    let stats = monitor.get_stats(None);
    assert_eq!(stats.total_queries, 5);
    assert_eq!(stats.slow_queries, 1);
    assert_eq!(stats.critical_queries, 1);

    let slow = monitor.get_slow_queries(None);
    assert_eq!(slow.len(), 1);
    assert_eq!(slow[0].severity(), Severity::Critical);
    assert_eq!(slow[0].metric.duration_ms(), 5000);
}

#[test]
fn test_buffer_length_is_min_of_calls_and_capacity() {
    for (calls, capacity) in [(3usize, 10usize), (10, 10), (25, 10)] {
        let monitor = monitor_with(MonitorConfig {
            max_metrics: capacity,
            ..MonitorConfig::default()
        });
        for i in 0..calls {
            monitor.track(ExecutionRecord::new("User", "findMany", 5, i as u64));
        }
        assert_eq!(monitor.get_metrics(None).len(), calls.min(capacity));
        assert_eq!(monitor.total_calls(), calls as u64);
    }
}

#[test]
fn test_percentiles_are_ordered() {
    let monitor = monitor_with(MonitorConfig::default());
    let durations = [3, 900, 12, 45, 7, 2200, 130, 61, 5, 3300, 18, 27, 404];
    for (i, d) in durations.into_iter().enumerate() {
        monitor.track(ExecutionRecord::new("Post", "findMany", d, i as u64));
    }

    let stats = monitor.get_stats(None);
    assert!(stats.median_duration_ms <= stats.p95_duration_ms);
    assert!(stats.p95_duration_ms <= stats.p99_duration_ms);
    assert!(stats.p99_duration_ms <= stats.max_duration_ms);
    assert_eq!(stats.max_duration_ms, 3300);
    assert_eq!(stats.min_duration_ms, 3);
}

#[test]
fn test_severity_is_monotonic_across_layers() {
    let thresholds = PerformanceThresholds::new(ThresholdPair::new(1000, 3000))
        .with_model("User", ThresholdPair::new(200, 800))
        .with_action("count", ThresholdPair::new(500, 2000));
    thresholds.validate().unwrap();

    let monitor = monitor_with(MonitorConfig {
        thresholds,
        ..MonitorConfig::default()
    });

    for (model, action) in [("User", "count"), ("Post", "count"), ("Post", "findMany"), ("User", "findMany")] {
        let mut previous = Severity::Normal;
        for d in (0..6000).step_by(25) {
            let level = monitor.get_severity(model, action, d);
            assert!(level.severity >= previous, "{}.{} regressed at {}ms", model, action, d);
            assert_eq!(level.is_slow, level.severity != Severity::Normal);
            previous = level.severity;
        }
    }

    // Model layer wins over action layer
    assert_eq!(monitor.get_severity("User", "count", 900).severity, Severity::Critical);
    assert_eq!(monitor.get_severity("Post", "count", 900).severity, Severity::Warning);
}

#[test]
fn test_failure_rate_independent_of_buffer() {
    let monitor = monitor_with(MonitorConfig {
        max_metrics: 2,
        ..MonitorConfig::default()
    });
    for i in 0..10 {
        let record = ExecutionRecord::new("User", "create", 5, i);
        let record = if i % 2 == 0 { record.with_error("deadlock") } else { record };
        monitor.track(record);
    }
    monitor.track_failure();

    assert_eq!(monitor.get_metrics(None).len(), 2);
    assert_eq!(monitor.total_calls(), 11);
    assert_eq!(monitor.failure_count(), 6);
    assert!((monitor.error_rate() - 6.0 / 11.0).abs() < 1e-9);
}
