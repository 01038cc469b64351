/// Integration tests for the durable slow-query log
use query_monitor::{
    clock::{Clock, ManualClock},
    config::SlowLogConfig,
    monitor::{ExecutionRecord, QueryMetric, Severity, SlowQueryLogEntry},
    slow_log::SlowQueryLogger,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// 2026-10-18T12:00:00Z
const NOON: u64 = 1_792_324_800_000;

fn config(dir: &Path) -> SlowLogConfig {
    SlowLogConfig {
        log_directory: dir.to_path_buf(),
        enable_console_logging: false,
        ..SlowLogConfig::default()
    }
}

fn entry(i: u64) -> SlowQueryLogEntry {
    let record = ExecutionRecord::new("Order", "findMany", 1000 + i * 10, NOON + i * 1000)
        .with_args(json!({"where": {"customerId": i}, "take": 20}))
        .with_cached(i % 3 == 0);
    let severity = if i % 4 == 0 { Severity::Critical } else { Severity::Warning };
    SlowQueryLogEntry::new(QueryMetric::new(record, format!("hash{}", i % 2), severity), "production")
}

#[tokio::test]
async fn test_empty_directory_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let logger = SlowQueryLogger::new(config(dir.path()), Arc::new(ManualClock::new(NOON)));

    assert!(logger.read_logs(None).await.unwrap().is_empty());
    assert!(logger.get_logs_in_range(0, u64::MAX).await.unwrap().is_empty());
    assert!(logger.get_log_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_round_trip_over_full_span() {
    let dir = tempfile::tempdir().unwrap();
    let logger = SlowQueryLogger::new(config(dir.path()), Arc::new(ManualClock::new(NOON)));

    let written: Vec<_> = (0..25).map(entry).collect();
    for e in &written {
        logger.log(e.clone());
    }
    logger.flush().await.unwrap();

    let start = written.iter().map(|e| e.timestamp()).min().unwrap();
    let end = written.iter().map(|e| e.timestamp()).max().unwrap();
    let read = logger.get_logs_in_range(start, end).await.unwrap();

    assert_eq!(read.len(), written.len());
    for e in &written {
        assert!(read.contains(e));
    }
}

#[tokio::test]
async fn test_rotation_creates_one_archive_and_resets_active() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(NOON));
    let logger = SlowQueryLogger::new(
        SlowLogConfig {
            max_log_size_bytes: 1024,
            ..config(dir.path())
        },
        clock.clone(),
    );

    logger.log(entry(0));
    logger.flush().await.unwrap();
    assert_eq!(logger.get_log_files().await.unwrap().len(), 1);

    for i in 1..10 {
        logger.log(entry(i));
    }
    logger.flush().await.unwrap();

    let files = logger.get_log_files().await.unwrap();
    assert_eq!(files.len(), 2);
    let active = dir.path().join("slow-queries-2026-10-18.ndjson");
    assert!(std::fs::metadata(&active).unwrap().len() < 1024);
    assert_eq!(logger.read_logs(None).await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_retention_cap_holds_after_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(NOON));
    let logger = SlowQueryLogger::new(
        SlowLogConfig {
            max_log_size_bytes: 100,
            max_log_files: 3,
            ..config(dir.path())
        },
        clock.clone(),
    );

    for i in 0..8 {
        logger.log(entry(i));
        logger.flush().await.unwrap();
        clock.advance(Duration::from_millis(5));
        assert!(logger.get_log_files().await.unwrap().len() <= 3);
    }
    assert!(dir.path().join("slow-queries-2026-10-18.ndjson").exists());
}

#[tokio::test]
async fn test_daily_files_follow_the_clock() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(NOON));
    let logger = SlowQueryLogger::new(config(dir.path()), clock.clone());

    logger.log(entry(0));
    logger.flush().await.unwrap();

    clock.advance(Duration::from_secs(24 * 60 * 60));
    let mut next_day = entry(1);
    next_day.metric.record.timestamp = clock.now_millis();
    logger.log(next_day.clone());
    logger.flush().await.unwrap();

    assert_eq!(
        logger.get_log_files().await.unwrap(),
        vec![
            "slow-queries-2026-10-18.ndjson".to_string(),
            "slow-queries-2026-10-19.ndjson".to_string()
        ]
    );
    assert_eq!(logger.read_logs(None).await.unwrap(), vec![next_day]);

    let summary = logger.get_log_summary(None).await.unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.files, vec!["slow-queries-2026-10-19.ndjson".to_string()]);
}

#[tokio::test]
async fn test_malformed_lines_do_not_abort_reads() {
    let dir = tempfile::tempdir().unwrap();
    let logger = SlowQueryLogger::new(config(dir.path()), Arc::new(ManualClock::new(NOON)));

    logger.log(entry(0));
    logger.flush().await.unwrap();

    let path = dir.path().join("slow-queries-2026-10-18.ndjson");
    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("{\"model\": truncated\n");
    std::fs::write(&path, content).unwrap();

    logger.log(entry(1));
    logger.flush().await.unwrap();

    assert_eq!(logger.read_logs(None).await.unwrap(), vec![entry(0), entry(1)]);
}

#[tokio::test]
async fn test_entries_drained_after_midnight_stay_on_their_day() {
    let dir = tempfile::tempdir().unwrap();
    // 2026-10-18T23:59:59.990Z
    let late = NOON + 12 * 60 * 60 * 1000 - 10;
    let clock = Arc::new(ManualClock::new(late));
    let logger = SlowQueryLogger::new(config(dir.path()), clock.clone());

    let mut last = entry(0);
    last.metric.record.timestamp = late;
    logger.log(last.clone());
    clock.advance(Duration::from_millis(20));
    logger.flush().await.unwrap();

    assert_eq!(
        logger.get_log_files().await.unwrap(),
        vec!["slow-queries-2026-10-19.ndjson".to_string()]
    );

    let oct_18 = chrono::NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    let oct_19 = oct_18.succ_opt().unwrap();
    assert_eq!(logger.read_logs(Some(oct_18)).await.unwrap(), vec![last]);
    assert!(logger.read_logs(Some(oct_19)).await.unwrap().is_empty());
    assert_eq!(logger.get_log_summary(Some(oct_18)).await.unwrap().total, 1);
    assert_eq!(logger.get_log_summary(Some(oct_19)).await.unwrap().total, 0);
}
