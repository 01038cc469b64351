//! Queued NDJSON writer
//!
//! `log` only enqueues. Draining happens on a background tick, when the queue
//! reaches the batch size, or on `flush`. A single async mutex guards the
//! file so drain cycles never overlap.

use super::console;
use super::reader::{LogReader, LogSummary};
use super::rotation::{self, active_file_name};
use crate::clock::Clock;
use crate::config::SlowLogConfig;
use crate::error::{MonitorError, Result};
use crate::monitor::{SlowQueryLogEntry, SlowQuerySink};
use crate::ticker::PeriodicTask;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::io::AsyncWriteExt;

/// Durable slow-query log; cheap to clone
#[derive(Clone)]
pub struct SlowQueryLogger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    config: SlowLogConfig,
    queue: Mutex<VecDeque<SlowQueryLogEntry>>,
    writer: tokio::sync::Mutex<()>,
    clock: Arc<dyn Clock>,
    reader: LogReader,
    flush_task: Mutex<Option<PeriodicTask>>,
}

impl SlowQueryLogger {
    pub fn new(config: SlowLogConfig, clock: Arc<dyn Clock>) -> Self {
        let reader = LogReader::new(config.log_directory.clone(), config.rotate_daily, clock.clone());
        Self {
            inner: Arc::new(LoggerInner {
                config,
                queue: Mutex::new(VecDeque::new()),
                writer: tokio::sync::Mutex::new(()),
                clock,
                reader,
                flush_task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SlowLogConfig {
        &self.inner.config
    }

    pub fn reader(&self) -> &LogReader {
        &self.inner.reader
    }

    pub fn queue_len(&self) -> usize {
        lock(&self.inner.queue).len()
    }

    /// Mirror to the console and enqueue for the file
    ///
    /// Never blocks on I/O. Past `max_queue_size` the oldest queued entry is
    /// dropped.
    pub fn log(&self, entry: SlowQueryLogEntry) {
        let config = &self.inner.config;

        if config.enable_console_logging {
            console::mirror(&entry, config.console_log_level, config.console_show_args);
        }

        if !config.enable_file_logging {
            return;
        }

        let queued = {
            let mut queue = lock(&self.inner.queue);
            if queue.len() >= config.max_queue_size {
                queue.pop_front();
                tracing::warn!(
                    max_queue_size = config.max_queue_size,
                    "Slow-query log queue full, dropping oldest entry"
                );
            }
            queue.push_back(entry);
            queue.len()
        };

        if queued >= config.flush_batch_size {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let logger = self.clone();
                handle.spawn(async move {
                    let _ = logger.process_queue().await;
                });
            }
        }
    }

    /// Drain the queue unless a drain is already running
    ///
    /// Returns the number of entries written.
    pub async fn process_queue(&self) -> Result<usize> {
        let Ok(_guard) = self.inner.writer.try_lock() else {
            return Ok(0);
        };
        self.drain().await
    }

    /// Write everything queued so far, waiting for an in-flight drain first
    pub async fn flush(&self) -> Result<usize> {
        let _guard = self.inner.writer.lock().await;
        let mut written = 0;
        loop {
            let n = self.drain().await?;
            if n == 0 {
                return Ok(written);
            }
            written += n;
        }
    }

    /// Start the periodic background drain; no-op if already running
    pub fn spawn_flush_task(&self) {
        let mut slot = lock(&self.inner.flush_task);
        if slot.is_some() {
            return;
        }

        let period = self.inner.config.flush_interval();
        let weak: Weak<LoggerInner> = Arc::downgrade(&self.inner);
        let task = PeriodicTask::spawn(
            "slow-log-flush",
            move || period,
            move || {
                let weak = weak.clone();
                async move {
                    let Some(inner) = weak.upgrade() else {
                        return false;
                    };
                    let _ = SlowQueryLogger { inner }.process_queue().await;
                    true
                }
            },
        );
        *slot = Some(task);
    }

    /// Stop the background drain, then flush what is left
    pub async fn stop(&self) -> Result<usize> {
        let task = lock(&self.inner.flush_task).take();
        if let Some(task) = task {
            task.stop().await;
        }
        self.flush().await
    }

    pub async fn read_logs(&self, date: Option<NaiveDate>) -> Result<Vec<SlowQueryLogEntry>> {
        self.inner.reader.read_logs(date).await
    }

    pub async fn get_logs_in_range(&self, start: u64, end: u64) -> Result<Vec<SlowQueryLogEntry>> {
        self.inner.reader.get_logs_in_range(start, end).await
    }

    pub async fn get_log_files(&self) -> Result<Vec<String>> {
        self.inner.reader.get_log_files().await
    }

    pub async fn get_log_summary(&self, date: Option<NaiveDate>) -> Result<LogSummary> {
        self.inner.reader.get_log_summary(date).await
    }

    /// One drain cycle; caller holds the writer guard
    async fn drain(&self) -> Result<usize> {
        let batch: Vec<SlowQueryLogEntry> = lock(&self.inner.queue).drain(..).collect();
        if batch.is_empty() {
            return Ok(0);
        }

        let (active, created) = match self.append(&batch).await {
            Ok(written) => written,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    entries = batch.len(),
                    "Failed to write slow-query log, requeueing batch"
                );
                crate::metrics::record_log_write_failure(e.kind());
                self.requeue(batch);
                return Err(e);
            }
        };

        tracing::debug!(entries = batch.len(), file = %active.display(), "Slow-query log flushed");

        // The batch is on disk; housekeeping failures are only reported
        let config = &self.inner.config;
        let rotated = match rotation::rotate_if_needed(&active, config.max_log_size_bytes, self.inner.clock.now_millis()).await {
            Ok(archive) => archive.is_some(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to rotate slow-query log");
                false
            }
        };

        if rotated || created {
            if let Err(e) = rotation::enforce_retention(&config.log_directory, config.max_log_files, &active).await {
                tracing::error!(error = %e, "Failed to enforce slow-query log retention");
            }
        }

        Ok(batch.len())
    }

    /// Append a batch to the active file; reports whether the file was new
    async fn append(&self, batch: &[SlowQueryLogEntry]) -> Result<(PathBuf, bool)> {
        let config = &self.inner.config;
        let dir = &config.log_directory;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| MonitorError::io(dir, e))?;

        let path = dir.join(active_file_name(config.rotate_daily, self.inner.clock.now_millis()));
        let created = !tokio::fs::try_exists(&path).await.unwrap_or(false);

        let mut buf = String::new();
        for entry in batch {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| MonitorError::io(&path, e))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| MonitorError::io(&path, e))?;
        file.flush().await.map_err(|e| MonitorError::io(&path, e))?;

        Ok((path, created))
    }

    /// Put a failed batch back in front of newer entries, keeping the bound
    fn requeue(&self, batch: Vec<SlowQueryLogEntry>) {
        let max = self.inner.config.max_queue_size;
        let mut queue = lock(&self.inner.queue);
        for entry in batch.into_iter().rev() {
            queue.push_front(entry);
        }
        let overflow = queue.len().saturating_sub(max);
        if overflow > 0 {
            queue.drain(..overflow);
            tracing::warn!(dropped = overflow, "Slow-query log queue over capacity after requeue");
        }
    }
}

impl SlowQuerySink for SlowQueryLogger {
    fn accept(&self, entry: SlowQueryLogEntry) {
        self.log(entry);
    }
}

impl std::fmt::Debug for SlowQueryLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlowQueryLogger")
            .field("log_directory", &self.inner.config.log_directory)
            .field("queued", &self.queue_len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
