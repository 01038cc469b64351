//! Log file naming, size-based rotation and retention

use crate::error::{MonitorError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const LOG_FILE_PREFIX: &str = "slow-queries";
pub const LOG_FILE_EXTENSION: &str = "ndjson";

/// A log file found in the log directory
#[derive(Debug, Clone)]
pub struct LogFileInfo {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

/// UTC calendar day for a Unix-millisecond timestamp
pub fn day_of(millis: u64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(millis as i64)
        .unwrap_or_default()
        .date_naive()
}

/// Name of the active file: per-day or fixed
pub fn active_file_name(rotate_daily: bool, now_millis: u64) -> String {
    if rotate_daily {
        format!(
            "{}-{}.{}",
            LOG_FILE_PREFIX,
            day_of(now_millis).format("%Y-%m-%d"),
            LOG_FILE_EXTENSION
        )
    } else {
        format!("{}.{}", LOG_FILE_PREFIX, LOG_FILE_EXTENSION)
    }
}

/// Prefix shared by a day's active file and its archives
pub fn day_prefix(date: NaiveDate) -> String {
    format!("{}-{}", LOG_FILE_PREFIX, date.format("%Y-%m-%d"))
}

pub fn is_log_file_name(name: &str) -> bool {
    name.starts_with(LOG_FILE_PREFIX) && name.ends_with(&format!(".{}", LOG_FILE_EXTENSION))
}

/// `<stem>-<epochMillis>.ndjson` next to `active`, unique in its directory
pub async fn archive_path(active: &Path, now_millis: u64) -> Result<PathBuf> {
    let stem = active
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(LOG_FILE_PREFIX);
    let dir = active.parent().unwrap_or_else(|| Path::new("."));

    let mut stamp = now_millis;
    loop {
        let candidate = dir.join(format!("{}-{}.{}", stem, stamp, LOG_FILE_EXTENSION));
        let taken = tokio::fs::try_exists(&candidate)
            .await
            .map_err(|e| MonitorError::io(&candidate, e))?;
        if !taken {
            return Ok(candidate);
        }
        stamp += 1;
    }
}

/// Archive `active` when it has grown past `max_bytes`
///
/// Returns the archive path when a rotation happened. A fresh, empty active
/// file is created in place of the archived one.
pub async fn rotate_if_needed(active: &Path, max_bytes: u64, now_millis: u64) -> Result<Option<PathBuf>> {
    let size = match tokio::fs::metadata(active).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MonitorError::io(active, e)),
    };

    if size <= max_bytes {
        return Ok(None);
    }

    let archive = archive_path(active, now_millis).await?;
    tokio::fs::rename(active, &archive)
        .await
        .map_err(|e| MonitorError::io(active, e))?;
    tokio::fs::File::create(active)
        .await
        .map_err(|e| MonitorError::io(active, e))?;

    tracing::info!(
        archive = %archive.display(),
        size_bytes = size,
        max_bytes = max_bytes,
        "Rotated slow-query log"
    );

    Ok(Some(archive))
}

/// All log files in `dir`, oldest first (mtime, then name)
///
/// A missing directory yields an empty list.
pub async fn list_log_files(dir: &Path) -> Result<Vec<LogFileInfo>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(MonitorError::io(dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| MonitorError::io(dir, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_log_file_name(&name) {
            continue;
        }
        let meta = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "Skipping unreadable log file");
                continue;
            }
        };
        files.push(LogFileInfo {
            path: entry.path(),
            name,
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }

    files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(files)
}

/// Delete the oldest log files until at most `max_files` remain
///
/// The active file is never deleted. Returns the deleted paths.
pub async fn enforce_retention(dir: &Path, max_files: usize, active: &Path) -> Result<Vec<PathBuf>> {
    let files = list_log_files(dir).await?;
    if files.len() <= max_files {
        return Ok(Vec::new());
    }

    let mut excess = files.len() - max_files;
    let mut deleted = Vec::new();

    for file in files {
        if excess == 0 {
            break;
        }
        if file.path == active {
            continue;
        }
        match tokio::fs::remove_file(&file.path).await {
            Ok(()) => {
                tracing::info!(file = %file.name, "Deleted slow-query log beyond retention cap");
                deleted.push(file.path);
                excess -= 1;
            }
            Err(e) => {
                tracing::error!(file = %file.name, error = %e, "Failed to delete old slow-query log");
            }
        }
    }

    Ok(deleted)
}
