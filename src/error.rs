use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the monitoring engine
///
/// None of these ever reach the caller of an instrumented database call;
/// they surface only from configuration, log persistence and log replay.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Filesystem error on a log file or directory
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entry could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Threshold layers are inconsistent
    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),
}

impl MonitorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable name, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Serialization(_) => "serialization",
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidThresholds(_) => "invalid_thresholds",
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
