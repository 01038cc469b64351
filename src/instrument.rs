//! Instrumentation adapter
//!
//! Wraps each outgoing database call: times it, hands a sanitized
//! [`ExecutionRecord`] to the monitor, and returns the call's own result
//! untouched. Recording is best-effort and can never fail the call.

use crate::monitor::signature::redact_args;
use crate::monitor::{ExecutionRecord, QueryMonitor};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// An intercepted call as seen by the database client hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCall {
    pub model: String,
    pub action: String,
    #[serde(default)]
    pub args: serde_json::Value,
    /// Served from a cache layer in front of the database
    #[serde(default)]
    pub cached: bool,
}

impl QueryCall {
    pub fn new(model: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            action: action.into(),
            args: serde_json::Value::Null,
            cached: false,
        }
    }

    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }
}

#[derive(Clone)]
pub struct QueryInterceptor {
    monitor: Arc<QueryMonitor>,
}

impl QueryInterceptor {
    pub fn new(monitor: Arc<QueryMonitor>) -> Self {
        Self { monitor }
    }

    pub fn monitor(&self) -> &Arc<QueryMonitor> {
        &self.monitor
    }

    /// Run `next`, record it, and return its result
    ///
    /// An error from `next` is recorded on the execution record and then
    /// returned to the caller as-is.
    pub async fn intercept<T, E, F, Fut>(&self, call: QueryCall, next: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let clock = self.monitor.clock().clone();
        let started = clock.monotonic();

        let result = next().await;

        let elapsed = clock.monotonic().saturating_sub(started);
        let error = result.as_ref().err().map(|e| e.to_string());
        self.record(&call, elapsed.as_millis() as u64, error);

        result
    }

    /// Record a call timed elsewhere
    pub fn record(&self, call: &QueryCall, duration_ms: u64, error: Option<String>) {
        let recorded = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let mut record = ExecutionRecord::new(
                call.model.clone(),
                call.action.clone(),
                duration_ms,
                self.monitor.clock().now_millis(),
            )
            .with_args(redact_args(&call.args))
            .with_cached(call.cached);
            if let Some(error) = error {
                record = record.with_error(error);
            }
            self.monitor.track(record);
        }));

        if recorded.is_err() {
            tracing::error!(
                model = %call.model,
                action = %call.action,
                "Failed to record query execution"
            );
        }
    }
}
