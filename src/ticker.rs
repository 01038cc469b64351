//! Cancellable periodic background task
//!
//! Replaces fire-and-forget interval loops: every task has an explicit stop
//! handle so shutdown can wait for an in-flight tick to finish.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a background loop spawned with [`PeriodicTask::spawn`]
pub struct PeriodicTask {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn a loop that sleeps `period()` then runs `tick`, until stopped
    ///
    /// `period` is re-evaluated before every sleep so a changed interval
    /// applies from the next cycle. The first tick happens after one period.
    pub fn spawn<P, F, Fut>(name: &'static str, period: P, mut tick: F) -> Self
    where
        P: Fn() -> Duration + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            tracing::debug!(task = name, "Periodic task started");
            loop {
                let wait = period();
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        if !tick().await {
                            break;
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(task = name, "Periodic task stopped");
        });

        Self {
            name,
            stop_tx,
            handle,
        }
    }

    /// Signal the loop to stop and wait for it to exit
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(task = self.name, error = %e, "Periodic task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
