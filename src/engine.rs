//! Composition root
//!
//! Builds every component from one [`Config`] and wires them together. One
//! engine per process is assumed: the log directory has a single writer.

use crate::analytics::QueryAnalytics;
use crate::analyzer::PerformanceAnalyzer;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::instrument::QueryInterceptor;
use crate::monitor::QueryMonitor;
use crate::slow_log::SlowQueryLogger;
use std::sync::Arc;

pub struct PerformanceEngine {
    config: Config,
    monitor: Arc<QueryMonitor>,
    logger: SlowQueryLogger,
    analyzer: Arc<PerformanceAnalyzer>,
    analytics: QueryAnalytics,
    interceptor: QueryInterceptor,
}

impl PerformanceEngine {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let logger = SlowQueryLogger::new(config.slow_log.clone(), clock.clone());

        let monitor = Arc::new(
            QueryMonitor::new(&config.monitor, config.environment.clone(), clock)?
                .with_sink(Arc::new(logger.clone())),
        );
        let analyzer = Arc::new(PerformanceAnalyzer::new(monitor.clone(), config.analyzer.clone())?);
        let analytics = QueryAnalytics::new(monitor.clone(), Some(logger.clone()));
        let interceptor = QueryInterceptor::new(monitor.clone());

        tracing::info!(
            environment = %config.environment,
            log_directory = %config.slow_log.log_directory.display(),
            file_logging = config.slow_log.enable_file_logging,
            auto_detect = config.analyzer.auto_detect,
            "Performance engine initialized"
        );

        Ok(Self {
            config,
            monitor,
            logger,
            analyzer,
            analytics,
            interceptor,
        })
    }

    /// Start background work; needs a Tokio runtime
    pub fn start(&self) {
        if self.config.slow_log.enable_file_logging {
            self.logger.spawn_flush_task();
        }
        self.analyzer.start_auto_analysis();
    }

    /// Stop background work and flush the slow-query log
    pub async fn shutdown(&self) -> Result<()> {
        self.analyzer.stop_auto_analysis().await;
        let flushed = self.logger.stop().await?;
        tracing::info!(flushed = flushed, "Performance engine shut down");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn monitor(&self) -> &Arc<QueryMonitor> {
        &self.monitor
    }

    pub fn logger(&self) -> &SlowQueryLogger {
        &self.logger
    }

    pub fn analyzer(&self) -> &Arc<PerformanceAnalyzer> {
        &self.analyzer
    }

    pub fn analytics(&self) -> &QueryAnalytics {
        &self.analytics
    }

    pub fn interceptor(&self) -> &QueryInterceptor {
        &self.interceptor
    }
}
