//! # Capture Session
//!
//! Runs one Driver against the source cluster and one against the target
//! cluster, and stops both on completion, on a timer, or on the first error
//! either of them reports.
//!
//! ## Usage
//!
//! ```ignore
//! use capdiff_capture::{CaptureSession, SessionConfig};
//!
//! let config = SessionConfig::from_file("capdiff.yaml")?;
//! let session = CaptureSession::from_config(&config);
//!
//! let source = session
//!     .driver_builder(config.source.clone())
//!     .sink(source_sink)
//!     .checkpoints(source_checkpoints)
//!     .connections(source_connections)
//!     .build()?;
//! let target = session.driver_builder(config.target.clone()) /* ... */ .build()?;
//!
//! let report = session.run(source, target, config.mode()).await?;
//! ```

use crate::common::{
    CaptureError, CompletionMode, CounterSnapshot, DriverConfig, ErrorReporter, Result,
    SessionConfig,
};
use crate::driver::{Driver, DriverBuilder};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// End-of-run figures for one Driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverReport {
    pub name: String,
    pub counters: CounterSnapshot,
    pub filtered: u64,
    pub completed_partitions: usize,
}

impl DriverReport {
    fn of(driver: &Driver) -> Self {
        Self {
            name: driver.name().to_string(),
            counters: driver.counters(),
            filtered: driver.filtered_count(),
            completed_partitions: driver.completed_partitions(),
        }
    }
}

/// Result of a session that ended without error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub source: DriverReport,
    pub target: DriverReport,
}

impl SessionReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Source/target capture session.
pub struct CaptureSession {
    reporter: ErrorReporter,
    errors: Receiver<CaptureError>,
    /// Every Driver holds a token until it stopped
    barrier: TaskTracker,
    stop_delay: Duration,
}

impl CaptureSession {
    pub fn new(error_channel_capacity: usize) -> Self {
        let (reporter, errors) = ErrorReporter::channel(error_channel_capacity);
        Self {
            reporter,
            errors,
            barrier: TaskTracker::new(),
            stop_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.error_channel_capacity).with_stop_delay(config.stop_delay())
    }

    /// Pause between stopping source and target in duration mode.
    pub fn with_stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    pub fn error_reporter(&self) -> ErrorReporter {
        self.reporter.clone()
    }

    /// Driver builder wired to this session's error channel and join barrier.
    pub fn driver_builder(&self, config: DriverConfig) -> DriverBuilder {
        Driver::builder(config)
            .error_reporter(self.reporter.clone())
            .join_token(self.barrier.token())
    }

    /// Start both Drivers in the background and wait until the session ends.
    ///
    /// Returns the first error reported by either Driver, after stopping
    /// both.
    pub async fn run(
        mut self,
        source: Arc<Driver>,
        target: Arc<Driver>,
        mode: CompletionMode,
    ) -> Result<SessionReport> {
        if mode == CompletionMode::BySeqno {
            for driver in [&source, &target] {
                if !driver.config().complete_by_seqno {
                    return Err(CaptureError::config(format!(
                        "{} is not configured to complete by seqno",
                        driver.name()
                    )));
                }
            }
        }

        self.barrier.close();
        self.start_async(&source);
        self.start_async(&target);

        match mode {
            CompletionMode::BySeqno => self.wait_for_completion(&source, &target).await?,
            CompletionMode::ByDuration(duration) => {
                self.wait_for_duration(&source, &target, duration).await?
            }
        }

        let report = SessionReport {
            source: DriverReport::of(&source),
            target: DriverReport::of(&target),
        };
        info!(
            source_mutations = report.source.counters.docs_received,
            target_mutations = report.target.counters.docs_received,
            "capture session finished"
        );
        Ok(report)
    }

    fn start_async(&self, driver: &Arc<Driver>) {
        let driver = driver.clone();
        let reporter = self.reporter.clone();
        tokio::spawn(async move {
            if let Err(e) = driver.start().await {
                error!(driver = %driver.name(), "driver failed to start: {}", e);
                reporter.report(e);
            }
        });
    }

    async fn wait_for_completion(&mut self, source: &Driver, target: &Driver) -> Result<()> {
        tokio::select! {
            Some(err) = self.errors.recv() => {
                warn!("stopping capture due to error: {}", err);
                stop_logged(source).await;
                stop_logged(target).await;
                Err(err)
            }
            _ = self.barrier.wait() => {
                info!("source and target drivers have completed");
                Ok(())
            }
        }
    }

    async fn wait_for_duration(
        &mut self,
        source: &Driver,
        target: &Driver,
        duration: Duration,
    ) -> Result<()> {
        let outcome = tokio::select! {
            Some(err) = self.errors.recv() => {
                warn!("stopping capture due to error: {}", err);
                Err(err)
            }
            _ = tokio::time::sleep(duration) => {
                info!(?duration, "stopping capture after configured duration");
                Ok(())
            }
        };

        stop_logged(source).await;
        if !self.stop_delay.is_zero() {
            tokio::time::sleep(self.stop_delay).await;
        }
        stop_logged(target).await;

        outcome
    }
}

async fn stop_logged(driver: &Driver) {
    if let Err(e) = driver.stop().await {
        error!(driver = %driver.name(), "error stopping driver: {}", e);
    }
}
