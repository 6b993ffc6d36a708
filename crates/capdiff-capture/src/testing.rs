//! Testing utilities for Drivers
//!
//! In-memory collaborators that record every call, so Driver and session
//! behavior can be exercised without a cluster.
//!
//! # Example
//!
//! ```rust,ignore
//! use capdiff_capture::testing::*;
//!
//! let log = CallLog::new();
//! let factory = Arc::new(MockConnectionFactory::new().with_log(log.clone()));
//! let driver = Driver::builder(config)
//!     .sink(Arc::new(MockSink::new().with_log(log.clone())))
//!     .checkpoints(Arc::new(MockCheckpoints::new(8)))
//!     .connections(factory.clone())
//!     .error_reporter(errors)
//!     .build()?;
//!
//! driver.start().await?;
//! factory.connection(0).complete(0, None, "eof");
//! ```

use crate::common::{
    CaptureError, CheckpointContext, CheckpointCoordinator, ClusterConfig, ConnectionContext,
    ConnectionFactory, CredentialSource, Credentials, PersistenceSink, Result, SinkLayout,
    StreamConnection, StreamError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Call log
// ============================================================================

/// Ordered record of collaborator calls, shared between mocks.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Index of the first entry equal to `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }
}

// ============================================================================
// Mock Connection
// ============================================================================

/// How mock connections behave.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Connection index whose `start` fails
    pub fail_start_at: Option<usize>,
    /// Every `stop` returns an error
    pub fail_stop: bool,
    /// Report every partition as completed right after start
    pub complete_on_start: bool,
    /// Mutations counted per partition before completing
    pub docs_per_partition: u64,
    /// Wait for the seqnos-ready signal before streaming
    pub wait_for_seqnos: bool,
    /// Delay between the stop request and the task exiting
    pub exit_delay: Duration,
    /// Time `start` takes before the streaming task is spawned
    pub start_delay: Duration,
}

/// A stream connection driven from tests.
#[derive(Debug)]
pub struct MockConnection {
    ctx: ConnectionContext,
    behavior: MockBehavior,
    log: CallLog,
    /// Partitions whose completion was not reported yet
    pending: Arc<Mutex<BTreeSet<u16>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    shutdown: CancellationToken,
}

impl MockConnection {
    pub fn new(ctx: ConnectionContext, behavior: MockBehavior, log: CallLog) -> Self {
        let pending = ctx.partitions.iter().copied().collect();
        Self {
            ctx,
            behavior,
            log,
            pending: Arc::new(Mutex::new(pending)),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.ctx
    }

    pub fn partitions(&self) -> &[u16] {
        &self.ctx.partitions
    }

    pub fn start_calls(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// End the stream of `partition`. Returns `false` if it already ended.
    pub fn complete(&self, partition: u16, err: Option<StreamError>, reason: &str) -> bool {
        complete_partition(&self.ctx, &self.pending, partition, err, reason)
    }

    fn label(&self, what: &str) -> String {
        format!("connection[{}].{}", self.ctx.index, what)
    }
}

fn complete_partition(
    ctx: &ConnectionContext,
    pending: &Mutex<BTreeSet<u16>>,
    partition: u16,
    err: Option<StreamError>,
    reason: &str,
) -> bool {
    if !pending.lock().remove(&partition) {
        return false;
    }
    ctx.completion
        .handle_partition_completion(partition, err, reason);
    true
}

#[async_trait]
impl StreamConnection for MockConnection {
    async fn start(&self) -> Result<()> {
        self.log.record(self.label("start"));
        self.starts.fetch_add(1, Ordering::SeqCst);

        if !self.behavior.start_delay.is_zero() {
            tokio::time::sleep(self.behavior.start_delay).await;
        }

        if self.behavior.fail_start_at == Some(self.ctx.index) {
            return Err(CaptureError::connection_start(
                self.ctx.index,
                "mock connection refused",
            ));
        }

        let ctx = self.ctx.clone();
        let behavior = self.behavior.clone();
        let pending = self.pending.clone();
        let shutdown = self.shutdown.clone();
        let log = self.log.clone();
        let exit_label = self.label("exit");

        self.ctx.tracker.spawn(async move {
            if behavior.wait_for_seqnos {
                tokio::select! {
                    _ = ctx.seqnos_ready.wait() => {}
                    _ = shutdown.cancelled() => {}
                }
            }

            if behavior.complete_on_start && !shutdown.is_cancelled() {
                for &partition in &ctx.partitions {
                    for _ in 0..behavior.docs_per_partition {
                        ctx.completion.increment_doc_received();
                    }
                    complete_partition(&ctx, &pending, partition, None, "end of stream");
                }
            }

            shutdown.cancelled().await;

            let remaining: Vec<u16> = pending.lock().iter().copied().collect();
            for partition in remaining {
                complete_partition(
                    &ctx,
                    &pending,
                    partition,
                    Some(StreamError::Closed),
                    "closed by stop",
                );
            }

            if !behavior.exit_delay.is_zero() {
                tokio::time::sleep(behavior.exit_delay).await;
            }
            log.record(exit_label);
        });
        self.log.record(self.label("started"));

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.log.record(self.label("stop"));
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.shutdown.cancel();

        if self.behavior.fail_stop {
            return Err(CaptureError::other("mock stop failure"));
        }
        Ok(())
    }
}

/// Factory recording every connection it builds.
#[derive(Debug, Default)]
pub struct MockConnectionFactory {
    behavior: MockBehavior,
    log: CallLog,
    created: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.created.lock().clone()
    }

    /// # Panics
    ///
    /// Panics if no connection with `index` was created.
    pub fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.created.lock()[index].clone()
    }
}

impl ConnectionFactory for MockConnectionFactory {
    fn create(&self, ctx: ConnectionContext) -> Arc<dyn StreamConnection> {
        let connection = Arc::new(MockConnection::new(
            ctx,
            self.behavior.clone(),
            self.log.clone(),
        ));
        self.created.lock().push(connection.clone());
        connection
    }
}

// ============================================================================
// Mock Sink
// ============================================================================

/// A persistence sink that stores nothing.
#[derive(Debug, Default)]
pub struct MockSink {
    log: CallLog,
    fail_initialize: bool,
    initialize_calls: AtomicUsize,
    close_calls: AtomicUsize,
    layout: Mutex<Option<SinkLayout>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_initialize: true,
            ..Self::default()
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn layout(&self) -> Option<SinkLayout> {
        self.layout.lock().clone()
    }
}

#[async_trait]
impl PersistenceSink for MockSink {
    async fn initialize(&self, layout: &SinkLayout) -> Result<()> {
        self.log.record("sink.initialize");
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize {
            return Err(CaptureError::sink("mock sink cannot open files"));
        }
        *self.layout.lock() = Some(layout.clone());
        Ok(())
    }

    async fn close(&self) {
        self.log.record("sink.close");
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Mock Checkpoints
// ============================================================================

/// A checkpoint coordinator with settable filtered counts.
#[derive(Debug)]
pub struct MockCheckpoints {
    log: CallLog,
    fail_start: bool,
    fail_stop: bool,
    filtered: Vec<AtomicU64>,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    context: Mutex<Option<CheckpointContext>>,
}

impl MockCheckpoints {
    pub fn new(partition_count: u16) -> Self {
        Self {
            log: CallLog::new(),
            fail_start: false,
            fail_stop: false,
            filtered: (0..partition_count).map(|_| AtomicU64::new(0)).collect(),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            context: Mutex::new(None),
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn fail_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn set_filtered(&self, partition: u16, count: u64) {
        self.filtered[partition as usize].store(count, Ordering::SeqCst);
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn context(&self) -> Option<CheckpointContext> {
        self.context.lock().clone()
    }
}

#[async_trait]
impl CheckpointCoordinator for MockCheckpoints {
    async fn start(&self, ctx: CheckpointContext) -> Result<()> {
        self.log.record("checkpoints.start");
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(CaptureError::checkpoint("mock stats unavailable"));
        }
        ctx.seqnos_ready.fire();
        *self.context.lock() = Some(ctx);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.log.record("checkpoints.stop");
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(CaptureError::checkpoint("mock checkpoint write failed"));
        }
        Ok(())
    }

    fn filtered_count(&self, partition: u16) -> u64 {
        self.filtered
            .get(partition as usize)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Credential source that always fails.
#[derive(Debug, Clone)]
pub struct FailingCredentials {
    message: String,
}

impl FailingCredentials {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for FailingCredentials {
    async fn resolve(&self, cluster: &ClusterConfig) -> Result<Credentials> {
        Err(CaptureError::credentials(format!(
            "{} ({})",
            self.message, cluster.address
        )))
    }
}
