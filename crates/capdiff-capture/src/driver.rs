//! # Capture Driver
//!
//! Owns the fleet of stream connections for one cluster, the per-partition
//! completion table and the Driver lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//!   New ──start()──► Started ──stop()──► Stopped
//!    │                                     ▲
//!    └──────────────stop()─────────────────┘
//! ```
//!
//! `start()` brings up credentials, the persistence sink, the checkpoint
//! coordinator and every connection, in that order, and fails fast on the
//! first error. `stop()` is idempotent: exactly one caller tears down, any
//! other caller returns once teardown has finished.
//!
//! In complete-by-seqno mode a background watcher polls the partition table
//! and stops the Driver once every partition reached a terminal state.
//!
//! ## Usage
//!
//! ```ignore
//! use capdiff_capture::{Driver, DriverConfig, ErrorReporter};
//!
//! let (errors, mut rx) = ErrorReporter::channel(1);
//! let driver = Driver::builder(DriverConfig::builder("source").build()?)
//!     .sink(sink)
//!     .checkpoints(checkpoints)
//!     .connections(factory)
//!     .error_reporter(errors)
//!     .build()?;
//!
//! driver.start().await?;
//! driver.stopped().await;
//! ```

use crate::common::{
    partition_lists, CaptureError, CheckpointContext, CheckpointCoordinator, CompletionPolicy,
    ConnectionContext, ConnectionFactory, CounterSnapshot, CredentialSource, Credentials,
    DriverConfig, DriverCounters, ErrorReporter, FdPool, PartitionState, PartitionStateTable,
    PersistenceSink, ReadySignal, Result, SinkLayout, StaticCredentials, StreamConnection,
    StreamError,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a Driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    New,
    Started,
    Stopped,
}

impl DriverState {
    fn as_u8(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Started => 1,
            Self::Stopped => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::New,
            1 => Self::Started,
            _ => Self::Stopped,
        }
    }
}

/// State reachable from connections without going through the Driver.
#[derive(Debug)]
struct DriverShared {
    name: String,
    complete_by_seqno: bool,
    partitions: PartitionStateTable,
    counters: DriverCounters,
    policy: CompletionPolicy,
    errors: ErrorReporter,
    /// Mirror of the lifecycle state, written only under the lifecycle lock
    state: AtomicU8,
    /// Cancelled once, when teardown begins
    cancel: CancellationToken,
}

impl DriverShared {
    fn state(&self) -> DriverState {
        DriverState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn handle_partition_completion(&self, partition: u16, err: Option<StreamError>, reason: &str) {
        match err {
            Some(err) if !self.policy.is_allowed(&err) => {
                let wrapped = CaptureError::stream(&self.name, partition, err, reason);
                if self.state() == DriverState::Stopped {
                    debug!(driver = %self.name, "ignoring error after stop: {}", wrapped);
                    self.counters.record_error_suppressed();
                    return;
                }
                info!(driver = %self.name, "driver encountered error: {}", wrapped);
                self.counters.record_error_reported();
                self.errors.report(wrapped);
            }
            err => {
                if err.is_some() {
                    self.counters.record_error_suppressed();
                }
                if self.complete_by_seqno
                    && self
                        .partitions
                        .transition(partition, PartitionState::Completed)
                {
                    self.counters.record_partition_completed();
                    debug!(driver = %self.name, partition, reason, "partition completed");
                }
            }
        }
    }
}

/// Callback handle given to stream connections.
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    shared: Arc<DriverShared>,
}

impl CompletionHandle {
    pub fn driver_name(&self) -> &str {
        &self.shared.name
    }

    /// Report that the stream for `partition` ended.
    ///
    /// `err` of `None` or of an allowed kind counts as completion; anything
    /// else goes to the session's error channel unless the Driver has
    /// already stopped.
    ///
    /// # Panics
    ///
    /// Panics if `partition` is not a partition of this Driver.
    pub fn handle_partition_completion(
        &self,
        partition: u16,
        err: Option<StreamError>,
        reason: &str,
    ) {
        self.shared.handle_partition_completion(partition, err, reason);
    }

    /// Move `partition` to `StreamClosed`. Returns `false` if it was already
    /// terminal.
    pub fn mark_stream_closed(&self, partition: u16) -> bool {
        self.shared
            .partitions
            .transition(partition, PartitionState::StreamClosed)
    }

    pub fn partition_state(&self, partition: u16) -> PartitionState {
        self.shared.partitions.get(partition)
    }

    pub fn increment_doc_received(&self) {
        self.shared.counters.record_doc();
    }

    pub fn increment_sys_or_unsubbed_event_received(&self) {
        self.shared.counters.record_sys_or_unsubbed();
    }

    /// Whether teardown has begun.
    pub fn is_stopping(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

/// Fields guarded by the lifecycle lock.
struct Lifecycle {
    state: DriverState,
    connections: Vec<Arc<dyn StreamConnection>>,
    /// Held until teardown finishes; dropping it releases the session barrier
    join_token: Option<TaskTrackerToken>,
}

/// Capture Driver for one cluster.
pub struct Driver {
    config: DriverConfig,
    shared: Arc<DriverShared>,
    lifecycle: Mutex<Lifecycle>,
    start_invoked: AtomicBool,
    credentials: Arc<dyn CredentialSource>,
    sink: Arc<dyn PersistenceSink>,
    checkpoints: Arc<dyn CheckpointCoordinator>,
    connection_factory: Arc<dyn ConnectionFactory>,
    fd_pool: Option<FdPool>,
    /// Join barrier for every connection task
    children: TaskTracker,
    seqnos_ready: ReadySignal,
    /// Cancelled once teardown finished
    stopped: CancellationToken,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("partitions", &self.shared.partitions.len())
            .finish_non_exhaustive()
    }
}

impl Driver {
    pub fn builder(config: DriverConfig) -> DriverBuilder {
        DriverBuilder::new(config)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn state(&self) -> DriverState {
        self.shared.state()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == DriverState::Stopped
    }

    /// Handle for connections and tests to report completions.
    pub fn completion_handle(&self) -> CompletionHandle {
        CompletionHandle {
            shared: self.shared.clone(),
        }
    }

    /// Start the Driver.
    ///
    /// Fails fast on the first bootstrap or connection error. Connections
    /// already started are left running; call [`Driver::stop`] to release
    /// them. A concurrent [`Driver::stop`] waits until `start` returns.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.start_invoked.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::invalid_state(format!(
                "{} start called more than once",
                self.name()
            )));
        }

        // Held through bring-up so teardown never overlaps a collaborator start
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.state == DriverState::Stopped {
            return Err(CaptureError::invalid_state(format!(
                "{} already stopped",
                self.name()
            )));
        }

        let credentials = self
            .credentials
            .resolve(&self.config.cluster)
            .await
            .inspect_err(|e| error!(driver = %self.name(), "error populating credentials: {}", e))?;

        self.sink
            .initialize(&self.sink_layout())
            .await
            .inspect_err(|e| error!(driver = %self.name(), "error initializing sink: {}", e))?;

        self.checkpoints
            .start(self.checkpoint_context())
            .await
            .inspect_err(|e| {
                error!(driver = %self.name(), "error starting checkpoint coordinator: {}", e)
            })?;
        info!(driver = %self.name(), "started checkpoint coordinator");

        let connections = self.initialize_connections(&mut lifecycle, credentials)?;
        self.start_connections(&connections)
            .await
            .inspect_err(|e| error!(driver = %self.name(), "error starting connections: {}", e))?;

        self.set_state(&mut lifecycle, DriverState::Started);
        drop(lifecycle);

        tokio::spawn(watch_for_completion(
            Arc::downgrade(self),
            self.shared.clone(),
            self.config.completion_check_interval(),
        ));

        info!(
            driver = %self.name(),
            connections = connections.len(),
            partitions = self.config.partition_count,
            "driver started"
        );
        Ok(())
    }

    /// Stop the Driver. Idempotent and safe to call concurrently.
    ///
    /// Failures of collaborators while stopping are logged, never returned.
    /// Must not be called from a task spawned on a connection's tracker.
    pub async fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;

        if lifecycle.state == DriverState::Stopped {
            info!(driver = %self.name(), "skipping stop, driver already stopped");
            return Ok(());
        }

        let counters = self.shared.counters.snapshot();
        info!(
            driver = %self.name(),
            mutations = counters.docs_received,
            sys_or_unsubbed = counters.sys_or_unsubbed_received,
            "driver stopping"
        );

        self.shared.cancel.cancel();

        for (index, connection) in lifecycle.connections.iter().enumerate() {
            if let Err(e) = connection.stop().await {
                error!(driver = %self.name(), index, "error stopping connection: {}", e);
            }
        }

        // No connection task may still write when the sink closes
        self.children.close();
        self.children.wait().await;

        self.sink.close().await;

        if let Err(e) = self.checkpoints.stop().await {
            error!(driver = %self.name(), "error stopping checkpoint coordinator: {}", e);
        }

        self.set_state(&mut lifecycle, DriverState::Stopped);
        lifecycle.join_token.take();
        self.stopped.cancel();

        info!(driver = %self.name(), "driver stopped");
        Ok(())
    }

    /// Resolves once the Driver has fully stopped.
    pub async fn stopped(&self) {
        self.stopped.cancelled().await
    }

    /// Records filtered by the checkpoint coordinator across all partitions.
    ///
    /// Best effort: not a consistent snapshot while partitions still run.
    pub fn filtered_count(&self) -> u64 {
        (0..self.config.partition_count)
            .map(|p| self.checkpoints.filtered_count(p))
            .sum()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.shared.counters.snapshot()
    }

    pub fn increment_doc_received(&self) {
        self.shared.counters.record_doc();
    }

    pub fn increment_sys_or_unsubbed_event_received(&self) {
        self.shared.counters.record_sys_or_unsubbed();
    }

    /// See [`CompletionHandle::handle_partition_completion`].
    pub fn handle_partition_completion(
        &self,
        partition: u16,
        err: Option<StreamError>,
        reason: &str,
    ) {
        self.shared.handle_partition_completion(partition, err, reason);
    }

    pub fn mark_stream_closed(&self, partition: u16) -> bool {
        self.completion_handle().mark_stream_closed(partition)
    }

    pub fn partition_state(&self, partition: u16) -> PartitionState {
        self.shared.partitions.get(partition)
    }

    /// Partitions in a terminal state.
    pub fn completed_partitions(&self) -> usize {
        self.shared.partitions.terminal_count()
    }

    pub fn partition_states(&self) -> Vec<PartitionState> {
        self.shared.partitions.snapshot()
    }

    fn set_state(&self, lifecycle: &mut Lifecycle, state: DriverState) {
        lifecycle.state = state;
        self.shared.state.store(state.as_u8(), Ordering::Release);
    }

    fn sink_layout(&self) -> SinkLayout {
        SinkLayout {
            dir: self.config.file_dir.clone(),
            partition_count: self.config.partition_count,
            bins: self.config.bins,
            buffer_capacity: self.config.buffer_capacity,
            requires_partition_remapping: self.config.requires_partition_remapping(),
            fd_pool: self.fd_pool.clone(),
        }
    }

    fn checkpoint_context(&self) -> CheckpointContext {
        CheckpointContext {
            driver: self.name().to_string(),
            settings: self.config.checkpoint.clone(),
            partition_count: self.config.partition_count,
            complete_by_seqno: self.config.complete_by_seqno,
            seqnos_ready: self.seqnos_ready.clone(),
        }
    }

    fn initialize_connections(
        &self,
        lifecycle: &mut Lifecycle,
        credentials: Credentials,
    ) -> Result<Vec<Arc<dyn StreamConnection>>> {
        let lists = partition_lists(self.config.partition_count, self.config.connections)?;
        let stream = Arc::new(self.config.stream.clone());

        let connections: Vec<Arc<dyn StreamConnection>> = lists
            .into_iter()
            .enumerate()
            .map(|(index, partitions)| {
                self.connection_factory.create(ConnectionContext {
                    driver: self.name().to_string(),
                    index,
                    partitions,
                    cluster: self.config.cluster.clone(),
                    credentials: credentials.clone(),
                    stream: stream.clone(),
                    workers: self.config.workers_per_connection,
                    handler_buffer_size: self.config.handler_buffer_size,
                    completion: self.completion_handle(),
                    seqnos_ready: self.seqnos_ready.clone(),
                    tracker: self.children.clone(),
                    sink: self.sink.clone(),
                })
            })
            .collect();

        // Stored before any start so stop reaches connections of a failed start
        lifecycle.connections = connections.clone();
        Ok(connections)
    }

    async fn start_connections(&self, connections: &[Arc<dyn StreamConnection>]) -> Result<()> {
        for (index, connection) in connections.iter().enumerate() {
            connection.start().await?;
            info!(driver = %self.name(), index, "started connection");
        }
        Ok(())
    }
}

/// Poll the partition table until every partition is terminal, then stop
/// the Driver. Exits without stopping once teardown began elsewhere.
async fn watch_for_completion(driver: Weak<Driver>, shared: Arc<DriverShared>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => {
                info!(driver = %shared.name, "completion watcher received close signal");
                return;
            }
            _ = ticker.tick() => {
                if !shared.partitions.all_terminal() {
                    continue;
                }
                info!(driver = %shared.name, "all partitions have completed");
                match driver.upgrade() {
                    Some(driver) => {
                        if let Err(e) = driver.stop().await {
                            warn!(driver = %shared.name, "error stopping driver: {}", e);
                        }
                    }
                    None => debug!(driver = %shared.name, "driver dropped before completion"),
                }
                return;
            }
        }
    }
}

/// Builder for [`Driver`].
pub struct DriverBuilder {
    config: DriverConfig,
    credentials: Arc<dyn CredentialSource>,
    sink: Option<Arc<dyn PersistenceSink>>,
    checkpoints: Option<Arc<dyn CheckpointCoordinator>>,
    connections: Option<Arc<dyn ConnectionFactory>>,
    errors: Option<ErrorReporter>,
    join_token: Option<TaskTrackerToken>,
    policy: Option<CompletionPolicy>,
    fd_pool: Option<FdPool>,
}

impl DriverBuilder {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            credentials: Arc::new(StaticCredentials),
            sink: None,
            checkpoints: None,
            connections: None,
            errors: None,
            join_token: None,
            policy: None,
            fd_pool: None,
        }
    }

    pub fn credentials(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credentials = source;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn checkpoints(mut self, checkpoints: Arc<dyn CheckpointCoordinator>) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn connections(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.connections = Some(factory);
        self
    }

    pub fn error_reporter(mut self, errors: ErrorReporter) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Token of the session's join barrier, released when the Driver stops.
    pub fn join_token(mut self, token: TaskTrackerToken) -> Self {
        self.join_token = Some(token);
        self
    }

    /// Overrides the policy derived from `allowed_stream_errors`.
    pub fn completion_policy(mut self, policy: CompletionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn fd_pool(mut self, pool: FdPool) -> Self {
        self.fd_pool = Some(pool);
        self
    }

    pub fn build(self) -> Result<Arc<Driver>> {
        self.config.validate()?;
        let name = self.config.name.clone();
        let missing = |what: &str| CaptureError::config(format!("{}: {} is required", name, what));

        let sink = self.sink.ok_or_else(|| missing("persistence sink"))?;
        let checkpoints = self
            .checkpoints
            .ok_or_else(|| missing("checkpoint coordinator"))?;
        let connection_factory = self
            .connections
            .ok_or_else(|| missing("connection factory"))?;
        let errors = self.errors.ok_or_else(|| missing("error reporter"))?;
        let policy = self.policy.unwrap_or_else(|| {
            CompletionPolicy::new(self.config.allowed_stream_errors.iter().copied())
        });

        let shared = Arc::new(DriverShared {
            name,
            complete_by_seqno: self.config.complete_by_seqno,
            partitions: PartitionStateTable::new(self.config.partition_count),
            counters: DriverCounters::new(),
            policy,
            errors,
            state: AtomicU8::new(DriverState::New.as_u8()),
            cancel: CancellationToken::new(),
        });

        Ok(Arc::new(Driver {
            config: self.config,
            shared,
            lifecycle: Mutex::new(Lifecycle {
                state: DriverState::New,
                connections: Vec::new(),
                join_token: self.join_token,
            }),
            start_invoked: AtomicBool::new(false),
            credentials: self.credentials,
            sink,
            checkpoints,
            connection_factory,
            fd_pool: self.fd_pool,
            children: TaskTracker::new(),
            seqnos_ready: ReadySignal::new(),
            stopped: CancellationToken::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::StreamErrorKind;
    use crate::testing::{MockCheckpoints, MockConnectionFactory, MockSink};

    fn build_driver(
        partitions: u16,
        connections: usize,
        by_seqno: bool,
    ) -> (Arc<Driver>, tokio::sync::mpsc::Receiver<CaptureError>) {
        let config = DriverConfig::builder("source")
            .partition_count(partitions)
            .connections(connections)
            .complete_by_seqno(by_seqno)
            .completion_check_interval(Duration::from_millis(20))
            .build()
            .unwrap();
        let (errors, rx) = ErrorReporter::channel(16);
        let driver = Driver::builder(config)
            .sink(Arc::new(MockSink::new()))
            .checkpoints(Arc::new(MockCheckpoints::new(partitions)))
            .connections(Arc::new(MockConnectionFactory::new()))
            .error_reporter(errors)
            .build()
            .unwrap();
        (driver, rx)
    }

    #[test]
    fn test_driver_state_round_trip() {
        for state in [DriverState::New, DriverState::Started, DriverState::Stopped] {
            assert_eq!(DriverState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let config = DriverConfig::builder("source").build().unwrap();
        let err = Driver::builder(config).build().unwrap_err();
        assert!(err.to_string().contains("persistence sink"));
    }

    #[tokio::test]
    async fn test_new_driver_state() {
        let (driver, _rx) = build_driver(4, 2, true);
        assert_eq!(driver.state(), DriverState::New);
        assert_eq!(driver.completed_partitions(), 0);
        assert!(driver
            .partition_states()
            .iter()
            .all(|s| *s == PartitionState::Normal));
    }

    #[tokio::test]
    async fn test_completion_without_seqno_mode_keeps_normal() {
        let (driver, mut rx) = build_driver(2, 1, false);
        driver.handle_partition_completion(0, None, "eof");
        assert_eq!(driver.partition_state(0), PartitionState::Normal);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_completion_in_seqno_mode() {
        let (driver, mut rx) = build_driver(2, 1, true);
        driver.handle_partition_completion(0, None, "eof");
        driver.handle_partition_completion(1, Some(StreamError::Closed), "closed by stop");
        assert_eq!(driver.partition_state(0), PartitionState::Completed);
        assert_eq!(driver.partition_state(1), PartitionState::Completed);
        assert!(rx.try_recv().is_err());
        assert_eq!(driver.counters().partitions_completed, 2);
        assert_eq!(driver.counters().errors_suppressed, 1);
    }

    #[tokio::test]
    async fn test_unallowed_error_reported() {
        let (driver, mut rx) = build_driver(2, 1, true);
        driver.handle_partition_completion(1, Some(StreamError::Lost("reset".into())), "dcp");
        let err = rx.try_recv().unwrap();
        assert!(matches!(err, CaptureError::Stream { partition: 1, .. }));
        assert_eq!(driver.partition_state(1), PartitionState::Normal);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_custom_policy() {
        let config = DriverConfig::builder("target")
            .partition_count(1)
            .connections(1)
            .complete_by_seqno(true)
            .allowed_stream_errors(vec![StreamErrorKind::Closed, StreamErrorKind::TooSlow])
            .build()
            .unwrap();
        let (errors, mut rx) = ErrorReporter::channel(4);
        let driver = Driver::builder(config)
            .sink(Arc::new(MockSink::new()))
            .checkpoints(Arc::new(MockCheckpoints::new(1)))
            .connections(Arc::new(MockConnectionFactory::new()))
            .error_reporter(errors)
            .build()
            .unwrap();

        driver.handle_partition_completion(0, Some(StreamError::TooSlow), "slow");
        assert_eq!(driver.partition_state(0), PartitionState::Completed);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stream_closed_is_sticky() {
        let (driver, _rx) = build_driver(2, 1, true);
        assert!(driver.mark_stream_closed(0));
        driver.handle_partition_completion(0, None, "eof");
        assert_eq!(driver.partition_state(0), PartitionState::StreamClosed);
        assert!(!driver.mark_stream_closed(0));
        assert_eq!(driver.counters().partitions_completed, 0);
    }

    #[tokio::test]
    async fn test_error_reported_while_stopping() {
        let (driver, mut rx) = build_driver(4, 1, true);
        // Teardown has begun but the Driver is not Stopped yet
        driver.shared.cancel.cancel();
        driver.handle_partition_completion(2, Some(StreamError::Rollback { seqno: 9 }), "dcp");
        assert!(matches!(
            rx.try_recv().unwrap(),
            CaptureError::Stream { partition: 2, .. }
        ));
        assert_eq!(driver.counters().errors_reported, 1);
    }

    #[tokio::test]
    async fn test_error_suppressed_once_stopped() {
        let (driver, mut rx) = build_driver(4, 1, true);
        driver.stop().await.unwrap();
        driver.handle_partition_completion(2, Some(StreamError::TooSlow), "dcp");
        assert!(rx.try_recv().is_err());
        assert_eq!(driver.counters().errors_suppressed, 1);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let (driver, _rx) = build_driver(2, 1, true);
        driver.stop().await.unwrap();
        assert!(driver.is_stopped());
        let err = driver.start().await.unwrap_err();
        assert!(matches!(err, CaptureError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_start_twice() {
        let (driver, _rx) = build_driver(2, 1, false);
        driver.start().await.unwrap();
        assert_eq!(driver.state(), DriverState::Started);
        assert!(driver.start().await.is_err());
        driver.stop().await.unwrap();
    }
}
