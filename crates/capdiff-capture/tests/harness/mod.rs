//! Shared fixtures for the Driver integration tests.

#![allow(dead_code)]

use capdiff_capture::common::{ClusterConfig, ErrorReporter};
use capdiff_capture::testing::{
    CallLog, MockBehavior, MockCheckpoints, MockConnectionFactory, MockSink,
};
use capdiff_capture::{CaptureError, Driver, DriverBuilder, DriverConfig};
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("capdiff_capture=debug".parse().unwrap()),
            )
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn cluster() -> ClusterConfig {
    ClusterConfig {
        address: "http://127.0.0.1:8091".into(),
        bucket: "default".into(),
        username: "Administrator".into(),
        password: "password".into(),
    }
}

pub fn driver_config(
    name: &str,
    partitions: u16,
    connections: usize,
    by_seqno: bool,
) -> DriverConfig {
    DriverConfig::builder(name)
        .cluster(cluster())
        .file_dir(format!("/tmp/capdiff/{}", name))
        .partition_count(partitions)
        .connections(connections)
        .complete_by_seqno(by_seqno)
        .completion_check_interval(Duration::from_millis(20))
        .build()
        .unwrap()
}

/// Mock collaborators of one Driver, sharing a call log.
pub struct Parts {
    pub log: CallLog,
    pub factory: Arc<MockConnectionFactory>,
    pub sink: Arc<MockSink>,
    pub checkpoints: Arc<MockCheckpoints>,
}

impl Parts {
    pub fn new(partitions: u16, behavior: MockBehavior) -> Self {
        let log = CallLog::new();
        Self {
            factory: Arc::new(
                MockConnectionFactory::new()
                    .with_behavior(behavior)
                    .with_log(log.clone()),
            ),
            sink: Arc::new(MockSink::new().with_log(log.clone())),
            checkpoints: Arc::new(MockCheckpoints::new(partitions).with_log(log.clone())),
            log,
        }
    }

    /// Attach the mocks to `builder`.
    pub fn wire(&self, builder: DriverBuilder) -> DriverBuilder {
        builder
            .sink(self.sink.clone())
            .checkpoints(self.checkpoints.clone())
            .connections(self.factory.clone())
    }

    /// Standalone Driver with its own error channel.
    pub fn driver(&self, config: DriverConfig) -> (Arc<Driver>, Receiver<CaptureError>) {
        let (errors, rx) = ErrorReporter::channel(16);
        let driver = self
            .wire(Driver::builder(config))
            .error_reporter(errors)
            .build()
            .unwrap();
        (driver, rx)
    }
}

/// Poll until `cond` holds, panicking after [`WAIT`].
pub async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
