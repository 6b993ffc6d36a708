//! Collaborator traits
//!
//! The Driver owns lifecycle and progress bookkeeping only. Talking to the
//! cluster, writing mutation files and tracking checkpoints happen behind
//! these traits.

use crate::common::{CheckpointSettings, ClusterConfig, ReadySignal, Result, StreamSettings};
use crate::driver::CompletionHandle;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

/// Pool of file descriptors shared between the Drivers of a session.
pub type FdPool = Arc<Semaphore>;

/// Resolved cluster credentials.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Resolves credentials for a cluster reference.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn resolve(&self, cluster: &ClusterConfig) -> Result<Credentials>;
}

/// Takes the username and password straight from the cluster config.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCredentials;

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn resolve(&self, cluster: &ClusterConfig) -> Result<Credentials> {
        Ok(Credentials {
            username: cluster.username.clone(),
            password: cluster.password.clone(),
        })
    }
}

/// Output layout handed to the persistence sink.
#[derive(Debug, Clone)]
pub struct SinkLayout {
    pub dir: PathBuf,
    pub partition_count: u16,
    /// Files per partition
    pub bins: usize,
    pub buffer_capacity: usize,
    /// Remap partitions onto the traditional layout
    pub requires_partition_remapping: bool,
    pub fd_pool: Option<FdPool>,
}

/// Durable storage for received mutations.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn initialize(&self, layout: &SinkLayout) -> Result<()>;

    /// Flush and close all files. Called once no connection can still write.
    async fn close(&self);
}

/// Everything the checkpoint coordinator needs at start.
#[derive(Debug, Clone)]
pub struct CheckpointContext {
    pub driver: String,
    pub settings: CheckpointSettings,
    pub partition_count: u16,
    pub complete_by_seqno: bool,
    /// Fire once the starting seqno of every partition is known
    pub seqnos_ready: ReadySignal,
}

/// Resolves starting seqnos, persists end checkpoints and counts filtered
/// records per partition. Retries and timeouts for its network calls are its
/// own business.
#[async_trait]
pub trait CheckpointCoordinator: Send + Sync {
    async fn start(&self, ctx: CheckpointContext) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Records filtered out on `partition` so far.
    fn filtered_count(&self, partition: u16) -> u64;
}

/// Everything a stream connection is built from.
#[derive(Clone)]
pub struct ConnectionContext {
    pub driver: String,
    /// Position of the connection within its Driver
    pub index: usize,
    /// Partitions owned by this connection
    pub partitions: Vec<u16>,
    pub cluster: ClusterConfig,
    pub credentials: Credentials,
    pub stream: Arc<StreamSettings>,
    pub workers: usize,
    pub handler_buffer_size: usize,
    /// Completion callbacks and counters back into the Driver
    pub completion: CompletionHandle,
    /// Wait on this before opening streams
    pub seqnos_ready: ReadySignal,
    /// Spawn every task on this tracker; the Driver waits for it before
    /// closing the sink
    pub tracker: TaskTracker,
    pub sink: Arc<dyn PersistenceSink>,
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("driver", &self.driver)
            .field("index", &self.index)
            .field("partitions", &self.partitions.len())
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

/// One physical streaming connection owning a subset of partitions.
///
/// Must call [`CompletionHandle::handle_partition_completion`] exactly once
/// per owned partition when that partition's stream ends, whatever the
/// cause. Tasks must be spawned on [`ConnectionContext::tracker`] and must
/// not call `Driver::stop`.
#[async_trait]
pub trait StreamConnection: Send + Sync {
    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}

/// Builds the connections of a Driver.
pub trait ConnectionFactory: Send + Sync {
    fn create(&self, ctx: ConnectionContext) -> Arc<dyn StreamConnection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_credentials() {
        let cluster = ClusterConfig {
            address: "http://localhost:8091".into(),
            bucket: "default".into(),
            username: "Administrator".into(),
            password: "secret".into(),
        };
        let creds = StaticCredentials.resolve(&cluster).await.unwrap();
        assert_eq!(creds.username, "Administrator");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "user".into(),
            password: "hunter2".into(),
        };
        let text = format!("{:?}", creds);
        assert!(text.contains("user"));
        assert!(!text.contains("hunter2"));
    }
}
