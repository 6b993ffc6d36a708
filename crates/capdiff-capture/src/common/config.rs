//! Configuration types for capture Drivers and sessions
//!
//! A session captures one source and one target cluster:
//!
//! ```yaml
//! complete_by_seqno: true
//! source:
//!   name: source
//!   cluster:
//!     address: http://10.0.0.1:8091
//!     bucket: default
//!     username: Administrator
//!     password: ${SOURCE_PASSWORD}
//!   file_dir: /data/source
//!   checkpoint:
//!     dir: /data/checkpoint
//! target:
//!   name: target
//!   # ...
//! ```

use crate::common::{CaptureError, Result, StreamErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Partition count of a traditionally configured bucket.
pub const TRADITIONAL_PARTITION_COUNT: u16 = 1024;

/// Pre-compiled regex for environment variable expansion
/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// Cluster address and credential reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Management address, e.g. `http://127.0.0.1:8091`
    pub address: String,
    /// Bucket to stream
    pub bucket: String,
    #[serde(default)]
    pub username: String,
    /// Password or `${ENV}` reference, resolved at start
    #[serde(default, skip_serializing)]
    pub password: String,
}

/// Settings passed through to the checkpoint coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CheckpointSettings {
    /// Directory holding checkpoint files
    #[serde(default = "default_checkpoint_dir")]
    pub dir: PathBuf,
    /// Checkpoint file to resume from; start from zero when absent
    #[serde(default)]
    pub old_file: Option<String>,
    /// Checkpoint file written on shutdown; nothing is saved when absent
    #[serde(default)]
    pub new_file: Option<String>,
    /// Timeout for bucket operations used to gather stats
    #[serde(default = "default_bucket_op_timeout_secs")]
    pub bucket_op_timeout_secs: u64,
    /// Max retries when fetching partition stats
    #[serde(default = "default_max_stats_retries")]
    pub max_stats_retries: u32,
    /// Initial retry interval for stats
    #[serde(default = "default_stats_retry_interval_secs")]
    pub stats_retry_interval_secs: u64,
    /// Backoff cap for stats retries
    #[serde(default = "default_stats_max_backoff_secs")]
    pub stats_max_backoff_secs: u64,
    /// Interval between periodic checkpoints (0 disables)
    #[serde(default)]
    pub interval_secs: u64,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            dir: default_checkpoint_dir(),
            old_file: None,
            new_file: None,
            bucket_op_timeout_secs: default_bucket_op_timeout_secs(),
            max_stats_retries: default_max_stats_retries(),
            stats_retry_interval_secs: default_stats_retry_interval_secs(),
            stats_max_backoff_secs: default_stats_max_backoff_secs(),
            interval_secs: 0,
        }
    }
}

impl CheckpointSettings {
    pub fn bucket_op_timeout(&self) -> Duration {
        Duration::from_secs(self.bucket_op_timeout_secs)
    }

    pub fn stats_retry_interval(&self) -> Duration {
        Duration::from_secs(self.stats_retry_interval_secs)
    }

    pub fn stats_max_backoff(&self) -> Duration {
        Duration::from_secs(self.stats_max_backoff_secs)
    }

    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }

    pub fn old_checkpoint_path(&self) -> Option<PathBuf> {
        self.old_file.as_ref().map(|f| self.dir.join(f))
    }

    pub fn new_checkpoint_path(&self) -> Option<PathBuf> {
        self.new_file.as_ref().map(|f| self.dir.join(f))
    }
}

/// Server capabilities negotiated for the streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Capabilities {
    /// Collection-aware streaming
    #[serde(default)]
    pub collections: bool,
    /// Advanced (expression) filtering
    #[serde(default)]
    pub advanced_filtering: bool,
}

/// Mobile (sync gateway) compatibility handling of system xattrs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MobileCompatibility {
    #[default]
    Off,
    Active,
}

/// Which expirations and deletions are filtered out of the capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExpDelMode {
    #[serde(default)]
    pub skip_deletes: bool,
    #[serde(default)]
    pub skip_expirations: bool,
    #[serde(default)]
    pub strip_expiry: bool,
}

/// Stream settings shared by every connection of a Driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StreamSettings {
    /// Content filter applied to each mutation
    #[serde(default)]
    pub filter_expression: Option<String>,
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Collection ids to stream; empty means all
    #[serde(default)]
    pub collection_ids: Vec<u32>,
    /// Filters of an implicit-to-explicit collection migration
    #[serde(default)]
    pub collection_migration_filters: Vec<String>,
    /// Source namespace -> target namespace
    #[serde(default)]
    pub migration_mapping: HashMap<String, String>,
    #[serde(default)]
    pub mobile_compatible: MobileCompatibility,
    #[serde(default)]
    pub exp_del_mode: ExpDelMode,
    /// Xattr keys ignored when mutations are later compared
    #[serde(default)]
    pub xattr_keys_excluded: BTreeSet<String>,
}

/// Configuration for one Driver (one cluster).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DriverConfig {
    /// Identifying name, e.g. `source` or `target`
    pub name: String,
    pub cluster: ClusterConfig,
    /// Directory receiving the captured mutation files
    #[serde(default = "default_file_dir")]
    pub file_dir: PathBuf,
    #[serde(default)]
    pub checkpoint: CheckpointSettings,
    /// Number of stream connections
    #[serde(default = "default_connections")]
    pub connections: usize,
    /// Worker tasks per connection
    #[serde(default = "default_workers_per_connection")]
    pub workers_per_connection: usize,
    /// Output files per partition
    #[serde(default = "default_bins")]
    pub bins: usize,
    /// Buffer size of each connection's handler channel
    #[serde(default = "default_handler_buffer_size")]
    pub handler_buffer_size: usize,
    /// Write buffer capacity per output file
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Stop by itself once every partition reached its end seqno
    #[serde(default)]
    pub complete_by_seqno: bool,
    /// Poll interval of the completion watcher
    #[serde(default = "default_completion_check_interval_ms")]
    pub completion_check_interval_ms: u64,
    #[serde(default = "default_partition_count")]
    pub partition_count: u16,
    /// Bucket may use a non-traditional partition count
    #[serde(default)]
    pub variable_partitions: bool,
    #[serde(default)]
    pub stream: StreamSettings,
    /// Stream error kinds treated as a normal end of stream
    #[serde(default = "default_allowed_stream_errors")]
    pub allowed_stream_errors: Vec<StreamErrorKind>,
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoint")
}

fn default_bucket_op_timeout_secs() -> u64 {
    20
}

fn default_max_stats_retries() -> u32 {
    10
}

fn default_stats_retry_interval_secs() -> u64 {
    2
}

fn default_stats_max_backoff_secs() -> u64 {
    10
}

fn default_file_dir() -> PathBuf {
    PathBuf::from("mutations")
}

fn default_connections() -> usize {
    2
}

fn default_workers_per_connection() -> usize {
    20
}

fn default_bins() -> usize {
    10
}

fn default_handler_buffer_size() -> usize {
    100_000
}

fn default_buffer_capacity() -> usize {
    64 * 1024
}

fn default_completion_check_interval_ms() -> u64 {
    3000
}

fn default_partition_count() -> u16 {
    TRADITIONAL_PARTITION_COUNT
}

fn default_allowed_stream_errors() -> Vec<StreamErrorKind> {
    vec![StreamErrorKind::Closed]
}

impl DriverConfig {
    pub fn builder(name: impl Into<String>) -> DriverConfigBuilder {
        DriverConfigBuilder::new(name)
    }

    pub fn completion_check_interval(&self) -> Duration {
        Duration::from_millis(self.completion_check_interval_ms)
    }

    /// The persistence layer remaps partitions onto the traditional layout
    /// when the bucket uses a different partition count.
    pub fn requires_partition_remapping(&self) -> bool {
        self.variable_partitions && self.partition_count != TRADITIONAL_PARTITION_COUNT
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CaptureError::config("driver name must not be empty"));
        }
        if self.partition_count == 0 {
            return Err(CaptureError::config(format!(
                "{}: partition_count must be at least 1",
                self.name
            )));
        }
        if self.connections == 0 {
            return Err(CaptureError::config(format!(
                "{}: connections must be at least 1",
                self.name
            )));
        }
        if self.connections > self.partition_count as usize {
            return Err(CaptureError::config(format!(
                "{}: {} connections exceed {} partitions",
                self.name, self.connections, self.partition_count
            )));
        }
        if self.workers_per_connection == 0 {
            return Err(CaptureError::config(format!(
                "{}: workers_per_connection must be at least 1",
                self.name
            )));
        }
        if self.bins == 0 {
            return Err(CaptureError::config(format!(
                "{}: bins must be at least 1",
                self.name
            )));
        }
        if self.completion_check_interval_ms == 0 {
            return Err(CaptureError::config(format!(
                "{}: completion_check_interval_ms must be positive",
                self.name
            )));
        }
        Ok(())
    }
}

/// Builder for DriverConfig.
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: DriverConfig {
                name: name.into(),
                cluster: ClusterConfig::default(),
                file_dir: default_file_dir(),
                checkpoint: CheckpointSettings::default(),
                connections: default_connections(),
                workers_per_connection: default_workers_per_connection(),
                bins: default_bins(),
                handler_buffer_size: default_handler_buffer_size(),
                buffer_capacity: default_buffer_capacity(),
                complete_by_seqno: false,
                completion_check_interval_ms: default_completion_check_interval_ms(),
                partition_count: default_partition_count(),
                variable_partitions: false,
                stream: StreamSettings::default(),
                allowed_stream_errors: default_allowed_stream_errors(),
            },
        }
    }

    pub fn cluster(mut self, cluster: ClusterConfig) -> Self {
        self.config.cluster = cluster;
        self
    }

    pub fn file_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.file_dir = dir.into();
        self
    }

    pub fn checkpoint(mut self, checkpoint: CheckpointSettings) -> Self {
        self.config.checkpoint = checkpoint;
        self
    }

    pub fn connections(mut self, n: usize) -> Self {
        self.config.connections = n;
        self
    }

    pub fn workers_per_connection(mut self, n: usize) -> Self {
        self.config.workers_per_connection = n;
        self
    }

    pub fn bins(mut self, n: usize) -> Self {
        self.config.bins = n;
        self
    }

    pub fn handler_buffer_size(mut self, size: usize) -> Self {
        self.config.handler_buffer_size = size;
        self
    }

    pub fn buffer_capacity(mut self, size: usize) -> Self {
        self.config.buffer_capacity = size;
        self
    }

    pub fn complete_by_seqno(mut self, enabled: bool) -> Self {
        self.config.complete_by_seqno = enabled;
        self
    }

    pub fn completion_check_interval(mut self, interval: Duration) -> Self {
        self.config.completion_check_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn partition_count(mut self, count: u16) -> Self {
        self.config.partition_count = count;
        self
    }

    pub fn variable_partitions(mut self, enabled: bool) -> Self {
        self.config.variable_partitions = enabled;
        self
    }

    pub fn stream(mut self, stream: StreamSettings) -> Self {
        self.config.stream = stream;
        self
    }

    pub fn allowed_stream_errors(mut self, kinds: Vec<StreamErrorKind>) -> Self {
        self.config.allowed_stream_errors = kinds;
        self
    }

    pub fn build(self) -> Result<DriverConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// How a session decides it is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Both Drivers stop by themselves once every partition completed
    BySeqno,
    /// Stop both Drivers after a fixed wall-clock duration
    ByDuration(Duration),
}

/// Configuration for a source/target capture session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionConfig {
    pub source: DriverConfig,
    pub target: DriverConfig,
    /// Applied to both Drivers on load
    #[serde(default)]
    pub complete_by_seqno: bool,
    /// Run time when not completing by seqno
    #[serde(default = "default_complete_by_duration_secs")]
    pub complete_by_duration_secs: u64,
    /// Capacity of the shared error channel
    #[serde(default = "default_error_channel_capacity")]
    pub error_channel_capacity: usize,
    /// Pause between stopping source and target in duration mode
    #[serde(default = "default_stop_delay_ms")]
    pub stop_delay_ms: u64,
}

fn default_complete_by_duration_secs() -> u64 {
    240
}

fn default_error_channel_capacity() -> usize {
    1
}

fn default_stop_delay_ms() -> u64 {
    2000
}

impl SessionConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Parse YAML with `${VAR}` / `${VAR:-default}` expansion, then validate.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let mut config: Self = serde_yaml::from_str(&expanded)?;
        config.source.complete_by_seqno = config.complete_by_seqno;
        config.target.complete_by_seqno = config.complete_by_seqno;
        config.validate()?;
        Ok(config)
    }

    fn expand_env_vars(content: &str) -> String {
        ENV_VAR_REGEX
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default = caps.get(2).map(|m| m.as_str());

                std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
            })
            .to_string()
    }

    pub fn mode(&self) -> CompletionMode {
        if self.complete_by_seqno {
            CompletionMode::BySeqno
        } else {
            CompletionMode::ByDuration(Duration::from_secs(self.complete_by_duration_secs))
        }
    }

    pub fn stop_delay(&self) -> Duration {
        Duration::from_millis(self.stop_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.target.validate()?;
        if self.source.name == self.target.name {
            return Err(CaptureError::config(format!(
                "source and target share the name '{}'",
                self.source.name
            )));
        }
        if !self.complete_by_seqno && self.complete_by_duration_secs == 0 {
            return Err(CaptureError::config(
                "complete_by_duration_secs is required when complete_by_seqno is false",
            ));
        }
        Ok(())
    }
}
