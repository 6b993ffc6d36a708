//! Error types for capture operations
//!
//! Errors are classified so the session can tell a bootstrap failure (the
//! Driver never came up) from a stream failure (one partition ended badly)
//! and from shutdown noise.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error categories for logging and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Credential resolution, sink initialization, checkpoint startup
    Bootstrap,
    /// Stream connection startup
    Connection,
    /// A partition stream ended with an error
    Stream,
    /// Invalid settings
    Configuration,
    /// Operation not valid in the current lifecycle state
    Lifecycle,
    /// Other/unknown errors
    Other,
}

/// Kind of a [`StreamError`], used by the completion policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorKind {
    Closed,
    Rollback,
    Lost,
    TooSlow,
    Other,
}

/// Cause reported by a stream connection when a partition stream ends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Stream closed because we asked for it
    #[error("stream closed")]
    Closed,

    /// Server asked for a rollback to an earlier sequence number
    #[error("rollback requested to seqno {seqno}")]
    Rollback { seqno: u64 },

    /// Connection to the partition owner was lost
    #[error("connection lost: {0}")]
    Lost(String),

    /// Server closed the stream because the consumer was too slow
    #[error("stream closed by server: consumer too slow")]
    TooSlow,

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl StreamError {
    pub fn kind(&self) -> StreamErrorKind {
        match self {
            Self::Closed => StreamErrorKind::Closed,
            Self::Rollback { .. } => StreamErrorKind::Rollback,
            Self::Lost(_) => StreamErrorKind::Lost,
            Self::TooSlow => StreamErrorKind::TooSlow,
            Self::Other(_) => StreamErrorKind::Other,
        }
    }
}

/// Capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Credential resolution failed
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Persistence sink failed to initialize
    #[error("Sink error: {0}")]
    Sink(String),

    /// Checkpoint coordinator failed
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// A stream connection failed to start
    #[error("Connection {index} failed to start: {message}")]
    ConnectionStart { index: usize, message: String },

    /// A partition stream completed with an error
    #[error("{driver} partition {partition} completed with err {source} - {reason}")]
    Stream {
        driver: String,
        partition: u16,
        reason: String,
        #[source]
        source: StreamError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CaptureError {
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    pub fn connection_start(index: usize, msg: impl Into<String>) -> Self {
        Self::ConnectionStart {
            index,
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Wrap a stream error with the identity of the Driver and partition.
    pub fn stream(
        driver: impl Into<String>,
        partition: u16,
        source: StreamError,
        reason: impl Into<String>,
    ) -> Self {
        Self::Stream {
            driver: driver.into(),
            partition,
            reason: reason.into(),
            source,
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Credentials(_) | Self::Sink(_) | Self::Checkpoint(_) => ErrorCategory::Bootstrap,
            Self::ConnectionStart { .. } => ErrorCategory::Connection,
            Self::Stream { .. } => ErrorCategory::Stream,
            Self::Config(_) | Self::Yaml(_) => ErrorCategory::Configuration,
            Self::InvalidState(_) => ErrorCategory::Lifecycle,
            Self::Io(_) | Self::Other(_) => ErrorCategory::Other,
        }
    }

    /// Errors that make `Driver::start` fail.
    pub fn is_fatal_to_start(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Bootstrap | ErrorCategory::Connection
        )
    }

    /// Get a log-safe error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Credentials(_) => "credentials_error",
            Self::Sink(_) => "sink_error",
            Self::Checkpoint(_) => "checkpoint_error",
            Self::ConnectionStart { .. } => "connection_start_error",
            Self::Stream { .. } => "stream_error",
            Self::Config(_) => "config_error",
            Self::Yaml(_) => "yaml_error",
            Self::InvalidState(_) => "invalid_state",
            Self::Io(_) => "io_error",
            Self::Other(_) => "unknown",
        }
    }
}

/// Result type for capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_display() {
        let err = CaptureError::stream("source", 7, StreamError::Lost("reset".into()), "eof");
        let text = err.to_string();
        assert!(text.contains("source"));
        assert!(text.contains("partition 7"));
        assert!(text.contains("connection lost: reset"));
        assert!(text.ends_with("- eof"));
    }

    #[test]
    fn test_stream_error_kind() {
        assert_eq!(StreamError::Closed.kind(), StreamErrorKind::Closed);
        assert_eq!(
            StreamError::Rollback { seqno: 10 }.kind(),
            StreamErrorKind::Rollback
        );
        assert_eq!(StreamError::TooSlow.kind(), StreamErrorKind::TooSlow);
        assert_eq!(StreamError::Other("x".into()).kind(), StreamErrorKind::Other);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            CaptureError::credentials("x").category(),
            ErrorCategory::Bootstrap
        );
        assert_eq!(CaptureError::sink("x").category(), ErrorCategory::Bootstrap);
        assert_eq!(
            CaptureError::connection_start(1, "x").category(),
            ErrorCategory::Connection
        );
        assert_eq!(
            CaptureError::config("x").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            CaptureError::invalid_state("x").category(),
            ErrorCategory::Lifecycle
        );
        assert_eq!(CaptureError::other("x").category(), ErrorCategory::Other);
    }

    #[test]
    fn test_fatal_to_start() {
        assert!(CaptureError::checkpoint("stats").is_fatal_to_start());
        assert!(CaptureError::connection_start(0, "refused").is_fatal_to_start());
        assert!(!CaptureError::stream("t", 0, StreamError::TooSlow, "r").is_fatal_to_start());
        assert!(!CaptureError::config("x").is_fatal_to_start());
    }

    #[test]
    fn test_error_code() {
        assert_eq!(CaptureError::sink("x").error_code(), "sink_error");
        assert_eq!(
            CaptureError::stream("s", 1, StreamError::Closed, "r").error_code(),
            "stream_error"
        );
        assert_eq!(CaptureError::config("x").error_code(), "config_error");
    }
}
