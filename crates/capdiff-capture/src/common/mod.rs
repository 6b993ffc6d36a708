//! # Common Capture Types and Traits
//!
//! Cluster-agnostic building blocks of a capture Driver:
//!
//! - [`CaptureError`] - Error taxonomy and stream end causes
//! - [`DriverConfig`] / [`SessionConfig`] - YAML configuration
//! - [`balance_load`] - Partition range balancing across connections
//! - [`PartitionStateTable`] - Per-partition completion state
//! - [`DriverCounters`] - Lock-free counters
//! - [`CompletionPolicy`] / [`ErrorReporter`] - Stream error classification
//! - [`ReadySignal`] - Starting seqnos resolved barrier
//! - [`StreamConnection`], [`CheckpointCoordinator`], [`PersistenceSink`],
//!   [`CredentialSource`] - Collaborator traits

mod balance;
mod completion;
mod config;
mod error;
mod metrics;
mod partition;
mod signal;
mod traits;

pub use balance::*;
pub use completion::*;
pub use config::*;
pub use error::*;
pub use metrics::*;
pub use partition::*;
pub use signal::*;
pub use traits::*;
