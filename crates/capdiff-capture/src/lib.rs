//! # capdiff-capture - Mutation capture for replication verification
//!
//! Captures the mutation streams of every partition of a bucket on two
//! clusters, source and target, so the recorded sets can be diffed later to
//! verify that replication transferred the data correctly.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      CaptureSession                        │
//! │        error channel · join barrier · completion mode      │
//! └──────────────┬───────────────────────────────┬─────────────┘
//!                ▼                               ▼
//!        ┌──────────────┐                ┌──────────────┐
//!        │ Driver (src) │                │ Driver (tgt) │
//!        └──────┬───────┘                └──────┬───────┘
//!               │ balance_load                  │
//!   ┌───────────┼───────────┐                   ...
//!   ▼           ▼           ▼
//! Conn 0      Conn 1      Conn N ──► PersistenceSink
//!   │ handle_partition_completion
//!   ▼
//! PartitionStateTable ◄── completion watcher
//! ```
//!
//! The Driver manages lifecycle and progress bookkeeping only. The wire
//! protocol, file format and checkpoint persistence live behind the traits
//! in [`common`].
//!
//! ## Public API Organization
//!
//! ### Tier 1: Core Types (crate root)
//! `Driver`, `CaptureSession`, configuration and errors.
//!
//! ### Tier 2: Collaborator traits (crate root)
//! What an integration implements to plug in a real cluster.
//!
//! ### Tier 3: Building blocks (`common` module)
//! Balancer, partition table, counters, signals.

pub mod common;
pub mod driver;
pub mod session;
pub mod testing;

// =============================================================================
// TIER 1: Core Types
// =============================================================================

pub use common::{
    CaptureError, CompletionMode, DriverConfig, DriverConfigBuilder, ErrorCategory, Result,
    SessionConfig, StreamError, StreamErrorKind,
};
pub use driver::{CompletionHandle, Driver, DriverBuilder, DriverState};
pub use session::{CaptureSession, DriverReport, SessionReport};

// =============================================================================
// TIER 2: Collaborator traits
// =============================================================================

pub use common::{
    CheckpointContext, CheckpointCoordinator, ConnectionContext, ConnectionFactory,
    CredentialSource, Credentials, PersistenceSink, SinkLayout, StaticCredentials,
    StreamConnection,
};

// =============================================================================
// TIER 3: Building blocks - available via `common::`
// =============================================================================
//
//   - common::balance_load, partition_lists
//   - common::PartitionState, PartitionStateTable
//   - common::DriverCounters, CounterSnapshot
//   - common::CompletionPolicy, ErrorReporter
//   - common::ReadySignal
