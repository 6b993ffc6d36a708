//! Stream completion classification and error reporting
//!
//! When a partition stream ends with an error, the [`CompletionPolicy`]
//! decides whether the error is an expected consequence of our own stop
//! request (allowed) or a real failure that must reach the session through
//! the [`ErrorReporter`].

use crate::common::{CaptureError, StreamError, StreamErrorKind};
use std::collections::HashSet;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tracing::{debug, warn};

/// Set of stream error kinds treated as benign completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPolicy {
    allowed: HashSet<StreamErrorKind>,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            allowed: HashSet::from([StreamErrorKind::Closed]),
        }
    }
}

impl CompletionPolicy {
    /// Policy with an explicit allowed set (may be empty).
    pub fn new(allowed: impl IntoIterator<Item = StreamErrorKind>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn allow(mut self, kind: StreamErrorKind) -> Self {
        self.allowed.insert(kind);
        self
    }

    pub fn is_allowed(&self, err: &StreamError) -> bool {
        self.allowed.contains(&err.kind())
    }
}

/// Non-blocking sender for the error channel shared by a session's Drivers.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    tx: Sender<CaptureError>,
}

impl ErrorReporter {
    pub fn new(tx: Sender<CaptureError>) -> Self {
        Self { tx }
    }

    /// Create a reporter and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, Receiver<CaptureError>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Best-effort send. Returns `true` if the error was queued.
    ///
    /// A full or closed channel is logged and never blocks the caller.
    pub fn report(&self, err: CaptureError) -> bool {
        match self.tx.try_send(err) {
            Ok(()) => true,
            Err(TrySendError::Full(err)) => {
                debug!("error channel full, dropping error: {}", err);
                false
            }
            Err(TrySendError::Closed(err)) => {
                warn!("error channel closed, dropping error: {}", err);
                false
            }
        }
    }
}
