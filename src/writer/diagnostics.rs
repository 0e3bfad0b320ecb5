//! Failure reporting for a single stream
//!
//! Write and rotation failures never stop a stream. They are logged, counted,
//! and handed to an optional observer so embedders can alert on them.

use crate::JsonLogError;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What part of the pipeline failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Rotation check or rename/reopen sequence
    Rotation,
    /// Appending a message; the message was dropped
    Write,
    /// Syncing the file during shutdown
    Flush,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Rotation => write!(f, "rotation"),
            FailureKind::Write => write!(f, "write"),
            FailureKind::Flush => write!(f, "flush"),
        }
    }
}

/// A failure event handed to the observer
#[derive(Debug)]
pub struct Failure<'a> {
    /// Stream label (the live file path)
    pub stream: &'a str,
    /// Failing stage
    pub kind: FailureKind,
    /// The error itself
    pub error: &'a JsonLogError,
}

/// Callback invoked for every reported failure
pub type FailureObserver = Arc<dyn Fn(&Failure<'_>) + Send + Sync>;

/// Point-in-time copy of a stream's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    /// Successful rotations
    pub rotations: u64,
    /// Failed rotations
    pub rotation_failures: u64,
    /// Dropped messages
    pub write_failures: u64,
    /// Failed syncs
    pub flush_failures: u64,
}

/// Per-stream failure sink
pub struct Diagnostics {
    stream: String,
    observer: Option<FailureObserver>,
    rotations: AtomicU64,
    rotation_failures: AtomicU64,
    write_failures: AtomicU64,
    flush_failures: AtomicU64,
}

impl Diagnostics {
    /// Create a sink labelled `stream`
    pub fn new<S: Into<String>>(stream: S) -> Self {
        Self {
            stream: stream.into(),
            observer: None,
            rotations: AtomicU64::new(0),
            rotation_failures: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
        }
    }

    /// Attach an observer
    pub fn with_observer(mut self, observer: FailureObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Stream label
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Log, count and forward a failure
    pub fn report(&self, kind: FailureKind, err: &JsonLogError) {
        match kind {
            FailureKind::Rotation => {
                warn!(stream = %self.stream, error = %err, "rotation failed, keeping current file");
                self.rotation_failures.fetch_add(1, Ordering::Relaxed);
            }
            FailureKind::Write => {
                error!(stream = %self.stream, error = %err, "dropping message");
                self.write_failures.fetch_add(1, Ordering::Relaxed);
            }
            FailureKind::Flush => {
                error!(stream = %self.stream, error = %err, "sync failed");
                self.flush_failures.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(observer) = &self.observer {
            observer(&Failure {
                stream: &self.stream,
                kind,
                error: err,
            });
        }
    }

    /// Record a completed rotation
    pub fn record_rotation(&self, rotated_to: &Path) {
        info!(stream = %self.stream, rotated_to = %rotated_to.display(), "rotated log file");
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counters
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            rotations: self.rotations.load(Ordering::Relaxed),
            rotation_failures: self.rotation_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("stream", &self.stream)
            .field("observer", &self.observer.is_some())
            .field("counters", &self.snapshot())
            .finish()
    }
}
