//! Bounded producer/consumer pipeline in front of a [`RotatingFileWriter`]
//!
//! Each channel owns a bounded FIFO and exactly one worker. Producers
//! suspend in [`AsyncLogChannel::submit`] while the buffer is full; the worker
//! hands messages to the writer one at a time, in the order they were queued.
//!
//! The worker lives on a blocking-pool thread, so appends, renames and syncs
//! never run on the executor threads that serve producers.

use crate::config::WriterConfig;
use crate::writer::{DiagnosticsSnapshot, FailureKind, RotatingFileWriter};
use crate::{JsonLogError, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One stream's buffer, worker and writer
pub struct AsyncLogChannel {
    sender: mpsc::Sender<String>,
    writer: Arc<RotatingFileWriter>,
    shutdown_token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncLogChannel {
    /// Open the writer described by `config` and start the worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(capacity: usize, config: &WriterConfig) -> Result<Self> {
        let writer = RotatingFileWriter::open(config)?;
        Self::with_writer(capacity, writer)
    }

    /// Start a worker feeding an already opened writer
    pub fn with_writer(capacity: usize, writer: RotatingFileWriter) -> Result<Self> {
        if capacity == 0 {
            return Err(JsonLogError::Config(
                "channel capacity must be at least 1".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            JsonLogError::Config(format!("log channel needs a tokio runtime: {}", e))
        })?;

        let (sender, receiver) = mpsc::channel(capacity);
        let writer = Arc::new(writer);
        let shutdown_token = CancellationToken::new();

        let worker = {
            let handle = runtime.clone();
            let writer = Arc::clone(&writer);
            let token = shutdown_token.clone();
            runtime.spawn_blocking(move || handle.block_on(run_worker(receiver, writer, token)))
        };

        debug!(path = %writer.path().display(), capacity, "started log channel");

        Ok(Self {
            sender,
            writer,
            shutdown_token,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue `message`, waiting while the buffer is full
    pub async fn submit<M: Into<String>>(&self, message: M) -> Result<()> {
        self.sender
            .send(message.into())
            .await
            .map_err(|_| self.closed())
    }

    /// Queue `message` from synchronous code, blocking the thread while the buffer is full.
    ///
    /// Panics if called from an async context, like [`mpsc::Sender::blocking_send`].
    pub fn blocking_submit<M: Into<String>>(&self, message: M) -> Result<()> {
        self.sender
            .blocking_send(message.into())
            .map_err(|_| self.closed())
    }

    /// Serialize `value` as JSON and queue it
    pub async fn submit_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let message = serde_json::to_string(value)?;
        self.submit(message).await
    }

    /// Stop the worker after it drains the buffer, then sync and close the file.
    ///
    /// Every message queued before this call is on disk when it returns.
    /// Calling it again is a no-op.
    pub async fn close(&self) -> Result<()> {
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return Ok(());
        };

        self.shutdown_token.cancel();
        let joined = worker.await;

        if let Err(err) = self.writer.flush() {
            self.writer.diagnostics().report(FailureKind::Flush, &err);
        }
        self.writer.close();

        info!(
            path = %self.writer.path().display(),
            stats = ?self.stats(),
            "closed log channel"
        );

        joined.map_err(|e| JsonLogError::Worker(e.to_string()))
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Buffer capacity
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Messages queued or reserved but not yet taken by the worker
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// The writer this channel feeds
    pub fn writer(&self) -> &RotatingFileWriter {
        &self.writer
    }

    /// Rotation and failure counters
    pub fn stats(&self) -> DiagnosticsSnapshot {
        self.writer.diagnostics().snapshot()
    }

    fn closed(&self) -> JsonLogError {
        JsonLogError::Closed(self.writer.path().display().to_string())
    }
}

impl Drop for AsyncLogChannel {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

impl std::fmt::Debug for AsyncLogChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncLogChannel")
            .field("writer", &self.writer)
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<String>,
    writer: Arc<RotatingFileWriter>,
    shutdown_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            message = receiver.recv() => match message {
                Some(message) => deliver(&writer, &message),
                None => break,
            },
            _ = shutdown_token.cancelled() => break,
        }
    }

    // Refuse new messages, then write out whatever is already queued.
    receiver.close();
    while let Some(message) = receiver.recv().await {
        deliver(&writer, &message);
    }

    debug!(path = %writer.path().display(), "log channel worker stopped");
}

fn deliver(writer: &RotatingFileWriter, message: &str) {
    match writer.write_message(message) {
        Ok(()) => debug!(
            path = %writer.path().display(),
            bytes = message.len() + 1,
            "wrote message"
        ),
        Err(err) => writer.diagnostics().report(FailureKind::Write, &err),
    }
}
