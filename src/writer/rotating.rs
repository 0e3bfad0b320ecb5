//! Date-rotating file writer
//!
//! The writer owns one live file. Before every append it checks whether the
//! calendar date moved since the file was opened; if so the live file is
//! renamed to `<file>.<YYYYMMDD>` (or `<file>.<YYYYMMDD>.<NNN>` when that name
//! is taken) and a fresh live file is opened in its place.
//!
//! Two locks are involved. The rotation lock guards the open-date marker and
//! the check-and-rotate sequence; the handle lock inside [`ExclusiveFile`]
//! guards physical writes and the handle swap. Rotation takes the handle lock
//! only after the rotated name is chosen, and holds it until the new handle
//! is in place.

use crate::config::WriterConfig;
use crate::writer::clock::{Clock, SystemClock};
use crate::writer::diagnostics::{Diagnostics, FailureKind};
use crate::writer::exclusive_file::ExclusiveFile;
use crate::{JsonLogError, Result};
use chrono::{Duration, NaiveDate};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

/// Highest collision suffix tried before rotation gives up
pub const MAX_SEQUENCE: u32 = 999;

/// Result of a rotation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateOutcome {
    /// The live file was moved to this path and a new live file opened
    Rotated(PathBuf),
    /// Nothing to do: rotation not due, or the live file is gone
    Skipped,
}

/// Appends lines to a live file and rotates it on date change
pub struct RotatingFileWriter {
    path: PathBuf,
    daily: bool,
    rotate: bool,
    file: ExclusiveFile,
    opened_on: Mutex<NaiveDate>,
    clock: Arc<dyn Clock>,
    diagnostics: Arc<Diagnostics>,
}

impl RotatingFileWriter {
    /// Open the configured live file using the wall clock
    pub fn open(config: &WriterConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open the configured live file, taking dates from `clock`
    pub fn open_with_clock(config: &WriterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = config.validate()?.to_path_buf();
        let file = open_live(&path)?;
        let opened_on = clock.now().date_naive();

        debug!(path = %path.display(), %opened_on, "opened log file");

        Ok(Self {
            diagnostics: Arc::new(Diagnostics::new(path.display().to_string())),
            path,
            daily: config.daily,
            rotate: config.rotate,
            file: ExclusiveFile::new(file),
            opened_on: Mutex::new(opened_on),
            clock,
        })
    }

    /// Report failures to `diagnostics` instead of the default sink
    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Live file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Date the live file was opened
    pub fn opened_on(&self) -> NaiveDate {
        *self.opened_on.lock()
    }

    /// Whether a handle is currently held
    pub fn is_open(&self) -> bool {
        self.file.is_open()
    }

    /// Failure sink for this writer
    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    /// Stall every writer call until the guard is dropped
    #[cfg(test)]
    pub(crate) fn hold_rotation_lock(&self) -> parking_lot::MutexGuard<'_, NaiveDate> {
        self.opened_on.lock()
    }

    /// Rotate if due, then append `text` and a newline.
    ///
    /// A failed rotation is reported and the message still goes to the
    /// current live file. A failed append is returned and the message is lost.
    pub fn write_message(&self, text: &str) -> Result<()> {
        if let Err(err) = self.check_rotation() {
            self.diagnostics.report(FailureKind::Rotation, &err);
        }

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .map_err(|source| JsonLogError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Rotate when enabled and the date differs from the open-date marker
    pub fn check_rotation(&self) -> Result<RotateOutcome> {
        let mut opened_on = self.opened_on.lock();
        let today = self.clock.now().date_naive();

        if !(self.rotate && self.daily && today != *opened_on) {
            return Ok(RotateOutcome::Skipped);
        }

        self.rotate_locked(&mut opened_on)
    }

    /// Rotate now, regardless of policy
    pub fn rotate(&self) -> Result<RotateOutcome> {
        let mut opened_on = self.opened_on.lock();
        self.rotate_locked(&mut opened_on)
    }

    fn rotate_locked(&self, opened_on: &mut NaiveDate) -> Result<RotateOutcome> {
        if !exists(&self.path) {
            debug!(path = %self.path.display(), "live file missing, nothing to rotate");
            return Ok(RotateOutcome::Skipped);
        }

        let now = self.clock.now();
        let stamp = (now - Duration::hours(24)).format("%Y%m%d").to_string();
        let target = rotated_path(&self.path, &stamp)?;

        let mut handle = self.file.lock();
        if !handle.is_open() {
            debug!(path = %self.path.display(), "writer closed, nothing to rotate");
            return Ok(RotateOutcome::Skipped);
        }

        // The old handle stays valid across the rename and keeps serving
        // writes if anything below fails.
        fs::rename(&self.path, &target).map_err(|e| {
            JsonLogError::Rotation(format!(
                "rename {} -> {}: {}",
                self.path.display(),
                target.display(),
                e
            ))
        })?;

        let fresh = match open_live(&self.path).and_then(|file| verify(&self.path, file)) {
            Ok(file) => file,
            Err(err) => {
                if let Err(undo) = fs::rename(&target, &self.path) {
                    error!(
                        path = %self.path.display(),
                        rotated_to = %target.display(),
                        error = %undo,
                        "could not move log file back after failed reopen"
                    );
                }
                return Err(JsonLogError::Rotation(format!("reopen: {}", err)));
            }
        };

        if let Some(previous) = handle.replace(fresh) {
            if let Err(e) = previous.sync_all() {
                debug!(rotated_to = %target.display(), error = %e, "sync of rotated file failed");
            }
        }
        drop(handle);

        *opened_on = now.date_naive();
        self.diagnostics.record_rotation(&target);
        Ok(RotateOutcome::Rotated(target))
    }

    /// Sync the live file to stable storage
    pub fn flush(&self) -> Result<()> {
        self.file.sync().map_err(JsonLogError::Io)
    }

    /// Release the live file handle
    pub fn close(&self) {
        self.file.close();
    }
}

impl std::fmt::Debug for RotatingFileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFileWriter")
            .field("path", &self.path)
            .field("daily", &self.daily)
            .field("rotate", &self.rotate)
            .field("opened_on", &self.opened_on())
            .finish()
    }
}

/// Pick the first free name among `<live>.<stamp>` and `<live>.<stamp>.001`..`.999`
pub fn rotated_path(live: &Path, stamp: &str) -> Result<PathBuf> {
    let candidate = with_suffix(live, stamp);
    if !exists(&candidate) {
        return Ok(candidate);
    }

    (1..=MAX_SEQUENCE)
        .map(|seq| with_suffix(live, &format!("{}.{:03}", stamp, seq)))
        .find(|candidate| !exists(candidate))
        .ok_or_else(|| {
            JsonLogError::Rotation(format!(
                "{}.{}.001 through .{:03} already exist",
                live.display(),
                stamp,
                MAX_SEQUENCE
            ))
        })
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn open_live(path: &Path) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o660);
    }

    options.open(path).map_err(|source| JsonLogError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn verify(path: &Path, file: File) -> Result<File> {
    file.metadata().map_err(|source| JsonLogError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file)
}
