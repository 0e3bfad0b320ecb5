//! A file handle whose writes and replacement are serialized by one lock

use parking_lot::{Mutex, MutexGuard};
use std::fs::File;
use std::io::{self, Write};

/// Exclusive owner of one stream's OS file handle
#[derive(Debug, Default)]
pub struct ExclusiveFile {
    handle: Mutex<Option<File>>,
}

/// Holds the handle lock across a multi-step replacement
pub struct HandleGuard<'a> {
    handle: MutexGuard<'a, Option<File>>,
}

fn closed_handle() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "log file handle is closed")
}

impl ExclusiveFile {
    /// Wrap an already opened file
    pub fn new(file: File) -> Self {
        Self {
            handle: Mutex::new(Some(file)),
        }
    }

    /// Write `buf` with a single underlying write call
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        match self.handle.lock().as_mut() {
            Some(file) => file.write(buf),
            None => Err(closed_handle()),
        }
    }

    /// Write all of `buf` while holding the lock, so concurrent callers never interleave
    pub fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        match self.handle.lock().as_mut() {
            Some(file) => file.write_all(buf),
            None => Err(closed_handle()),
        }
    }

    /// Store `file`, closing the previous handle. Close errors are ignored.
    pub fn set_handle(&self, file: File) {
        let previous = self.handle.lock().replace(file);
        drop(previous);
    }

    /// Take the lock for a replacement sequence
    pub fn lock(&self) -> HandleGuard<'_> {
        HandleGuard {
            handle: self.handle.lock(),
        }
    }

    /// Sync file contents and metadata to stable storage
    pub fn sync(&self) -> io::Result<()> {
        match self.handle.lock().as_ref() {
            Some(file) => file.sync_all(),
            None => Err(closed_handle()),
        }
    }

    /// Release the handle. Later writes fail with `NotConnected`.
    pub fn close(&self) {
        let previous = self.handle.lock().take();
        drop(previous);
    }

    /// Whether a handle is currently held
    pub fn is_open(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl HandleGuard<'_> {
    /// Swap in `file`, handing back the previous handle still open
    pub fn replace(&mut self, file: File) -> Option<File> {
        self.handle.replace(file)
    }

    /// Whether a handle is currently held
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}
