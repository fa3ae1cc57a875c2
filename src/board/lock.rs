//! Advisory per-board file locks.
//!
//! Each board file `X` is guarded by an exclusive OS lock on the sidecar
//! `X.lock`. The lock is held for the lifetime of a [`BoardLock`] and released
//! when it is dropped, on every exit path.

use crate::error::{BoardError, Result};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default interval between attempts while a lock is contended.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sidecar lock path for a board file: `<board-file>.lock`.
pub fn lock_path_for(board_path: &Path) -> PathBuf {
    let mut name: OsString = board_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Guard holding the exclusive lock for one board.
#[derive(Debug)]
pub struct BoardLock {
    file: File,
    path: PathBuf,
}

impl BoardLock {
    /// Acquire the lock for `board_path`, waiting up to `timeout`.
    pub fn acquire(board_path: &Path, timeout: Duration) -> Result<Self> {
        Self::acquire_with_poll(board_path, timeout, DEFAULT_POLL_INTERVAL)
    }

    pub fn acquire_with_poll(board_path: &Path, timeout: Duration, poll: Duration) -> Result<Self> {
        let path = lock_path_for(board_path);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| BoardError::LockDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| BoardError::LockFailed {
                path: path.clone(),
                source,
            })?;

        // A timeout too large to add to `Instant::now()` waits forever.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    debug!(lock = %path.display(), "Acquired board lock");
                    return Ok(Self { file, path });
                }
                Err(e) if is_contended(&e) => {
                    let wait = match deadline {
                        Some(deadline) => {
                            let now = Instant::now();
                            if now >= deadline {
                                warn!(lock = %path.display(), ?timeout, "Timed out waiting for board lock");
                                return Err(BoardError::LockTimeout { path, timeout });
                            }
                            poll.min(deadline - now)
                        }
                        None => poll,
                    };
                    thread::sleep(wait);
                }
                Err(source) => return Err(BoardError::LockFailed { path, source }),
            }
        }
    }

    /// Path of the sidecar lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BoardLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(lock = %self.path.display(), error = %e, "Failed to release board lock");
        } else {
            debug!(lock = %self.path.display(), "Released board lock");
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    let contended = fs2::lock_contended_error();
    err.kind() == std::io::ErrorKind::WouldBlock
        || (err.raw_os_error().is_some() && err.raw_os_error() == contended.raw_os_error())
}
