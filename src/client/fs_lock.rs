//! Filesystem-based locking for cross-process coordination
//!
//! Only one process may write to an index at a time. The lock is an `flock`
//! on a file derived from the index path, so two `update` runs against the
//! same index serialize (or fail fast) while readers are never blocked.

use crate::error::RosettaError;
use crate::paths::PlatformPaths;
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Guard that holds an exclusive filesystem lock
///
/// The lock is released when this guard is dropped. If the process crashes,
/// the OS releases the flock.
pub struct FsLockGuard {
    _file: File,
    path: PathBuf,
}

impl FsLockGuard {
    /// Try to acquire an exclusive lock for `index_identity`, non-blocking
    ///
    /// The lock file lives in `lock_dir`. Returns `Ok(None)` if another
    /// holder has it.
    pub fn try_acquire(lock_dir: &Path, index_identity: &str) -> Result<Option<Self>, RosettaError> {
        let lock_path = PlatformPaths::lock_file_path(lock_dir, index_identity);

        tracing::debug!(
            "Attempting to acquire index lock: index={}, lock_file={:?}",
            index_identity,
            lock_path
        );

        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!("Acquired index lock for {}", index_identity);
                Ok(Some(Self {
                    _file: file,
                    path: lock_path,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                tracing::debug!("Index lock held elsewhere for {}", index_identity);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Acquire the lock, polling until available or `timeout` expires
    pub fn acquire_blocking(
        lock_dir: &Path,
        index_identity: &str,
        timeout: Duration,
    ) -> Result<Option<Self>, RosettaError> {
        let start = Instant::now();
        let sleep_interval = Duration::from_millis(250);

        tracing::info!(
            "Waiting for index lock on {} (timeout: {:?})",
            index_identity,
            timeout
        );

        loop {
            if let Some(guard) = Self::try_acquire(lock_dir, index_identity)? {
                tracing::info!("Acquired index lock after {:?}", start.elapsed());
                return Ok(Some(guard));
            }
            if start.elapsed() >= timeout {
                tracing::warn!(
                    "Timeout waiting for index lock on {} after {:?}",
                    index_identity,
                    timeout
                );
                return Ok(None);
            }
            std::thread::sleep(sleep_interval);
        }
    }

    /// Acquire per the configured wait: `0` tries once, otherwise polls for
    /// that many seconds. A lock that stays held maps to `IndexBusy`.
    pub fn acquire(
        lock_dir: &Path,
        index_identity: &str,
        wait_secs: u64,
    ) -> Result<Self, RosettaError> {
        let guard = if wait_secs == 0 {
            Self::try_acquire(lock_dir, index_identity)?
        } else {
            Self::acquire_blocking(lock_dir, index_identity, Duration::from_secs(wait_secs))?
        };
        guard.ok_or_else(|| RosettaError::IndexBusy(index_identity.to_string()))
    }
}

impl Drop for FsLockGuard {
    fn drop(&mut self) {
        // Closing the file releases the flock; the file itself is reused
        tracing::debug!("Releasing index lock {:?}", self.path);
    }
}
