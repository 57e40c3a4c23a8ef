//! Cross-process pool lock.
//!
//! Mutual exclusion over the pool file must hold across independent OS
//! processes sharing the same pool, so an in-memory mutex is not enough.
//! The guard is a sibling `.lock` file created with `create_new` semantics:
//! whichever process creates it owns the pool until the guard drops.

use crate::server::store::StoreError;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Interval between acquisition attempts while the lock is held elsewhere.
const RETRY_INTERVAL: Duration = Duration::from_millis(5);

pub fn lock_path_for(pool_path: &Path) -> PathBuf {
    let mut path: OsString = pool_path.as_os_str().to_os_string();
    path.push(".lock");
    PathBuf::from(path)
}

/// Holds the pool lock for the lifetime of the value.
pub struct FileLockGuard {
    lock_path: PathBuf,
    _file: File,
}

impl FileLockGuard {
    /// Acquire the lock for `pool_path`, retrying until `timeout` elapses.
    ///
    /// Blocks the calling thread; store operations run on the blocking
    /// thread pool, never on an async runtime worker.
    pub fn acquire(pool_path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let lock_path = lock_path_for(pool_path);
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(&lock_path, &e))?;
            }
        }

        let started = Instant::now();
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    let _ = writeln!(file, "pid={}", std::process::id());
                    return Ok(Self {
                        lock_path,
                        _file: file,
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if started.elapsed() >= timeout {
                        return Err(StoreError::LockTimeout {
                            path: lock_path.display().to_string(),
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(err) => return Err(StoreError::io(&lock_path, &err)),
            }
        }
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}
