//! Durable keyed board pool.
//!
//! A persistent multiset of serialized boards keyed by
//! `(width, height, difficulty)`, backed by a single JSONL file whose rows
//! are exactly `(width, height, difficulty, data)`. Every operation runs the
//! same lock-scoped discipline: acquire the cross-process [`lock`] guard,
//! load, mutate, atomically replace the file (tmp write, fsync, rename),
//! release. Readers therefore never observe a torn record, and a record
//! taken once is gone for good.
//!
//! Operations hold the lock only for the load-mutate-replace window; board
//! synthesis never runs under the guard.

mod lock;

use crate::server::store::lock::FileLockGuard;
use lantern::{Board, Difficulty};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identifies one homogeneous inventory bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolKey {
    pub width: u32,
    pub height: u32,
    pub difficulty: Difficulty,
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.difficulty)
    }
}

/// One stored board. The row layout is the pool's on-disk schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PoolRecord {
    width: u32,
    height: u32,
    difficulty: Difficulty,
    data: String,
}

impl PoolRecord {
    fn matches(&self, key: &PoolKey) -> bool {
        self.width == key.width && self.height == key.height && self.difficulty == key.difficulty
    }

    fn key(&self) -> PoolKey {
        PoolKey {
            width: self.width,
            height: self.height,
            difficulty: self.difficulty,
        }
    }
}

/// Errors from pool operations. All of these are storage faults surfaced to
/// the caller; an empty bucket is a normal outcome, not an error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("pool i/o error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("corrupt pool record at line {line}: {message}")]
    Corrupt { line: usize, message: String },

    #[error("failed to encode pool record: {0}")]
    Encode(String),

    #[error("pool lock at {path} still held after {waited_ms} ms")]
    LockTimeout { path: String, waited_ms: u64 },
}

impl StoreError {
    fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// The board pool.
///
/// Cheap to share: holds only the pool path and the lock timeout. All
/// methods are synchronous and blocking; call them through
/// `tokio::task::spawn_blocking` from async contexts.
pub struct PoolStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl PoolStore {
    /// Open (or create) the pool at `path`, failing fast on an unreadable or
    /// corrupt file.
    pub fn open(path: impl AsRef<Path>, lock_timeout: Duration) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            lock_timeout,
        };
        store.load()?;
        Ok(store)
    }

    /// Append one board under `key`.
    pub fn insert(&self, key: &PoolKey, board: &Board) -> Result<(), StoreError> {
        let data = serde_json::to_string(board).map_err(|e| StoreError::Encode(e.to_string()))?;
        let record = PoolRecord {
            width: key.width,
            height: key.height,
            difficulty: key.difficulty,
            data,
        };
        self.mutate(move |records| {
            records.push(record);
            Ok(((), true))
        })
    }

    /// Atomically remove and return one board under `key`, or `None` when
    /// the bucket is empty. Records under one key are fungible; no ordering
    /// is guaranteed.
    pub fn take_one(&self, key: &PoolKey) -> Result<Option<Board>, StoreError> {
        self.mutate(|records| {
            let Some(idx) = records.iter().position(|r| r.matches(key)) else {
                return Ok((None, false));
            };
            let record = records.swap_remove(idx);
            let board: Board = serde_json::from_str(&record.data).map_err(|e| {
                StoreError::Corrupt {
                    line: idx + 1,
                    message: e.to_string(),
                }
            })?;
            Ok((Some(board), true))
        })
    }

    /// Current standing inventory for `key`. Advisory: may be stale the
    /// moment it returns under concurrent access.
    pub fn count(&self, key: &PoolKey) -> Result<usize, StoreError> {
        self.mutate(|records| {
            let n = records.iter().filter(|r| r.matches(key)).count();
            Ok((n, false))
        })
    }

    /// Inventory per key, sorted, for the status view. Only keys with at
    /// least one stored board appear.
    pub fn counts(&self) -> Result<Vec<(PoolKey, usize)>, StoreError> {
        self.mutate(|records| {
            let mut by_key = BTreeMap::new();
            for record in records.iter() {
                *by_key.entry(record.key()).or_insert(0) += 1;
            }
            Ok((by_key.into_iter().collect(), false))
        })
    }

    /// Execute one lock-scoped mutation. The mutator returns
    /// `(value, changed)`; `changed = true` persists the records before the
    /// lock is released.
    fn mutate<T>(
        &self,
        mutator: impl FnOnce(&mut Vec<PoolRecord>) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = FileLockGuard::acquire(&self.path, self.lock_timeout)?;
        let mut records = self.load()?;
        let (value, changed) = mutator(&mut records)?;
        if changed {
            self.save(&records)?;
        }
        Ok(value)
    }

    fn load(&self) -> Result<Vec<PoolRecord>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&self.path, &err)),
        };
        let mut records = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| StoreError::io(&self.path, &e))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let record = serde_json::from_str(trimmed).map_err(|e| StoreError::Corrupt {
                line: line_no + 1,
                message: e.to_string(),
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Replace the pool file atomically: write a sibling tmp file, fsync,
    /// rename over the target, fsync the directory.
    fn save(&self, records: &[PoolRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(&self.path, &e))?;
            }
        }

        let tmp_path = self.tmp_path();
        let write_result = (|| -> Result<(), StoreError> {
            let file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, &e))?;
            let mut writer = BufWriter::new(file);
            for record in records {
                let line = serde_json::to_string(record)
                    .map_err(|e| StoreError::Encode(e.to_string()))?;
                writeln!(writer, "{line}").map_err(|e| StoreError::io(&tmp_path, &e))?;
            }
            writer.flush().map_err(|e| StoreError::io(&tmp_path, &e))?;
            let file = writer
                .into_inner()
                .map_err(|e| StoreError::io(&tmp_path, e.error()))?;
            file.sync_all().map_err(|e| StoreError::io(&tmp_path, &e))?;
            Ok(())
        })();

        if let Err(error) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(error);
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::io(&self.path, &e)
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                let dir = File::open(parent).map_err(|e| StoreError::io(parent, &e))?;
                dir.sync_all().map_err(|e| StoreError::io(parent, &e))?;
            }
        }

        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.as_os_str().to_os_string();
        tmp.push(format!(".tmp.{}", std::process::id()));
        PathBuf::from(tmp)
    }
}
