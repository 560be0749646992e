//! Durable key-value backends for cache snapshot persistence.
//!
//! A [`StorageBackend`] is a synchronous string store addressed by a single
//! derived key. Two backends are provided: [`MemoryStorage`] for
//! session-scoped persistence (gone when the process ends) and
//! [`FileStorage`] for durable persistence across restarts.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use thiserror::Error;

/// Where (and whether) the cache snapshot is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistencePolicy {
    /// Never persisted; no storage I/O is performed.
    #[default]
    None,
    /// Persisted to a session-scoped backend, cleared when the session ends.
    Session,
    /// Persisted to a durable backend, surviving restarts.
    Local,
}

impl fmt::Display for PersistencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Session => write!(f, "session"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Error from a storage backend write.
#[derive(Error, Debug)]
#[error("storage write failed: {0}")]
pub struct StorageError(#[from] io::Error);

/// A synchronous string key-value store used for cache snapshots.
///
/// Reads are infallible from the caller's perspective: an unreadable entry is
/// reported as absent. Writes may fail, but snapshot persistence is
/// best-effort and the caller never propagates the failure.
pub trait StorageBackend: Send + Sync {
    /// Returns the stored value for `key`, or `None` when absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any prior value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the underlying store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory storage, the session-scoped backend.
///
/// Clones share the same underlying map, so a handle can be kept on the side
/// to outlive an individual cache store (e.g. to simulate a reload in tests).
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide session store.
    ///
    /// Every handle returned here shares one map, the way all consumers of a
    /// browser session share one `sessionStorage`. Snapshots written under
    /// the `Session` policy stay readable by stores reconstructed later in
    /// the same process, and are gone when the process ends.
    #[must_use]
    pub fn session() -> Self {
        static SESSION: OnceLock<MemoryStorage> = OnceLock::new();
        SESSION.get_or_init(Self::new).clone()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("storage mutex poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .expect("storage mutex poisoned")
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// File-backed storage, the durable backend.
///
/// Each key maps to one JSON file under the configured directory. The
/// directory is created lazily on first write.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates a file store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates a file store rooted in the platform cache directory.
    #[must_use]
    pub fn in_cache_dir() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self::new(base.join("refetch"))
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(key), value)?;
        Ok(())
    }
}
