//! The provider-scoped cache store.
//!
//! One [`CacheStore`] is created per provider and shared by handle with every
//! subscription. It maps route keys to the last successful fetch result and
//! broadcasts every commit so sibling subscriptions watching the same route
//! can react without re-fetching.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::storage::{FileStorage, MemoryStorage, PersistencePolicy, StorageBackend};

/// Suffix appended to the configured prefix to derive the snapshot key.
const SNAPSHOT_SUFFIX: &str = "cached-fetch";

/// Capacity of the commit notification channel.
const UPDATE_CHANNEL_CAPACITY: usize = 100;

/// Shared mapping from route key to the last successful value.
///
/// `update` is the sole mutator and is last-writer-wins per key: values are
/// replaced whole, never merged, so no read-modify-write races are possible.
/// When persistence is enabled, every commit re-serializes the full mapping
/// to the storage backend as a best-effort snapshot.
pub struct CacheStore<V> {
    entries: Arc<DashMap<String, V>>,
    update_tx: broadcast::Sender<String>,
    persistence: Option<Persistence>,
}

#[derive(Clone)]
struct Persistence {
    backend: Arc<dyn StorageBackend>,
    key: String,
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            update_tx: self.update_tx.clone(),
            persistence: self.persistence.clone(),
        }
    }
}

impl<V> CacheStore<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates an empty store with persistence disabled.
    #[must_use]
    pub fn new() -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            entries: Arc::new(DashMap::new()),
            update_tx,
            persistence: None,
        }
    }

    /// Creates a store with the given persistence policy, loading any
    /// previously stored snapshot.
    ///
    /// When `backend` is `None`, the policy picks its default backend: the
    /// process-wide [`MemoryStorage::session`] store for `Session`,
    /// [`FileStorage::in_cache_dir`] for `Local`. An absent or corrupt
    /// snapshot starts the store empty and is never an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingPrefix`] when persistence is requested
    /// with an empty prefix. This is the only construction failure.
    pub fn with_persistence(
        policy: PersistencePolicy,
        prefix: &str,
        backend: Option<Arc<dyn StorageBackend>>,
    ) -> Result<Self, ConfigError> {
        if policy == PersistencePolicy::None {
            return Ok(Self::new());
        }
        if prefix.trim().is_empty() {
            return Err(ConfigError::MissingPrefix { policy });
        }

        let backend = backend.unwrap_or_else(|| match policy {
            PersistencePolicy::Session => Arc::new(MemoryStorage::session()),
            _ => Arc::new(FileStorage::in_cache_dir()),
        });
        let persistence = Persistence {
            backend,
            key: format!("{prefix}-{SNAPSHOT_SUFFIX}"),
        };

        let entries = DashMap::new();
        if let Some(raw) = persistence.backend.get(&persistence.key) {
            match serde_json::from_str::<BTreeMap<String, V>>(&raw) {
                Ok(snapshot) => {
                    for (key, value) in snapshot {
                        entries.insert(key, value);
                    }
                }
                Err(e) => {
                    warn!(key = %persistence.key, error = %e, "discarding corrupt cache snapshot");
                }
            }
        }

        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Ok(Self {
            entries: Arc::new(entries),
            update_tx,
            persistence: Some(persistence),
        })
    }

    /// Returns the latest committed value for `key`, if any.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Commits `value` for `key`, replacing any prior value.
    ///
    /// The commit is visible to all readers immediately, the changed key is
    /// broadcast to subscribers, and the snapshot is re-synced when
    /// persistence is enabled.
    pub fn update(&self, key: &str, value: V) {
        self.entries.insert(key.to_owned(), value);
        debug!(key, "cache updated");

        // No receivers is fine; subscriptions come and go.
        let _ = self.update_tx.send(key.to_owned());

        self.sync_snapshot();
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no entries are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Subscribes to commit notifications, one changed key per commit.
    pub(crate) fn subscribe_updates(&self) -> broadcast::Receiver<String> {
        self.update_tx.subscribe()
    }

    /// Re-serializes the full mapping to the backend. Best-effort: failures
    /// are logged and never interrupt the triggering update.
    fn sync_snapshot(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };

        let snapshot: BTreeMap<String, V> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        match serde_json::to_string(&snapshot) {
            Ok(raw) => {
                if let Err(e) = persistence.backend.set(&persistence.key, &raw) {
                    warn!(key = %persistence.key, error = %e, "cache snapshot write failed");
                }
            }
            Err(e) => {
                warn!(key = %persistence.key, error = %e, "cache snapshot serialization failed");
            }
        }
    }
}

impl<V> Default for CacheStore<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
