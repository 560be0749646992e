//! The provider: owner of the shared cache and the global options layer.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::CacheStore;
use crate::controller::FetchController;
use crate::error::ConfigError;
use crate::options::{FetchOptions, OptionsPatch};
use crate::storage::{PersistencePolicy, StorageBackend};
use crate::subscription::FetchSubscription;

/// Owns the shared cache and global configuration; the entry point for
/// subscriptions.
///
/// One provider per logical scope. Independent providers share nothing, so
/// tests can build as many as they like without interference. The global
/// options layer is merged over the built-in defaults once, at construction;
/// `subscribe` only layers per-call overrides on top.
///
/// # Example
///
/// ```rust,no_run
/// use refetch::prelude::*;
/// use serde_json::Value;
///
/// # async fn run() {
/// let provider: FetchProvider<Value> = FetchProvider::new();
/// let todos = provider.subscribe("https://example.com/api/todos", None);
///
/// assert!(todos.is_loading());
/// // drive your UI from `todos.snapshot()` or `todos.changes()`
/// # }
/// ```
pub struct FetchProvider<V> {
    cache: CacheStore<V>,
    global: FetchOptions<V>,
}

impl<V> FetchProvider<V>
where
    V: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// A provider with built-in defaults and no persistence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: CacheStore::new(),
            global: FetchOptions::defaults(),
        }
    }

    /// Starts building a provider with global options and persistence.
    #[must_use]
    pub fn builder() -> FetchProviderBuilder<V> {
        FetchProviderBuilder::new()
    }

    /// Subscribes to a route, resolving options and starting the fetch
    /// lifecycle.
    ///
    /// When the resolved dependency vector is already satisfied, the first
    /// dispatch happens before this call returns, even when the cache holds a
    /// value for the route: a fresh subscription always revalidates, serving
    /// the warm value while it loads.
    ///
    /// Must be called within a tokio runtime; dispatched fetches run as
    /// spawned tasks.
    pub fn subscribe(
        &self,
        route: impl Into<String>,
        local: Option<OptionsPatch<V>>,
    ) -> FetchSubscription<V> {
        let options = FetchOptions::resolve(self.global.clone(), None, local.as_ref());
        let initial_value = options.initial_value.clone();
        let controller = FetchController::new(route.into(), options, self.cache.clone());
        FetchSubscription::new(controller, self.cache.clone(), initial_value)
    }

    /// The shared cache store.
    ///
    /// Exposed so callers can read warm values or seed entries through
    /// [`CacheStore::update`], the single mutation operation.
    #[must_use]
    pub fn cache(&self) -> &CacheStore<V> {
        &self.cache
    }
}

impl<V> Default for FetchProvider<V>
where
    V: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`FetchProvider`].
pub struct FetchProviderBuilder<V> {
    global: Option<OptionsPatch<V>>,
    policy: PersistencePolicy,
    prefix: String,
    backend: Option<Arc<dyn StorageBackend>>,
}

impl<V> FetchProviderBuilder<V>
where
    V: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn new() -> Self {
        Self {
            global: None,
            policy: PersistencePolicy::None,
            prefix: String::new(),
            backend: None,
        }
    }

    /// Sets the provider-wide options layer.
    #[must_use]
    pub fn global_options(mut self, options: OptionsPatch<V>) -> Self {
        self.global = Some(options);
        self
    }

    /// Enables snapshot persistence under `{prefix}-cached-fetch`.
    #[must_use]
    pub fn persistence(mut self, policy: PersistencePolicy, prefix: impl Into<String>) -> Self {
        self.policy = policy;
        self.prefix = prefix.into();
        self
    }

    /// Overrides the storage backend chosen by the persistence policy.
    #[must_use]
    pub fn storage(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Builds the provider, loading the persisted snapshot when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingPrefix`] when persistence is enabled
    /// without a prefix. Snapshot load problems are not errors: the cache
    /// starts empty.
    pub fn build(self) -> Result<FetchProvider<V>, ConfigError> {
        let cache = CacheStore::with_persistence(self.policy, &self.prefix, self.backend)?;
        let global = FetchOptions::resolve(FetchOptions::defaults(), self.global.as_ref(), None);
        Ok(FetchProvider { cache, global })
    }
}
