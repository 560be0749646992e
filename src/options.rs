//! Option layering and resolution.
//!
//! Configuration arrives in up to three layers: built-in defaults, the
//! provider-wide global layer, and per-subscription overrides. [`resolve`]
//! collapses them into a fully populated [`FetchOptions`] so partially
//! specified configuration can never reach the fetch logic.
//!
//! [`resolve`]: FetchOptions::resolve

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::fetcher::{Fetcher, default_fetcher};

/// Request metadata, resolved once per subscription and immutable afterwards.
pub type HeaderSet = BTreeMap<String, String>;

/// Fully populated per-subscription configuration.
#[derive(Clone)]
pub struct FetchOptions<V> {
    /// Headers passed to the fetcher on every dispatch.
    pub headers: HeaderSet,
    /// The fetch capability executed against the route.
    pub fetcher: Fetcher<V>,
    /// Value served while the cache has no entry for the route.
    pub initial_value: V,
    /// Dependency vector gating the controller; empty means always ready.
    pub dependencies: Vec<bool>,
}

/// One optional layer of configuration.
///
/// Layers merge shallowly, field by field: a patch that sets `headers`
/// replaces the lower layers' headers wholesale rather than merging them key
/// by key.
#[derive(Clone)]
pub struct OptionsPatch<V> {
    /// Replacement headers, if set.
    pub headers: Option<HeaderSet>,
    /// Replacement fetcher, if set.
    pub fetcher: Option<Fetcher<V>>,
    /// Replacement initial value, if set.
    pub initial_value: Option<V>,
    /// Replacement dependency vector, if set.
    pub dependencies: Option<Vec<bool>>,
}

impl<V> Default for OptionsPatch<V> {
    fn default() -> Self {
        Self {
            headers: None,
            fetcher: None,
            initial_value: None,
            dependencies: None,
        }
    }
}

impl<V> OptionsPatch<V> {
    /// Creates an empty patch that overrides nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the headers for this layer.
    #[must_use]
    pub fn headers(mut self, headers: HeaderSet) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Sets the fetcher for this layer.
    #[must_use]
    pub fn fetcher(mut self, fetcher: Fetcher<V>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Sets the initial value for this layer.
    #[must_use]
    pub fn initial_value(mut self, value: V) -> Self {
        self.initial_value = Some(value);
        self
    }

    /// Sets the dependency vector for this layer.
    #[must_use]
    pub fn dependencies(mut self, dependencies: Vec<bool>) -> Self {
        self.dependencies = Some(dependencies);
        self
    }
}

impl<V> FetchOptions<V>
where
    V: Default + DeserializeOwned + Send + 'static,
{
    /// The built-in defaults: GET/JSON fetcher, no headers, `V::default()`
    /// initial value, empty dependency vector.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            headers: HeaderSet::new(),
            fetcher: default_fetcher(),
            initial_value: V::default(),
            dependencies: Vec::new(),
        }
    }
}

impl<V: Clone> FetchOptions<V> {
    /// Merges option layers into a fully populated configuration.
    ///
    /// Merge order is `local` over `global` over `defaults`, field by field.
    /// Pure and deterministic: the same inputs always produce the same
    /// resolved options. Resolution runs once per subscription; a changed
    /// layer means a new subscription, never a mutated one.
    #[must_use]
    pub fn resolve(
        defaults: Self,
        global: Option<&OptionsPatch<V>>,
        local: Option<&OptionsPatch<V>>,
    ) -> Self {
        let mut resolved = defaults;
        for patch in [global, local].into_iter().flatten() {
            if let Some(headers) = &patch.headers {
                resolved.headers = headers.clone();
            }
            if let Some(fetcher) = &patch.fetcher {
                resolved.fetcher = fetcher.clone();
            }
            if let Some(value) = &patch.initial_value {
                resolved.initial_value = value.clone();
            }
            if let Some(dependencies) = &patch.dependencies {
                resolved.dependencies = dependencies.clone();
            }
        }
        resolved
    }
}
