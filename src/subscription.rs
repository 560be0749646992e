//! The public read surface of one subscribed route.
//!
//! A [`FetchSubscription`] combines the shared cache's last value for its
//! route with its own controller's lifecycle state. Data always comes from
//! the cache (falling back to the resolved initial value), so sibling
//! subscriptions to the same route converge on one value no matter which
//! controller wrote it last.

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use crate::cache::CacheStore;
use crate::controller::{FetchController, LifecycleState};

/// One consistent read of a subscription's loading/error/data triple.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSnapshot<V> {
    /// The cached value for the route, or the resolved initial value.
    pub data: V,
    /// Whether a dispatch is in flight.
    pub is_loading: bool,
    /// Whether the latest dispatch settled with an error.
    pub has_error: bool,
}

/// A live subscription to a route.
///
/// Created by [`FetchProvider::subscribe`]. Dropping the subscription tears
/// the controller down: completions of in-flight dispatches become no-ops and
/// the cache is never written on its behalf again.
///
/// [`FetchProvider::subscribe`]: crate::provider::FetchProvider::subscribe
pub struct FetchSubscription<V> {
    controller: FetchController<V>,
    cache: CacheStore<V>,
    initial_value: V,
}

impl<V> FetchSubscription<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub(crate) fn new(
        controller: FetchController<V>,
        cache: CacheStore<V>,
        initial_value: V,
    ) -> Self {
        Self {
            controller,
            cache,
            initial_value,
        }
    }

    /// The latest cached value for the route, falling back to the resolved
    /// initial value while the cache is cold.
    #[must_use]
    pub fn data(&self) -> V {
        self.cache
            .read(&self.controller.route())
            .unwrap_or_else(|| self.initial_value.clone())
    }

    /// Returns `true` while a dispatch is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.controller.state().is_loading()
    }

    /// Returns `true` when the latest dispatch settled with an error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.controller.state().is_error()
    }

    /// The controller's current lifecycle state, for diagnostics.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.controller.state()
    }

    /// One consistent read of the whole triple.
    #[must_use]
    pub fn snapshot(&self) -> FetchSnapshot<V> {
        let state = self.controller.state();
        FetchSnapshot {
            data: self.data(),
            is_loading: state.is_loading(),
            has_error: state.is_error(),
        }
    }

    /// Forces a new dispatch for the current route. Duplicate calls before
    /// the triggered fetch settles coalesce into one dispatch.
    pub fn refresh(&self) {
        self.controller.refresh();
    }

    /// Replaces the dependency vector gating the controller.
    pub fn set_dependencies(&self, dependencies: &[bool]) {
        self.controller.set_dependencies(dependencies);
    }

    /// Points the subscription at a new route, restarting the lifecycle.
    pub fn set_route(&self, route: impl Into<String>) {
        self.controller.set_route(route.into());
    }

    /// Stream of snapshots: one per controller state transition and one per
    /// cache commit for the current route, including commits made by sibling
    /// subscriptions.
    ///
    /// The stream holds its own handles, so it can be consumed by a task that
    /// outlives this value.
    pub fn changes(&self) -> BoxStream<'static, FetchSnapshot<V>> {
        let controller = self.controller.clone();
        let cache = self.cache.clone();
        let initial_value = self.initial_value.clone();

        let states = WatchStream::from_changes(self.controller.watch_state()).map(|_| ());

        let route_filter = self.controller.clone();
        let commits = BroadcastStream::new(self.cache.subscribe_updates())
            .filter_map(|changed| async move { changed.ok() })
            .filter(move |key| {
                let matches = *key == route_filter.route();
                async move { matches }
            })
            .map(|_| ());

        stream::select(states, commits)
            .map(move |()| {
                let state = controller.state();
                FetchSnapshot {
                    data: cache
                        .read(&controller.route())
                        .unwrap_or_else(|| initial_value.clone()),
                    is_loading: state.is_loading(),
                    has_error: state.is_error(),
                }
            })
            .boxed()
    }
}

impl<V> Drop for FetchSubscription<V> {
    fn drop(&mut self) {
        self.controller.cancel();
    }
}
