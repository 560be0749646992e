//! The per-subscription fetch lifecycle controller.
//!
//! One controller exists per active subscription. It owns the
//! `Idle → Loading → Success | Failed` state machine, gates dispatches on the
//! dependency vector, and tags every dispatch with a generation so that a
//! slow, superseded request can never overwrite a newer result or touch the
//! cache after the subscriber lost interest.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::CacheStore;
use crate::options::FetchOptions;

/// The lifecycle of one subscription's fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Dependencies are not satisfied; nothing is in flight.
    #[default]
    Idle,
    /// A dispatch is in flight.
    Loading,
    /// The latest dispatch settled successfully and its value was committed.
    Success,
    /// The latest dispatch settled with an error; the cache was not touched.
    Failed(String),
}

impl LifecycleState {
    /// Returns `true` while a dispatch is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Returns `true` when the latest dispatch settled with an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns `true` once a dispatch has settled, successfully or not.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Success | Self::Failed(_))
    }
}

/// Drives the fetch state machine for one subscription.
///
/// Every dispatch carries a monotonically increasing generation. A completion
/// may commit its result (state transition plus cache write) only while its
/// generation is still current and the controller has not been torn down;
/// anything else is discarded. This substitutes for transport-level
/// cancellation, which the fetcher may not support.
pub(crate) struct FetchController<V> {
    inner: Arc<Mutex<Inner>>,
    state_tx: watch::Sender<LifecycleState>,
    cache: CacheStore<V>,
    options: FetchOptions<V>,
    cancel: CancellationToken,
}

struct Inner {
    route: String,
    generation: u64,
    deps_ready: bool,
    refresh_pending: bool,
}

impl<V: Clone> Clone for FetchController<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            state_tx: self.state_tx.clone(),
            cache: self.cache.clone(),
            options: self.options.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<V> FetchController<V> {
    /// Current lifecycle state.
    pub(crate) fn state(&self) -> LifecycleState {
        self.state_tx.borrow().clone()
    }

    /// Watch channel for state transitions.
    pub(crate) fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// The route this controller currently fetches.
    pub(crate) fn route(&self) -> String {
        self.lock().route.clone()
    }

    /// Tears the controller down: every pending completion becomes a no-op.
    /// The underlying fetch is not aborted, only its effects.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("controller state poisoned")
    }
}

impl<V> FetchController<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates the controller and dispatches immediately when the dependency
    /// vector is already satisfied.
    pub(crate) fn new(route: String, options: FetchOptions<V>, cache: CacheStore<V>) -> Self {
        let deps_ready = options.dependencies.iter().all(|ready| *ready);
        let (state_tx, _) = watch::channel(LifecycleState::Idle);

        let controller = Self {
            inner: Arc::new(Mutex::new(Inner {
                route,
                generation: 0,
                deps_ready,
                refresh_pending: false,
            })),
            state_tx,
            cache,
            options,
            cancel: CancellationToken::new(),
        };

        if deps_ready {
            controller.dispatch();
        }
        controller
    }

    /// Forces a new dispatch for the current route.
    ///
    /// Calls made while a refresh-initiated dispatch is still in flight
    /// coalesce into that dispatch: N calls before settlement produce exactly
    /// one additional dispatch. Gated controllers ignore the trigger.
    pub(crate) fn refresh(&self) {
        {
            let mut inner = self.lock();
            if !inner.deps_ready || inner.refresh_pending {
                return;
            }
            inner.refresh_pending = true;
        }
        self.dispatch();
    }

    /// Replaces the dependency vector and re-evaluates gating.
    ///
    /// Gaining a false entry forces `Idle` from any state and suppresses
    /// whatever is still in flight; a transition to all-true dispatches.
    pub(crate) fn set_dependencies(&self, dependencies: &[bool]) {
        let ready = dependencies.iter().all(|ready| *ready);
        let became_ready = {
            let mut inner = self.lock();
            let was_ready = inner.deps_ready;
            inner.deps_ready = ready;
            if !ready {
                inner.generation += 1;
                inner.refresh_pending = false;
            }
            ready && !was_ready
        };

        if !ready {
            self.state_tx.send_replace(LifecycleState::Idle);
        } else if became_ready {
            self.dispatch();
        }
    }

    /// Points the controller at a new route, restarting the lifecycle under
    /// the same gating rules. Results still in flight for the old route are
    /// suppressed.
    pub(crate) fn set_route(&self, route: String) {
        let ready = {
            let mut inner = self.lock();
            if inner.route == route {
                return;
            }
            inner.route = route;
            inner.generation += 1;
            inner.refresh_pending = false;
            inner.deps_ready
        };

        if ready {
            self.dispatch();
        } else {
            self.state_tx.send_replace(LifecycleState::Idle);
        }
    }

    /// Starts a new generation and spawns the fetch for it.
    ///
    /// Gating is re-checked under the lock: a dependency that turned false
    /// between the caller's check and this critical section must not produce
    /// a dispatch.
    fn dispatch(&self) {
        let Some((generation, route)) = ({
            let mut inner = self.lock();
            if inner.deps_ready {
                inner.generation += 1;
                Some((inner.generation, inner.route.clone()))
            } else {
                None
            }
        }) else {
            return;
        };
        self.state_tx.send_replace(LifecycleState::Loading);
        debug!(route = %route, generation, "dispatching fetch");

        let fetch = (self.options.fetcher)(&route, &self.options.headers);
        let inner = Arc::clone(&self.inner);
        let state_tx = self.state_tx.clone();
        let cache = self.cache.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                () = cancel.cancelled() => return,
                result = fetch => result,
            };

            let mut guard = inner.lock().expect("controller state poisoned");
            if cancel.is_cancelled() || guard.generation != generation {
                debug!(route = %route, generation, "discarding stale fetch result");
                return;
            }
            guard.refresh_pending = false;
            drop(guard);

            match result {
                Ok(value) => {
                    cache.update(&route, value);
                    state_tx.send_replace(LifecycleState::Success);
                }
                Err(e) => {
                    debug!(route = %route, generation, error = %e, "fetch settled with error");
                    state_tx.send_replace(LifecycleState::Failed(e.to_string()));
                }
            }
        });
    }
}
