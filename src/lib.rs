//! # Refetch - Shared-Cache Data Fetching
//!
//! Refetch lets a consumer declare "I need the data at this route" and
//! receive a loading/error/data triple that stays consistent across
//! re-subscriptions and sibling subscribers to the same route, similar to
//! SWR or TanStack Query.
//!
//! ## Architecture
//!
//! - [`FetchProvider`](provider::FetchProvider): owns the shared cache and
//!   the global options layer; one per logical scope
//! - [`CacheStore`](cache::CacheStore): route key to last successful value,
//!   last-writer-wins, optionally persisted as a snapshot
//! - Lifecycle controller (internal): one per subscription, drives
//!   `Idle → Loading → Success | Failed` with dependency gating and
//!   generation-tagged stale-result suppression
//! - [`FetchSubscription`](subscription::FetchSubscription): the public read
//!   surface combining the cache value with the controller state
//!
//! ## Example
//!
//! ```rust,no_run
//! use refetch::prelude::*;
//! use serde_json::{Value, json};
//!
//! # async fn run() -> Result<(), ConfigError> {
//! let provider: FetchProvider<Value> = FetchProvider::builder()
//!     .global_options(OptionsPatch::new().initial_value(json!([])))
//!     .persistence(PersistencePolicy::Local, "myapp")
//!     .build()?;
//!
//! let todos = provider.subscribe("https://example.com/api/todos", None);
//! assert!(todos.is_loading());
//!
//! // A second subscriber to the same route converges on the same value.
//! let sidebar = provider.subscribe("https://example.com/api/todos", None);
//! let _ = sidebar.data();
//!
//! todos.refresh();
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! Fetches run as spawned tokio tasks and may settle in any order. Per
//! subscription, only the result of the latest dispatch generation may commit
//! to state or cache; superseded and torn-down completions are discarded.
//! This stands in for transport-level cancellation, which is out of scope.

pub mod cache;
mod controller;
pub mod error;
pub mod fetcher;
pub mod options;
pub mod prelude;
pub mod provider;
pub mod storage;
pub mod subscription;

pub use controller::LifecycleState;
pub use error::{ConfigError, FetchError};
pub use provider::{FetchProvider, FetchProviderBuilder};
pub use subscription::{FetchSnapshot, FetchSubscription};
