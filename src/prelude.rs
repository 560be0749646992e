//! Prelude module for convenient imports.
//!
//! ```
//! use refetch::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`FetchProvider`] - The cache owner and subscription entry point
//! - [`FetchSubscription`] / [`FetchSnapshot`] - The read surface
//! - [`OptionsPatch`] / [`FetchOptions`] - Configuration layers
//! - [`fetcher_fn`] - Wrapping closures as fetchers
//! - [`PersistencePolicy`] and the storage backends

pub use crate::cache::CacheStore;
pub use crate::controller::LifecycleState;
pub use crate::error::{ConfigError, FetchError};
pub use crate::fetcher::{Fetcher, fetcher_fn};
pub use crate::options::{FetchOptions, HeaderSet, OptionsPatch};
pub use crate::provider::{FetchProvider, FetchProviderBuilder};
pub use crate::storage::{FileStorage, MemoryStorage, PersistencePolicy, StorageBackend};
pub use crate::subscription::{FetchSnapshot, FetchSubscription};
