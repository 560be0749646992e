//! The pluggable fetch capability and the built-in HTTP implementation.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::error::FetchError;
use crate::options::HeaderSet;

/// The fetch capability: `(route, headers)` to an asynchronous value.
///
/// Fetchers are supplied through the options layers and shared by reference,
/// so the same fetcher instance can serve every subscription of a provider.
pub type Fetcher<V> =
    Arc<dyn Fn(&str, &HeaderSet) -> BoxFuture<'static, Result<V, FetchError>> + Send + Sync>;

/// Wraps an async closure as a [`Fetcher`].
///
/// # Example
///
/// ```rust
/// use refetch::fetcher::fetcher_fn;
/// use refetch::error::FetchError;
///
/// let fetcher = fetcher_fn(|route, _headers| async move {
///     Ok::<_, FetchError>(format!("fetched {route}"))
/// });
/// ```
pub fn fetcher_fn<V, F, Fut>(f: F) -> Fetcher<V>
where
    F: Fn(String, HeaderSet) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
{
    Arc::new(move |route, headers| Box::pin(f(route.to_owned(), headers.clone())))
}

/// The built-in fetcher: GET the route with the resolved headers and parse
/// the JSON body.
///
/// Non-success statuses become [`FetchError::Response`] carrying the server
/// body when one is present, otherwise the canonical status reason. Transport
/// failures become [`FetchError::Network`].
pub fn default_fetcher<V>() -> Fetcher<V>
where
    V: DeserializeOwned + Send + 'static,
{
    Arc::new(|route, headers| {
        let route = route.to_owned();
        let headers = headers.clone();

        Box::pin(async move {
            let client = reqwest::Client::new();
            let mut request = client.get(&route);
            for (name, value) in &headers {
                request = request.header(name, value);
            }

            let response = request
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = if body.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_owned()
                } else {
                    body
                };
                return Err(FetchError::Response(message));
            }

            response
                .json()
                .await
                .map_err(|e| FetchError::Response(e.to_string()))
        })
    })
}
