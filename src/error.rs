use thiserror::Error;

use crate::storage::PersistencePolicy;

/// Error type for fetch operations.
///
/// Fetcher errors are caught at the controller boundary and surface only as
/// lifecycle state; they are never propagated to the subscriber.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    /// The transport failed before any response was produced.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("response error: {0}")]
    Response(String),
}

/// Fatal configuration errors, raised synchronously at provider construction.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Persistence was requested without a prefix to key the snapshot under.
    #[error("persistence policy `{policy}` requires a non-empty storage prefix")]
    MissingPrefix {
        /// The policy that was requested.
        policy: PersistencePolicy,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "network error: connection refused");

        let err = FetchError::Response("404 Not Found".to_string());
        assert_eq!(err.to_string(), "response error: 404 Not Found");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingPrefix {
            policy: PersistencePolicy::Local,
        };
        assert_eq!(
            err.to_string(),
            "persistence policy `local` requires a non-empty storage prefix"
        );
    }
}
