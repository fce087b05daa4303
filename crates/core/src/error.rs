//! Errors raised by the external service clients.

use std::sync::Arc;

use thiserror::Error;

/// Failure talking to the cabinet, the leaderboard or the catalog.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// Transport-level failure.
    #[error("request to {url} failed: {source}")]
    Http {
        /// Requested URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status.
    #[error("{url} returned {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status.
        status: reqwest::StatusCode,
    },

    /// Body did not match the expected shape.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Failure of a fetch shared between several callers.
    #[error(transparent)]
    Shared(Arc<ClientError>),
}
