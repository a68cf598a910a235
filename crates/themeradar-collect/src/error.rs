use themeradar_core::SourceId;
use thiserror::Error;

/// Errors produced while collecting from an external source.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP 429; the remote API has asked us to back off.
    #[error("rate limited by {source} (retry after {retry_after_secs}s)")]
    RateLimited {
        source: SourceId,
        retry_after_secs: u64,
    },

    /// HTTP 401/403; credential is wrong or revoked. Never retried.
    #[error("unauthorized by {source} (HTTP {status})")]
    Unauthorized { source: SourceId, status: u16 },

    /// Any other non-2xx status.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// No credential configured for the source. The collector is disabled
    /// for the run instead of failing the whole run.
    #[error("no credential configured for source {source}")]
    MissingCredential { source: SourceId },

    /// The bounded retry loop gave up.
    #[error("retries exhausted for {source} after {attempts} attempts")]
    RetryExhausted { source: SourceId, attempts: u32 },

    /// The caller's deadline or cancellation signal fired.
    #[error("collection cancelled")]
    Cancelled,
}
