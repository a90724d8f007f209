//! Typed errors for the emissions pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! The pipeline surfaces exactly six terminal outcomes via [`TrackerError`];
//! everything recoverable (a single fetch attempt, one chunk's model call)
//! is retried or skipped inside the stage and never reaches the caller.

use thiserror::Error;

/// Terminal outcomes of a pipeline run.
///
/// The boundary layer (web/CLI) maps each variant to a stable user-facing
/// message; provider detail stays in the `#[source]` chain and logs.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// No candidate report cleared the relevance threshold.
    #[error("no sustainability report found for: {company}")]
    NotFound { company: String },

    /// Search or model provider persistently failing.
    #[error("upstream provider unavailable: {0}")]
    UpstreamUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Document unreachable after retries and all fallback URLs.
    #[error("failed to fetch report: {url}")]
    FetchFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Content type we do not handle (neither PDF nor HTML).
    #[error("unsupported document format: {content_type}")]
    UnsupportedFormat { content_type: String },

    /// Model could not be made to return parseable output for any chunk.
    #[error("extraction produced no parseable output")]
    ExtractionFailed,

    /// Document fetched and parsed, but no usable emissions values found.
    #[error("no emissions data found in report")]
    NoDataFound,

    /// Writing the run artifact failed.
    #[error("artifact write failed: {0}")]
    Artifact(#[from] std::io::Error),
}

/// Errors from the search provider.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Provider rate limit hit (retryable).
    #[error("search provider rate limited")]
    RateLimited,

    /// HTTP transport failure.
    #[error("search HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Provider returned an error payload.
    #[error("search provider error: {0}")]
    Provider(String),
}

impl SearchError {
    /// Whether a retry with backoff could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Http(_))
    }
}

/// Errors while fetching and converting a document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP transport failure (retryable).
    #[error("fetch HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-success HTTP status.
    #[error("HTTP {status} fetching: {url}")]
    Status { status: u16, url: String },

    /// Request timed out (retryable).
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Invalid URL.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Content type we do not handle.
    #[error("unsupported content type: {content_type}")]
    UnsupportedFormat { content_type: String },

    /// PDF parsing failed.
    #[error("PDF parse error: {0}")]
    Pdf(String),

    /// Document yielded no text at all (e.g. fully scanned pages).
    #[error("document contains no extractable text: {url}")]
    EmptyDocument { url: String },
}

impl FetchError {
    /// Whether a retry of the same URL could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors from the language-model service.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Model rate limit hit (retryable).
    #[error("model rate limited")]
    RateLimited,

    /// HTTP transport failure (retryable).
    #[error("model HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request timed out (retryable).
    #[error("model request timed out")]
    Timeout,

    /// Response did not match the expected output schema.
    #[error("model response failed schema parse: {0}")]
    Schema(#[source] serde_json::Error),

    /// Response carried no content at all.
    #[error("empty model response")]
    Empty,

    /// Service returned an error payload.
    #[error("model service error: {0}")]
    Service(String),

    /// Configuration problem (missing API key, bad base URL).
    #[error("model config error: {0}")]
    Config(String),
}

impl ModelError {
    /// Whether a retry with backoff could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Http(_) | Self::Timeout)
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Result type alias for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for model operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_retryable_statuses() {
        let rate_limited = FetchError::Status {
            status: 429,
            url: "https://example.com".into(),
        };
        let server_error = FetchError::Status {
            status: 503,
            url: "https://example.com".into(),
        };
        let not_found = FetchError::Status {
            status: 404,
            url: "https://example.com".into(),
        };

        assert!(rate_limited.is_retryable());
        assert!(server_error.is_retryable());
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn test_model_schema_not_retryable() {
        let err = ModelError::Schema(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
        assert!(!err.is_retryable());
        assert!(ModelError::RateLimited.is_retryable());
    }

    #[test]
    fn test_not_found_distinct_from_fetch_failed() {
        let not_found = TrackerError::NotFound {
            company: "Acme Corp".into(),
        };
        let fetch_failed = TrackerError::FetchFailed {
            url: "https://acme.com/esg.pdf".into(),
            source: "connection refused".into(),
        };

        assert!(matches!(not_found, TrackerError::NotFound { .. }));
        assert!(matches!(fetch_failed, TrackerError::FetchFailed { .. }));
    }
}
