use thiserror::Error;

/// Errors surfaced by the fallback search tool.
///
/// Nothing is retried or recovered locally; every failure propagates to the
/// caller unchanged.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Arguments failed validation; no network call was made.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The endpoint answered with a non-success status.
    #[error("search error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The internal deadline elapsed before the request settled.
    #[error("Search request timed out")]
    Timeout,

    /// The caller's cancellation signal fired.
    #[error("search cancelled by caller")]
    Cancelled,

    /// The HTTP exchange itself failed.
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A qualifying event line did not carry valid JSON.
    #[error("malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The first result content item has no `text` field.
    #[error("search result content item has no text")]
    MissingText,
}
