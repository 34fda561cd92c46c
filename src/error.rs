use thiserror::Error;

/// Errors that can occur while fetching, classifying, normalizing, and
/// merging a single feed.
///
/// One feed's failure never aborts a refresh batch; the orchestrator records
/// the error in the run's outcome tally and the remaining feeds proceed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("request failed: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the size limit
    #[error("response too large")]
    ResponseTooLarge,
    /// Payload is neither recognizably HTML nor a feed document
    #[error("unrecognized content type")]
    UnknownContentType,
    /// Malformed feed document
    #[error("feed parse failed: {0}")]
    Parse(String),
    /// No feed link found on an HTML page, or the discovered link was not a feed
    #[error("feed discovery failed: {0}")]
    Discovery(String),
    /// Attempt exceeded its time budget
    #[error("attempt timed out")]
    Timeout,
    /// Store read or save failed; saves are always paired with rollback
    #[error("store operation failed: {0}")]
    MergeConflict(String),
}
