use thiserror::Error;

/// Application-wide error types for pagewatch.
#[derive(Error, Debug)]
pub enum AppError {
    /// Raw markup could not be interpreted as a page timeline
    /// (login wall, empty document, unexpected layout).
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// Database operation failed (lookup or write during reconciliation,
    /// session bookkeeping, registry access).
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Programming error in session accounting: finalizing an unknown
    /// handle or one that already reached a terminal state.
    #[error("Session misuse: {0}")]
    SessionMisuse(String),

    /// HTTP request failed (fetching a page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Headless-browser automation failed.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Invalid or missing configuration.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and a later crawl cycle is
    /// likely to succeed. Scheduling-layer concern only; nothing in the
    /// core retries within a session.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::BrowserError(_) => true,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::NetworkError("reset".into()).is_retryable());
        assert!(AppError::Timeout(30).is_retryable());
        assert!(AppError::BrowserError("tab crashed".into()).is_retryable());
        assert!(!AppError::ExtractionError("login wall".into()).is_retryable());
        assert!(!AppError::SessionMisuse("double finalize".into()).is_retryable());
    }
}
