//! Error types for mspscout.
//!
//! Library crates use [`MspScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all mspscout operations.
#[derive(Debug, thiserror::Error)]
pub enum MspScoutError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Search API failure (network, quota, malformed response).
    /// Carries the query so per-row failures stay attributable.
    #[error("search error for query {query:?}: {message}")]
    Search { query: String, message: String },

    /// Text-generation API failure during summarization.
    #[error("summarize error: {0}")]
    Summarize(String),

    /// A cache entry could not be read (corrupt JSON, IO failure).
    /// Callers treat this as a cache miss, never as fatal.
    #[error("cache read error: {0}")]
    CacheRead(String),

    /// Database or table-load error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing column, bad identifier, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MspScoutError>;

impl MspScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a search error for a specific query.
    pub fn search(query: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Search {
            query: query.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = MspScoutError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = MspScoutError::search("\"Acme\" managed services", "HTTP 429");
        assert!(err.to_string().contains("Acme"));
        assert!(err.to_string().contains("HTTP 429"));
    }

    #[test]
    fn cache_read_is_distinct_from_storage() {
        let err = MspScoutError::CacheRead("truncated file".into());
        assert!(err.to_string().starts_with("cache read error"));
    }
}
