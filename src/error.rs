//! Error types for blogger-export
//!
//! This module provides the crate-wide error type, including:
//! - User-correctable input errors (malformed blog URLs, missing feed target)
//! - Feed errors (non-success HTTP status, empty blogs, malformed timestamps)
//! - Machine-readable error codes for callers that map failures to UI states

use thiserror::Error;

/// Result type alias for blogger-export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for blogger-export
///
/// Every fallible operation in the library returns this type. The exporter
/// converts it into a session state plus a status message, so callers of
/// [`Exporter::start`](crate::Exporter::start) never see it directly.
#[derive(Debug, Error)]
pub enum Error {
    /// The text entered by the user is not a Blogger blog URL
    #[error("{message}")]
    InvalidUrl {
        /// User-facing message suggesting the expected format
        message: String,
        /// The (trimmed) input that was rejected
        input: String,
    },

    /// A run was started before a feed target was set
    #[error("no feed URL")]
    MissingFeedUrl,

    /// The feed answered a page request with a non-success HTTP status
    #[error("feed request failed with HTTP {status}: {url}")]
    Fetch {
        /// HTTP status code returned by the feed
        status: u16,
        /// The page URL that was requested
        url: String,
    },

    /// The feed contained no posts at all
    #[error("no posts found")]
    EmptyResult,

    /// The run was cancelled by the caller
    #[error("cancelled by user")]
    Cancelled,

    /// A post carried a publication timestamp that could not be parsed
    #[error("invalid publication timestamp '{value}' on post '{title}'")]
    InvalidTimestamp {
        /// The raw timestamp text
        value: String,
        /// Title of the offending post
        title: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "feed.page_size")
        key: Option<String>,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error (feed JSON, config files, summaries)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// XML document could not be written
    #[error("document error: {0}")]
    Document(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidUrl { .. } => "invalid_url",
            Error::MissingFeedUrl => "missing_feed_url",
            Error::Fetch { .. } => "fetch_error",
            Error::EmptyResult => "empty_result",
            Error::Cancelled => "cancelled",
            Error::InvalidTimestamp { .. } => "invalid_timestamp",
            Error::Config { .. } => "config_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Document(_) => "document_error",
            Error::Io(_) => "io_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Whether this error represents a user-initiated cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
