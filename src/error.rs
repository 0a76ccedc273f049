//! Error taxonomy shared by every layer of the news pipeline.
//!
//! Scrapers and transports return [`NewsError`] so callers can match on the
//! kind of failure instead of inspecting messages. The dispatch layer is the
//! only place that turns these into user-facing text.
//!
//! | Variant | Raised by | Retried |
//! |---------|-----------|---------|
//! | [`NewsError::Network`] | HTTP transport (connection, body read) | yes |
//! | [`NewsError::Timeout`] | HTTP transport, browser navigation | yes |
//! | [`NewsError::Api`] | HTTP transport (non-2xx, bad JSON shape) | no |
//! | [`NewsError::Scraping`] | browser transport, list/detail parsing | no |
//! | [`NewsError::Validation`] / [`NewsError::InvalidUrl`] | record construction | no |
//! | [`NewsError::Format`] | timestamp parsing | no |
//! | [`NewsError::UnsupportedGame`] | registry lookup | no |
//! | [`NewsError::ContentNotFound`] | detail lookups | no |
//! | [`NewsError::SessionClosed`] | transports after teardown | no |

use std::time::Duration;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = NewsError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum NewsError {
    /// Connection-level failure (DNS, refused connection, reset, body read).
    #[error("network error: {url}: {message}")]
    Network { url: String, message: String },

    /// The operation exceeded its configured deadline.
    #[error("request timed out after {timeout:?}: {url}")]
    Timeout { url: String, timeout: Duration },

    /// Upstream answered, but with a non-success status or an unexpected shape.
    #[error("API error from {endpoint}{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Api {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// Rendering or DOM extraction failed.
    #[error("scraping error: {0}")]
    Scraping(String),

    /// Malformed domain data (missing field, empty title, future timestamp).
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A timestamp or date string could not be parsed.
    #[error("unsupported date format: {0}")]
    Format(String),

    #[error("unsupported game: {0}")]
    UnsupportedGame(String),

    #[error("content not found: {0}")]
    ContentNotFound(String),

    /// The transport was torn down and has not been re-initialised.
    #[error("session closed for {0}")]
    SessionClosed(String),
}

impl NewsError {
    /// Only connection failures and timeouts are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NewsError::Network { .. } | NewsError::Timeout { .. })
    }

    /// Short machine-readable name of the variant, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            NewsError::Network { .. } => "network",
            NewsError::Timeout { .. } => "timeout",
            NewsError::Api { .. } => "api",
            NewsError::Scraping(_) => "scraping",
            NewsError::Validation(_) => "validation",
            NewsError::InvalidUrl(_) => "invalid_url",
            NewsError::Format(_) => "format",
            NewsError::UnsupportedGame(_) => "unsupported_game",
            NewsError::ContentNotFound(_) => "content_not_found",
            NewsError::SessionClosed(_) => "session_closed",
        }
    }
}
