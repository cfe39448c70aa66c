//! Error types for directory operations.
//!
//! Every fallible operation of the directory client reports one of these variants instead of
//! terminating the host process. "Not found" and "ambiguous" outcomes have their own variants so
//! callers can tell them apart from transport failures.

use thiserror::Error;

/// Main error type for directory operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Dialing the directory server failed or the session broke
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The server rejected the supplied credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// A search request failed
    #[error("Search failed: {0}")]
    SearchError(String),

    /// A distinguished name could not be parsed or formatted
    #[error("Malformed distinguished name: {0}")]
    MalformedDn(String),

    /// No entry matched a lookup that expected exactly one
    #[error("Not found: {0}")]
    NotFound(String),

    /// Several entries matched a lookup that expected exactly one
    #[error("Ambiguous result for {query}: {count} entries matched")]
    Ambiguous {
        /// Value that was looked up
        query: String,
        /// Number of matching entries
        count: usize,
    },

    /// An operation was attempted before `connect`
    #[error("Not connected to the directory server")]
    NotConnected,

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Specialized result type for directory operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConnectionError(_) => "CONNECTION_ERROR",
            Self::AuthenticationError(_) => "AUTHENTICATION_ERROR",
            Self::SearchError(_) => "SEARCH_ERROR",
            Self::MalformedDn(_) => "MALFORMED_DN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Ambiguous { .. } => "AMBIGUOUS",
            Self::NotConnected => "NOT_CONNECTED",
            Self::Timeout(_) => "TIMEOUT",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError(_)
                | Self::SearchError(_)
                | Self::Timeout(_)
                | Self::ConfigError(_)
        )
    }
}

// Conversions from external error types
impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(format!("invalid server URL: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
