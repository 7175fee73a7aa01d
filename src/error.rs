//! Error types for ReadHub Core
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are categorized by where they originate (transport, response shape,
//! input validation, server-reported business errors, local storage).
//!
//! ## Taxonomy
//!
//! - `TransportError` - the request never produced a usable response
//!   (`Timeout`, `NetworkFailure`) or produced a non-2xx status (`HttpStatus`)
//! - `DataIntegrity` - a response arrived but its shape was unexpected
//! - `Validation` - input rejected before dispatch (search modes treat this as idle)
//! - `Api` - a server-reported business error, passed through verbatim
//!
//! `CatalogError` is `Clone` because a single coalesced network call may need to
//! hand the same failure to several waiters. Foreign errors are converted into
//! message-carrying variants rather than wrapped.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using our CatalogError type
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Generic message used when the server gave us nothing better
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Generic description used when the server gave us nothing better
pub const GENERIC_ERROR_DESCRIPTION: &str = "Please try again later";

/// Server-reported business error body
///
/// The backend reports failures as `{statusCode, timestamp, message, description}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub status_code: u16,
    pub timestamp: String,
    pub message: String,
    pub description: String,
}

impl ApiError {
    /// Build an error body from a raw response.
    ///
    /// A body that already carries the server's error shape is passed through
    /// verbatim. Anything else is synthesized from the status and a fallback
    /// message.
    pub fn from_body(status: Option<u16>, body: &str, fallback_message: Option<&str>) -> Self {
        if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
            return api_error;
        }

        Self::synthesize(status, fallback_message)
    }

    /// Synthesize an error body with the generic description
    pub fn synthesize(status: Option<u16>, message: Option<&str>) -> Self {
        Self {
            status_code: status.unwrap_or(500),
            timestamp: Utc::now().to_rfc3339(),
            message: message
                .filter(|m| !m.is_empty())
                .unwrap_or(GENERIC_ERROR_MESSAGE)
                .to_string(),
            description: GENERIC_ERROR_DESCRIPTION.to_string(),
        }
    }
}

/// Failure at the transport level
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The fixed request timeout elapsed
    #[error("Request timed out")]
    Timeout,

    /// Connection refused, DNS failure, broken body stream, etc.
    #[error("Network failure: {message}")]
    NetworkFailure { message: String },

    /// Server answered with a non-success status
    #[error("Server responded with status {status}: {}", .api_error.message)]
    HttpStatus {
        status: u16,
        /// Server-provided or synthesized error body
        api_error: ApiError,
    },
}

/// Main error type for ReadHub Core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    // ===== Transport / API Errors =====

    /// Request could not be completed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Server-reported business error outside of an HTTP status failure
    #[error("API error ({}): {}", .0.status_code, .0.message)]
    Api(ApiError),

    /// Resource does not exist on the backend
    #[error("Not found: {0}")]
    NotFound(String),

    // ===== Data Errors =====

    /// Response arrived with an unexpected shape
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Input rejected before dispatch
    #[error("Validation failed: {0}")]
    Validation(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ===== Local Errors =====

    /// Local persistent storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return CatalogError::Transport(TransportError::Timeout);
        }
        if err.is_decode() {
            return CatalogError::DataIntegrity(format!("Failed to decode response: {}", err));
        }
        CatalogError::Transport(TransportError::NetworkFailure {
            message: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        CatalogError::Storage(err.to_string())
    }
}

impl From<url::ParseError> for CatalogError {
    fn from(err: url::ParseError) -> Self {
        CatalogError::InvalidConfiguration(format!("Invalid URL: {}", err))
    }
}

// Helper methods for creating and classifying errors
impl CatalogError {
    /// Create a NotFound error with a resource name
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        CatalogError::NotFound(resource.into())
    }

    /// Create a Validation error with a message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        CatalogError::Validation(message.into())
    }

    /// Create a DataIntegrity error with a message
    pub fn integrity<S: Into<String>>(message: S) -> Self {
        CatalogError::DataIntegrity(message.into())
    }

    /// Create an Internal error with a message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        CatalogError::Internal(message.into())
    }

    /// Create a NetworkFailure transport error
    pub fn network<S: Into<String>>(message: S) -> Self {
        CatalogError::Transport(TransportError::NetworkFailure {
            message: message.into(),
        })
    }

    /// Create an HttpStatus transport error with a synthesized body
    pub fn http_status(status: u16) -> Self {
        CatalogError::Transport(TransportError::HttpStatus {
            status,
            api_error: ApiError::synthesize(Some(status), None),
        })
    }

    /// HTTP status associated with this error, if any
    ///
    /// Timeouts report 408 for display only; see `response_status` for the
    /// status the server actually sent.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CatalogError::Transport(TransportError::HttpStatus { status, .. }) => Some(*status),
            CatalogError::Transport(TransportError::Timeout) => Some(408),
            CatalogError::Api(api_error) => Some(api_error.status_code),
            CatalogError::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Check if error is worth retrying at all
    ///
    /// Client errors (4xx) are final except 408 and 429. Validation,
    /// integrity and local errors never improve on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Transport(TransportError::Timeout)
            | CatalogError::Transport(TransportError::NetworkFailure { .. }) => true,
            CatalogError::Transport(TransportError::HttpStatus { status, .. }) => {
                !is_client_error(*status) || is_transient_client_error(*status)
            }
            CatalogError::Api(api_error) => {
                !is_client_error(api_error.status_code)
                    || is_transient_client_error(api_error.status_code)
            }
            _ => false,
        }
    }

    /// Status code of a response the server actually returned
    pub fn response_status(&self) -> Option<u16> {
        match self {
            CatalogError::Transport(TransportError::HttpStatus { status, .. }) => Some(*status),
            CatalogError::Api(api_error) => Some(api_error.status_code),
            _ => None,
        }
    }

    /// Check if the server answered with a transient 4xx (408/429)
    ///
    /// A client-side timeout has no response and is not one of these.
    pub fn is_transient_client_error(&self) -> bool {
        self.response_status().map(is_transient_client_error).unwrap_or(false)
    }

    /// Check if the backend reported the resource missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_)) || self.status_code() == Some(404)
    }

    /// Check if the user needs to re-authenticate
    pub fn is_auth_error(&self) -> bool {
        matches!(self.status_code(), Some(401) | Some(403))
    }

    /// Normalize any error into the server's error body shape
    ///
    /// Server-provided bodies pass through; everything else is synthesized
    /// with status 500 unless a status is known.
    pub fn to_api_error(&self) -> ApiError {
        match self {
            CatalogError::Transport(TransportError::HttpStatus { api_error, .. })
            | CatalogError::Api(api_error) => api_error.clone(),
            CatalogError::NotFound(resource) => {
                ApiError::synthesize(Some(404), Some(&format!("Not found: {}", resource)))
            }
            other => ApiError::synthesize(other.status_code(), Some(&other.to_string())),
        }
    }

    /// Get user-friendly error message suitable for a notification
    pub fn user_message(&self) -> String {
        match self {
            CatalogError::Transport(TransportError::Timeout) => {
                "The book service took too long to respond. Please try again.".to_string()
            }
            CatalogError::Transport(TransportError::NetworkFailure { .. }) => {
                "Could not reach the book service. Check your connection and try again.".to_string()
            }
            CatalogError::Transport(TransportError::HttpStatus { status: 401, .. }) => {
                "Your session has expired. Please log in again.".to_string()
            }
            CatalogError::NotFound(_) => "That book could not be found.".to_string(),
            _ => self.to_api_error().message,
        }
    }
}

fn is_client_error(status: u16) -> bool {
    (400..500).contains(&status)
}

fn is_transient_client_error(status: u16) -> bool {
    status == 408 || status == 429
}
