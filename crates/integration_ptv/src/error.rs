//! PTV client error types

use thiserror::Error;

/// Errors that can occur while building, signing, dispatching or unwrapping
/// a PTV API request
#[derive(Debug, Error)]
pub enum PtvError {
    /// User id or API key absent when the client was built
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// The API key could not be used as an HMAC key
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Resource path is empty or not well-formed after normalization
    #[error("Invalid request path: {0:?}")]
    InvalidPath(String),

    /// Server answered with a non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Successful response body is not valid JSON
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Response envelope carries no `status` field (strict mode only)
    #[error("Response envelope has no status field")]
    MissingStatus,

    /// Payload has several fields and none was selected as the result
    #[error("Ambiguous result, payload fields: {}", available.join(", "))]
    AmbiguousResult {
        /// Field names present in the payload
        available: Vec<String>,
    },

    /// Connection to the API failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timeout
    #[error("Request timed out after {timeout_secs} seconds")]
    Timeout {
        /// The timeout duration in seconds
        timeout_secs: u64,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A concurrent lookup task panicked or was cancelled
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl PtvError {
    /// HTTP status code, if the server produced one
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the failure was caused by the caller's input or setup
    /// rather than by the server or the network
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        match self {
            Self::MissingCredentials(_)
            | Self::Signing(_)
            | Self::InvalidPath(_)
            | Self::Configuration(_) => true,
            Self::Http { status, .. } => *status >= 400 && *status < 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code() {
        let err = PtvError::Http {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(PtvError::MissingStatus.status_code(), None);
    }

    #[test]
    fn test_client_errors() {
        assert!(PtvError::MissingCredentials("PTV_USER_ID".to_string()).is_client_error());
        assert!(PtvError::InvalidPath(String::new()).is_client_error());
        assert!(
            PtvError::Http {
                status: 403,
                body: String::new(),
            }
            .is_client_error()
        );
    }

    #[test]
    fn test_non_client_errors() {
        assert!(
            !PtvError::Http {
                status: 503,
                body: String::new(),
            }
            .is_client_error()
        );
        assert!(!PtvError::ConnectionFailed("refused".to_string()).is_client_error());
        assert!(!PtvError::Timeout { timeout_secs: 5 }.is_client_error());
        assert!(!PtvError::MalformedResponse("eof".to_string()).is_client_error());
    }

    #[test]
    fn test_error_display() {
        let err = PtvError::Http {
            status: 404,
            body: "{\"message\":\"missing\"}".to_string(),
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("missing"));

        let err = PtvError::AmbiguousResult {
            available: vec!["departures".to_string(), "stops".to_string()],
        };
        assert!(err.to_string().contains("departures, stops"));

        let err = PtvError::Timeout { timeout_secs: 10 };
        assert!(err.to_string().contains("10"));
    }
}
