use reqwest::{Method, StatusCode};
use wealthpulse_core::StoreError;

/// Errors surfaced by the gateway client.
///
/// Every variant reaches the caller unchanged; the client logs but never
/// swallows a failure.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No response was received.
    #[error("{method} {url}: {message}")]
    Transport {
        method: Method,
        url: String,
        message: String,
    },

    /// The server answered with a non-2xx status that this layer does not
    /// interpret.
    #[error("{method} {url} failed with {status}: {message}")]
    Status {
        status: StatusCode,
        method: Method,
        url: String,
        message: String,
        body: serde_json::Value,
    },

    /// 401 after the one allowed replay, or 401 on the refresh exchange.
    #[error("{method} {url}: not authorized")]
    Unauthorized { method: Method, url: String },

    /// The refresh exchange failed and the session was ended.
    #[error("session expired: {message}")]
    SessionExpired { message: String },

    /// A 2xx body did not match the expected shape.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential storage rejected a write.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl GatewayError {
    /// HTTP status of the failure, when a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    /// Whether the failure ended the session.
    ///
    /// Everything else is recoverable at the call site.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionExpired { .. } | Self::Unauthorized { .. })
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Why a refresh exchange failed. Shared by every request parked on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RefreshFailure {
    pub message: String,
}

impl RefreshFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<RefreshFailure> for GatewayError {
    fn from(failure: RefreshFailure) -> Self {
        Self::SessionExpired {
            message: failure.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_session_ending_errors_are_fatal() {
        let expired = GatewayError::from(RefreshFailure::new("refresh rejected"));
        assert!(expired.is_fatal());

        let unauthorized = GatewayError::Unauthorized {
            method: Method::GET,
            url: "http://api/assets".to_string(),
        };
        assert!(unauthorized.is_fatal());
        assert_eq!(unauthorized.status(), Some(StatusCode::UNAUTHORIZED));

        let server = GatewayError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            method: Method::GET,
            url: "http://api/assets".to_string(),
            message: "boom".to_string(),
            body: serde_json::Value::Null,
        };
        assert!(!server.is_fatal());

        let transport = GatewayError::Transport {
            method: Method::GET,
            url: "http://api/assets".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(!transport.is_fatal());
        assert_eq!(transport.status(), None);
    }

    #[test]
    fn test_display_includes_request_line() {
        let err = GatewayError::Status {
            status: StatusCode::NOT_FOUND,
            method: Method::DELETE,
            url: "http://api/assets/9".to_string(),
            message: "Asset not found".to_string(),
            body: serde_json::Value::Null,
        };
        assert_eq!(
            err.to_string(),
            "DELETE http://api/assets/9 failed with 404 Not Found: Asset not found"
        );
    }
}
