//! Object Store Error Types
//!
//! Structured errors for the object-store and remote-listing boundary.
//! Maps HTTP status codes to specific variants for retry decisions.

/// Backend request error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Authentication expired, token needs refresh")]
    AuthExpired,

    #[error("Rate limited, try again after backoff")]
    RateLimited,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({0}): {1}")]
    Server(u16, String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request error: {0}")]
    Request(String),

    #[error("Local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::RateLimited
                | StoreError::Timeout
                | StoreError::Network(_)
                | StoreError::Server(_, _)
                | StoreError::AuthExpired
        )
    }

    /// Create a StoreError from an HTTP status code and response body
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => StoreError::AuthExpired,
            403 => StoreError::Forbidden(body.to_string()),
            404 => StoreError::NotFound(body.to_string()),
            408 => StoreError::Timeout,
            429 => StoreError::RateLimited,
            500..=599 => StoreError::Server(status, body.to_string()),
            _ => StoreError::Request(format!("HTTP {}: {}", status, body)),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else if err.is_connect() || err.is_request() {
            StoreError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            StoreError::from_status(status.as_u16(), &err.to_string())
        } else {
            StoreError::Request(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(StoreError::from_status(401, ""), StoreError::AuthExpired));
        assert!(matches!(StoreError::from_status(404, "gone"), StoreError::NotFound(_)));
        assert!(matches!(StoreError::from_status(408, ""), StoreError::Timeout));
        assert!(matches!(StoreError::from_status(503, "busy"), StoreError::Server(503, _)));
        assert!(matches!(StoreError::from_status(418, "teapot"), StoreError::Request(_)));
    }

    #[test]
    fn test_retryable() {
        assert!(StoreError::RateLimited.is_retryable());
        assert!(StoreError::Timeout.is_retryable());
        assert!(StoreError::Server(500, String::new()).is_retryable());
        assert!(!StoreError::NotFound("x".into()).is_retryable());
        assert!(!StoreError::Forbidden("x".into()).is_retryable());
    }
}
