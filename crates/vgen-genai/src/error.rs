//! Generative backend error types.

use thiserror::Error;

/// Result type for backend operations.
pub type GenAiResult<T> = Result<T, GenAiError>;

/// Errors that can occur while talking to the generative backend.
#[derive(Debug, Error)]
pub enum GenAiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Content blocked: {0}")]
    Blocked(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenAiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::AuthError(body),
            429 => Self::RateLimited(body),
            500..=599 => Self::ServerError(status, body),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, body)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_http_status() {
        assert!(matches!(
            GenAiError::from_http_status(429, "slow down"),
            GenAiError::RateLimited(_)
        ));
        assert!(matches!(
            GenAiError::from_http_status(503, "unavailable"),
            GenAiError::ServerError(503, _)
        ));
        assert!(matches!(
            GenAiError::from_http_status(403, "denied"),
            GenAiError::AuthError(_)
        ));
        let err = GenAiError::from_http_status(400, "bad image");
        assert!(err.to_string().contains("HTTP 400: bad image"));
    }
}
