//! LLM API error classification.

use thiserror::Error;

/// Errors from the LLM messages endpoint.
#[derive(Debug, Error)]
pub enum LlmApiError {
    #[error("rate limited (429)")]
    RateLimited,

    #[error("server error ({0})")]
    ServerError(u16),

    #[error("client error ({status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("empty response from model")]
    EmptyResponse,
}

impl LlmApiError {
    /// Transient errors are worth retrying with backoff; client errors are
    /// not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError(_) | Self::Network(_))
    }
}

impl From<reqwest::Error> for LlmApiError {
    fn from(err: reqwest::Error) -> Self {
        LlmApiError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        assert!(LlmApiError::RateLimited.is_transient());
        assert!(LlmApiError::ServerError(503).is_transient());
        assert!(LlmApiError::Network("reset".into()).is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = LlmApiError::ClientError {
            status: 401,
            message: "bad key".into(),
        };
        assert!(!err.is_transient());
        assert!(!LlmApiError::EmptyResponse.is_transient());
    }
}
