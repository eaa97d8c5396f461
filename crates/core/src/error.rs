//! Error types for the ANMI domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` covers startup wiring.

use thiserror::Error;

/// The top-level error type for ANMI operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Index errors ---
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of the external passage index.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Index request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Index authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Index request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed index response: {0}")]
    InvalidResponse(String),

    #[error("Index not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn index_error_converts_into_top_level() {
        let err: Error = IndexError::Timeout("search took 30s".into()).into();
        assert!(matches!(err, Error::Index(IndexError::Timeout(_))));
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn config_error_names_the_problem() {
        let err = Error::Config {
            message: "policy template not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: policy template not found"
        );
    }
}
