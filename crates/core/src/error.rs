//! Error types for the ChatKit domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Note what is *not* here: a malformed frame or an unknown patch path is
//! never an error. Those are skipped inside the assembler and only show up in
//! the logs and the turn counters.

use thiserror::Error;

/// The top-level error type for all ChatKit operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Stream errors ---
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    // --- Backend errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Extractor errors ---
    #[error("Extractor error: {0}")]
    Extract(#[from] ExtractError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the byte stream feeding a turn.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error("Stream transport failed: {0}")]
    Transport(String),

    #[error("Turn timed out after {after_secs}s")]
    TimedOut { after_secs: u64 },
}

/// Failures opening a streaming turn against a remote backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Why a tool extractor produced no block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("No extractor registered for {0}")]
    NotRegistered(String),

    #[error("Unrecognized answer shape for {tool_name}")]
    UnrecognizedShape { tool_name: String },

    #[error("Extractor panicked: {tool_name}")]
    Panicked { tool_name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_correctly() {
        let err = Error::Backend(BackendError::ApiError {
            status_code: 502,
            message: "Bad gateway".into(),
        });
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("Bad gateway"));
    }

    #[test]
    fn extract_error_displays_correctly() {
        let err = Error::Extract(ExtractError::UnrecognizedShape {
            tool_name: "json2plot".into(),
        });
        assert!(err.to_string().contains("json2plot"));
    }

    #[test]
    fn stream_error_converts_into_top_level() {
        let err: Error = StreamError::TimedOut { after_secs: 30 }.into();
        assert!(matches!(err, Error::Stream(StreamError::TimedOut { after_secs: 30 })));
        assert!(err.to_string().contains("30s"));
    }
}
