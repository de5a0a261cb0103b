//! Error types for the data layer

use thiserror::Error;

/// Data-layer error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PulseError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PulseError {
    pub fn network(msg: impl Into<String>) -> Self {
        PulseError::Network(msg.into())
    }

    pub fn api(msg: impl Into<String>) -> Self {
        PulseError::Api(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        PulseError::RateLimited(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        PulseError::Parse(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        PulseError::Timeout(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        PulseError::Config(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        PulseError::Unsupported(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PulseError::Internal(msg.into())
    }

    /// Whether retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PulseError::Network(_)
                | PulseError::Api(_)
                | PulseError::RateLimited(_)
                | PulseError::Timeout(_)
        )
    }
}

/// Result type alias for data-layer operations
pub type PulseResult<T> = Result<T, PulseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(PulseError::network("reset").is_transient());
        assert!(PulseError::rate_limited("slow down").is_transient());
        assert!(PulseError::timeout("10s").is_transient());
        assert!(!PulseError::config("missing key").is_transient());
        assert!(!PulseError::unsupported("no stream").is_transient());
    }

    #[test]
    fn test_display_carries_reason() {
        let err = PulseError::config("Binance does not support REST");
        assert_eq!(
            err.to_string(),
            "Configuration error: Binance does not support REST"
        );
    }
}
