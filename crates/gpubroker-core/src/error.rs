//! Error types for gpubroker

use thiserror::Error;

/// Main error type for gpubroker
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The request is missing something it needs, such as a user id
    #[error("{0}")]
    BadRequest(String),

    /// Every GPU slot is leased out
    #[error("no GPU available")]
    ResourceExhausted,

    /// The user holds no lease
    #[error("session not found")]
    SessionNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for gpubroker operations
pub type BrokerResult<T> = Result<T, BrokerError>;

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BrokerError {
    fn from(err: toml::de::Error) -> Self {
        BrokerError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BrokerError::Config("invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: invalid config");
        assert_eq!(BrokerError::ResourceExhausted.to_string(), "no GPU available");
        assert_eq!(
            BrokerError::SessionNotFound("alice".to_string()).to_string(),
            "session not found"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BrokerError = io_err.into();
        assert!(matches!(err, BrokerError::Io(_)));
    }
}
