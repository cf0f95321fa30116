use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during key-value store operations
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Operation timeout after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Key holds the wrong value type: {0}")]
    WrongType(String),

    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl StoreError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionError(_)
                | StoreError::Timeout(_)
                | StoreError::BackendUnavailable(_)
        )
    }

    /// Check if the error indicates a temporary failure
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout(_) | StoreError::BackendUnavailable(_)
        )
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
