use thiserror::Error;

/// Top-level error type for the Sentinel system.
///
/// Subsystem crates define their own error types and implement
/// `From<SentinelError>` so that the `?` operator works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SentinelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for SentinelError {
    fn from(err: toml::de::Error) -> Self {
        SentinelError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SentinelError {
    fn from(err: toml::ser::Error) -> Self {
        SentinelError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SentinelError {
    fn from(err: serde_json::Error) -> Self {
        SentinelError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Sentinel operations.
pub type Result<T> = std::result::Result<T, SentinelError>;
