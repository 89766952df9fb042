//! Server error types.

use gatehouse_core::ConfigError;
use thiserror::Error;

/// Errors returned by service runners.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The service configuration is unusable.
    #[error("invalid service configuration: {0}")]
    Config(#[from] ConfigError),

    /// Binding the listener failed.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// Address that could not be bound.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A runner failed for its own reasons.
    #[error("runner failed: {0}")]
    Runner(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:80".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to bind to 127.0.0.1:80: denied");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: ServerError = ConfigError::invalid_value("host", "bad").into();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
