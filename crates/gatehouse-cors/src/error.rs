//! Error types for the CORS integration.

use gatehouse_core::ConfigError;
use thiserror::Error;

/// Errors surfaced by strict CORS constructors.
#[derive(Debug, Error)]
pub enum CorsError {
    /// The `security/cors` block is present but cannot be decoded.
    #[error("invalid CORS configuration: {0}")]
    InvalidConfig(#[source] ConfigError),

    /// No `security/cors` block is configured.
    #[error("no CORS configuration under '{0}'")]
    NotConfigured(&'static str),
}
