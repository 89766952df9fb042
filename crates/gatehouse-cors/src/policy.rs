//! CORS policy extraction.
//!
//! A service enables CORS by adding a `security/cors` block to its extra
//! config:
//!
//! ```json
//! {
//!   "extra_config": {
//!     "security/cors": {
//!       "allow_origins": ["https://app.example.com"],
//!       "allow_methods": ["GET", "POST"],
//!       "allow_headers": ["Authorization", "Content-Type"],
//!       "expose_headers": ["X-Request-Id"],
//!       "allow_credentials": true,
//!       "max_age": "12h",
//!       "debug": false
//!     }
//!   }
//! }
//! ```
//!
//! Every field is optional. A missing block disables CORS. A block that does
//! not decode also disables it, but [`lookup_policy`] reports it as
//! [`PolicyLookup::Malformed`] so callers can tell the two apart.

use std::time::Duration;

use gatehouse_core::{ConfigError, ExtraConfig};
use serde::{Deserialize, Serialize};

/// The extra-config namespace holding the CORS block.
pub const CORS_NAMESPACE: &str = "security/cors";

/// Decoded CORS settings for one service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsPolicy {
    /// Allowed origins. Empty means every origin is accepted.
    pub allow_origins: Vec<String>,

    /// Allowed methods. Empty means `GET`, `POST` and `HEAD`.
    pub allow_methods: Vec<String>,

    /// Allowed request headers.
    pub allow_headers: Vec<String>,

    /// Response headers exposed to scripts.
    pub expose_headers: Vec<String>,

    /// Whether credentialed requests are allowed.
    pub allow_credentials: bool,

    /// Let preflight requests through to the handler.
    pub options_passthrough: bool,

    /// Status for successful preflights. `0` means 204.
    pub options_success_status: u16,

    /// Answer Private Network Access preflights.
    pub allow_private_network: bool,

    /// How long browsers may cache a preflight result.
    #[serde(with = "gatehouse_core::duration::serde_str")]
    pub max_age: Duration,

    /// Relay the engine's diagnostics to the gateway logger.
    pub debug: bool,
}

/// The outcome of looking up the CORS block.
#[derive(Debug)]
pub enum PolicyLookup {
    /// The block is present and valid.
    Found(CorsPolicy),
    /// No block is configured.
    Absent,
    /// The block is present but does not decode.
    Malformed(ConfigError),
}

impl PolicyLookup {
    /// Returns the policy, treating malformed config as absent.
    pub fn into_policy(self) -> Option<CorsPolicy> {
        match self {
            Self::Found(policy) => Some(policy),
            Self::Absent | Self::Malformed(_) => None,
        }
    }
}

/// Looks up and decodes the `security/cors` block.
pub fn lookup_policy(extra: &ExtraConfig) -> PolicyLookup {
    match extra.decode::<CorsPolicy>(CORS_NAMESPACE) {
        None => PolicyLookup::Absent,
        Some(Ok(policy)) => PolicyLookup::Found(policy),
        Some(Err(e)) => PolicyLookup::Malformed(e),
    }
}

/// Returns the CORS policy, or `None` if it is missing or malformed.
pub fn extract_policy(extra: &ExtraConfig) -> Option<CorsPolicy> {
    lookup_policy(extra).into_policy()
}
