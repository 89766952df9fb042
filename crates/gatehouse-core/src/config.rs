//! Service configuration types.
//!
//! A gateway service is described by a [`ServiceConfig`]. Besides the few
//! settings the gateway itself needs (name, bind address, timeouts), every
//! service carries an [`ExtraConfig`]: a map from namespace keys such as
//! `"security/cors"` to free-form values. Components look up their own
//! namespace and decode it into their own typed settings, so the gateway never
//! needs to know about them.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Namespaced configuration blocks attached to a service.
///
/// The gateway treats every value as opaque. Components read their own
/// namespace with [`ExtraConfig::get`] or [`ExtraConfig::decode`] and never
/// mutate the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtraConfig(Map<String, Value>);

impl ExtraConfig {
    /// Creates an empty extra config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value stored under `namespace`.
    #[must_use]
    pub fn get(&self, namespace: &str) -> Option<&Value> {
        self.0.get(namespace)
    }

    /// Returns `true` if a value is stored under `namespace`.
    #[must_use]
    pub fn contains(&self, namespace: &str) -> bool {
        self.0.contains_key(namespace)
    }

    /// Decodes the value stored under `namespace` into `T`.
    ///
    /// Returns `None` when the namespace is missing and `Some(Err(_))` when
    /// it is present but does not have the shape of `T`.
    ///
    /// # Example
    ///
    /// ```
    /// use gatehouse_core::ExtraConfig;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct RateLimit { max_rate: u32 }
    ///
    /// let extra = ExtraConfig::new().with("qos/ratelimit", serde_json::json!({ "max_rate": 10 }));
    /// let limit: RateLimit = extra.decode("qos/ratelimit").unwrap().unwrap();
    /// assert_eq!(limit.max_rate, 10);
    ///
    /// assert!(extra.decode::<RateLimit>("missing").is_none());
    /// ```
    pub fn decode<T: DeserializeOwned>(&self, namespace: &str) -> Option<Result<T, ConfigError>> {
        let value = self.get(namespace)?;
        Some(
            T::deserialize(value)
                .map_err(|e| ConfigError::invalid_namespace(namespace, e.to_string())),
        )
    }

    /// Stores `value` under `namespace`, returning the updated config.
    #[must_use]
    pub fn with(mut self, namespace: impl Into<String>, value: Value) -> Self {
        self.0.insert(namespace.into(), value);
        self
    }

    /// Returns the number of namespaces present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no namespace is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ExtraConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Configuration of a single gateway service.
///
/// # Example
///
/// ```
/// use gatehouse_core::ServiceConfig;
///
/// let config = ServiceConfig::from_toml_str(r#"
///     name = "orders"
///     port = 9000
///     timeout = "5s"
///
///     [extra_config."security/cors"]
///     allow_origins = ["https://shop.example.com"]
/// "#).unwrap();
///
/// assert_eq!(config.port, 9000);
/// assert_eq!(config.timeout, std::time::Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Human-readable service name.
    pub name: String,

    /// Host to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Maximum time spent reading a request body and running the handler.
    #[serde(with = "crate::duration::serde_str")]
    pub timeout: Duration,

    /// How long to wait for in-flight connections on shutdown.
    #[serde(with = "crate::duration::serde_str")]
    pub shutdown_timeout: Duration,

    /// Namespaced component configuration.
    pub extra_config: ExtraConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "gatehouse".to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            shutdown_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            extra_config: ExtraConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Parses a service configuration from a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Parses a service configuration from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads a service configuration file, picking the format from the
    /// extension (`.json` or `.toml`).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            Some("toml") => Self::from_toml_str(&content)?,
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        tracing::debug!(path = %path.display(), service = %config.name, "Loaded service configuration");
        Ok(config)
    }

    /// Returns the `host:port` bind address.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parses the bind address into a [`SocketAddr`].
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address().parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::invalid_value("host", format!("{}: {}", self.address(), e))
        })
    }

    /// Replaces the extra config, returning the updated config.
    #[must_use]
    pub fn with_extra_config(mut self, extra_config: ExtraConfig) -> Self {
        self.extra_config = extra_config;
        self
    }
}
