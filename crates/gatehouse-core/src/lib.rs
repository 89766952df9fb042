//! # Gatehouse Core
//!
//! Core types shared by every Gatehouse crate.
//!
//! - [`ServiceConfig`] / [`ExtraConfig`] - Per-service configuration and the
//!   namespaced "extra config" block components read their settings from
//! - [`duration`] - Go-style duration strings (`"12h"`, `"1500ms"`)
//! - [`Logger`] / [`TracingLogger`] - The gateway's structured logger
//! - [`HttpHandler`] / [`BoxHandler`] - The request-handler abstraction
//!
//! ## Example
//!
//! ```
//! use gatehouse_core::ServiceConfig;
//!
//! let config = ServiceConfig::from_json_str(r#"{
//!     "name": "api",
//!     "port": 8080,
//!     "extra_config": {
//!         "security/cors": { "allow_origins": ["https://app.example.com"] }
//!     }
//! }"#).unwrap();
//!
//! assert!(config.extra_config.get("security/cors").is_some());
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
pub mod duration;
mod error;
mod handler;
pub mod logging;

pub use config::{ExtraConfig, ServiceConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use error::{ConfigError, LoggingError};
pub use handler::{handler_fn, BoxFuture, BoxHandler, FnHandler, HttpHandler, Request, Response};
pub use logging::{LogLevel, Logger, NoopLogger, TracingLogger};
