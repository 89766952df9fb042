//! # Gatehouse CORS
//!
//! Cross-Origin Resource Sharing for Gatehouse services.
//!
//! A service turns CORS on by adding a `security/cors` block to its extra
//! config. At service start the block is decoded into a [`CorsPolicy`], a
//! [`CorsEngine`] is built from it once, and the engine is put in front of
//! the request handler in one of two ways:
//!
//! - [`wrap_runner`] / [`wrap_runner_with_logger`] wrap the service runner,
//!   so the checks run before the router sees the request
//! - [`new_middleware`] / [`new_middleware_with_logger`] return a
//!   [`CorsMiddleware`] stage for a middleware
//!   [`Pipeline`](gatehouse_middleware::Pipeline)
//!
//! An empty `allow_origins` list accepts every origin. With `debug` set and a
//! logger available, the engine's diagnostics are relayed to
//! [`Logger::debug`](gatehouse_core::Logger::debug).
//!
//! ## Example
//!
//! ```
//! use gatehouse_core::ServiceConfig;
//! use gatehouse_cors::new_middleware;
//!
//! let config = ServiceConfig::from_json_str(r#"{
//!     "extra_config": {
//!         "security/cors": {
//!             "allow_origins": ["https://app.example.com"],
//!             "max_age": "12h"
//!         }
//!     }
//! }"#).unwrap();
//!
//! let cors = new_middleware(&config.extra_config).unwrap();
//! assert!(cors.engine().is_origin_allowed("https://app.example.com"));
//! assert_eq!(cors.engine().max_age(), 43_200);
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-cors/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bridge;
pub mod engine;
mod error;
mod middleware;
mod origin;
mod policy;
mod runner;

pub use bridge::{attach_debug_bridge, LogBridge, RELAY_CHUNK_SIZE};
pub use engine::{build_engine, CorsDecision, CorsEngine, CorsOptions};
pub use error::CorsError;
pub use middleware::{new_middleware, new_middleware_with_logger, CorsMiddleware};
pub use origin::{origin_predicate, OriginPredicate};
pub use policy::{extract_policy, lookup_policy, CorsPolicy, PolicyLookup, CORS_NAMESPACE};
pub use runner::{wrap_runner, wrap_runner_with_logger};
