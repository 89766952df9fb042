//! # Gatehouse Server
//!
//! The hyper-based service runner for the Gatehouse gateway.
//!
//! A [`RunServer`] receives a [`ShutdownSignal`], the service's
//! [`ServiceConfig`](gatehouse_core::ServiceConfig) and the final request
//! handler. [`default_runner`] binds the configured address and serves HTTP/1
//! until the signal fires, then waits for in-flight connections to drain.
//!
//! Runners compose: a component that must see every request before routing
//! wraps one runner in another and swaps the handler it forwards.
//!
//! ```rust,no_run
//! use gatehouse_core::{handler_fn, Request, Response, ServiceConfig};
//! use gatehouse_server::{default_runner, ShutdownSignal};
//!
//! # async fn run() -> Result<(), gatehouse_server::ServerError> {
//! let handler = handler_fn(|_req: Request| async { Response::default() });
//! let runner = default_runner();
//! runner(ShutdownSignal::with_os_signals(), ServiceConfig::default(), handler).await
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod server;
mod shutdown;

pub use error::ServerError;
pub use server::{default_runner, run_server, runner_fn, serve, RunServer};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
