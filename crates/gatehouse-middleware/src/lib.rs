//! # Gatehouse Middleware
//!
//! The middleware-chain router for the Gatehouse gateway.
//!
//! Components that need to run before routing implement [`Middleware`] and
//! are registered on a [`Pipeline`]. The pipeline turns into an ordinary
//! [`BoxHandler`](gatehouse_core::BoxHandler) with
//! [`Pipeline::into_handler`], so it plugs into any service runner.

#![doc(html_root_url = "https://docs.rs/gatehouse-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod middleware;
mod pipeline;

pub use context::MiddlewareContext;
pub use middleware::{Middleware, Next};
pub use pipeline::{Pipeline, PipelineBuilder};
