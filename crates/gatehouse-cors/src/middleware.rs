//! CORS as a middleware-chain stage.

use std::sync::Arc;

use gatehouse_core::{BoxFuture, BoxHandler, ExtraConfig, Logger, Request, Response};
use gatehouse_middleware::{Middleware, MiddlewareContext, Next};

use crate::bridge::attach_debug_bridge;
use crate::engine::{build_engine, CorsEngine};
use crate::error::CorsError;
use crate::policy::{lookup_policy, CorsPolicy, PolicyLookup, CORS_NAMESPACE};

/// The CORS stage for a [`Pipeline`](gatehouse_middleware::Pipeline).
///
/// Cheap to clone; clones share one engine.
///
/// # Example
///
/// ```ignore
/// use gatehouse_cors::new_middleware_with_logger;
/// use gatehouse_middleware::Pipeline;
///
/// let mut builder = Pipeline::builder();
/// if let Some(cors) = new_middleware_with_logger(&config.extra_config, Some(logger)) {
///     builder = builder.add_stage(cors);
/// }
/// let handler = builder.build().into_handler(router);
/// ```
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    engine: Arc<CorsEngine>,
}

impl CorsMiddleware {
    /// Wraps an already built engine.
    pub fn from_engine(engine: CorsEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Builds the middleware for `policy`.
    ///
    /// The debug bridge is attached when `policy.debug` is set and a logger
    /// is given.
    pub fn from_policy(policy: &CorsPolicy, logger: Option<Arc<dyn Logger>>) -> Self {
        let mut engine = build_engine(policy);
        if policy.debug {
            if let Some(logger) = logger {
                attach_debug_bridge(&mut engine, logger);
            }
        }
        Self::from_engine(engine)
    }

    /// Like [`new_middleware_with_logger`], but a missing or malformed
    /// `security/cors` block is an error.
    pub fn try_from_extra_config(
        extra: &ExtraConfig,
        logger: Option<Arc<dyn Logger>>,
    ) -> Result<Self, CorsError> {
        match lookup_policy(extra) {
            PolicyLookup::Found(policy) => Ok(Self::from_policy(&policy, logger)),
            PolicyLookup::Absent => Err(CorsError::NotConfigured(CORS_NAMESPACE)),
            PolicyLookup::Malformed(e) => Err(CorsError::InvalidConfig(e)),
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &CorsEngine {
        &self.engine
    }

    /// Wraps a plain handler with the CORS checks.
    pub fn handler(&self, next: BoxHandler) -> BoxHandler {
        Arc::clone(&self.engine).wrap(next)
    }
}

impl Middleware for CorsMiddleware {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            self.engine
                .handle(request, move |req| next.run(ctx, req))
                .await
        })
    }
}

/// Builds the CORS middleware from a service's extra config.
///
/// Returns `None` when CORS is not configured; the caller should then skip
/// the stage.
pub fn new_middleware(extra: &ExtraConfig) -> Option<CorsMiddleware> {
    new_middleware_with_logger(extra, None)
}

/// Builds the CORS middleware, relaying debug output to `logger`.
///
/// A malformed `security/cors` block is logged as a warning and treated as
/// absent.
pub fn new_middleware_with_logger(
    extra: &ExtraConfig,
    logger: Option<Arc<dyn Logger>>,
) -> Option<CorsMiddleware> {
    match lookup_policy(extra) {
        PolicyLookup::Found(policy) => Some(CorsMiddleware::from_policy(&policy, logger)),
        PolicyLookup::Absent => None,
        PolicyLookup::Malformed(e) => {
            tracing::warn!(error = %e, "Ignoring malformed CORS configuration, CORS disabled");
            if let Some(logger) = &logger {
                logger.warning(&format!("[CORS] ignoring malformed configuration: {e}"));
            }
            None
        }
    }
}
