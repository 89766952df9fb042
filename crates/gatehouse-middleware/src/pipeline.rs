//! Ordered middleware pipeline.
//!
//! A [`Pipeline`] is the gateway's middleware-chain router: stages are
//! registered once at service start and every request flows through them in
//! registration order before reaching the handler.

use std::sync::Arc;

use gatehouse_core::{handler_fn, BoxFuture, BoxHandler, Request, Response};

use crate::context::MiddlewareContext;
use crate::middleware::{Middleware, Next};

/// A type-erased middleware that can be stored in a vector.
type BoxedMiddleware = Arc<dyn Middleware>;

/// An immutable, ordered list of middleware stages.
///
/// # Example
///
/// ```ignore
/// use gatehouse_middleware::Pipeline;
///
/// let pipeline = Pipeline::builder()
///     .add_stage(cors)
///     .build();
///
/// let handler = pipeline.into_handler(router);
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Processes a request through every stage, then the handler.
    pub async fn process<H>(&self, mut ctx: MiddlewareContext, request: Request, handler: H) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let next = self.build_chain(handler);
        next.run(&mut ctx, request).await
    }

    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::handler(handler);
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Wraps `handler` so every request runs through this pipeline first.
    ///
    /// Each request gets a fresh [`MiddlewareContext`].
    pub fn into_handler(self, handler: BoxHandler) -> BoxHandler {
        let pipeline = Arc::new(self);
        handler_fn(move |request: Request| {
            let pipeline = Arc::clone(&pipeline);
            let handler = Arc::clone(&handler);
            async move {
                pipeline
                    .process(MiddlewareContext::new(), request, move |_ctx, req| {
                        handler.call(req)
                    })
                    .await
            }
        })
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn add_stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        tracing::debug!(stages = self.stages.len(), "Middleware pipeline built");
        Pipeline {
            stages: self.stages,
        }
    }
}
