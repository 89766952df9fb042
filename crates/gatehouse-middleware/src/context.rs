//! Middleware context types.
//!
//! The [`MiddlewareContext`] carries per-request state through the chain.

/// Context that flows through the middleware chain.
///
/// Records the stages a request entered, in order. A stage that
/// short-circuits leaves every later stage out of the trail.
///
/// # Example
///
/// ```
/// use gatehouse_middleware::MiddlewareContext;
///
/// let ctx = MiddlewareContext::new();
/// assert!(ctx.stages().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MiddlewareContext {
    stages: Vec<&'static str>,
}

impl MiddlewareContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of the stages entered so far.
    #[must_use]
    pub fn stages(&self) -> &[&'static str] {
        &self.stages
    }

    pub(crate) fn enter(&mut self, stage: &'static str) {
        self.stages.push(stage);
    }
}
