//! The request-handler abstraction.
//!
//! Every router integration in the gateway ultimately hands requests to an
//! [`HttpHandler`]. Handlers are shared across connections, so they are stored
//! as [`BoxHandler`] (`Arc<dyn HttpHandler>`).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;

/// The HTTP request type handed to handlers.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type returned by handlers.
pub type Response = http::Response<Full<Bytes>>;

/// A boxed future that returns `T`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A shareable request handler.
pub type BoxHandler = Arc<dyn HttpHandler>;

/// A request handler.
///
/// Handlers must be callable concurrently from many connections.
pub trait HttpHandler: Send + Sync + 'static {
    /// Handles a request and produces a response.
    fn call(&self, request: Request) -> BoxFuture<'static, Response>;
}

/// A handler created from an async function.
///
/// # Example
///
/// ```
/// use gatehouse_core::{handler_fn, Request, Response};
/// use bytes::Bytes;
/// use http_body_util::Full;
///
/// let handler = handler_fn(|_req: Request| async {
///     Response::new(Full::new(Bytes::from("ok")))
/// });
/// ```
pub struct FnHandler<F> {
    func: F,
}

impl<F, Fut> HttpHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, request: Request) -> BoxFuture<'static, Response> {
        Box::pin((self.func)(request))
    }
}

/// Wraps an async function into a [`BoxHandler`].
pub fn handler_fn<F, Fut>(func: F) -> BoxHandler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(FnHandler { func })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[tokio::test]
    async fn test_handler_fn_invokes_closure() {
        let handler = handler_fn(|req: Request| async move {
            http::Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::from(req.uri().path().to_string())))
                .unwrap()
        });

        let request = http::Request::builder()
            .uri("/orders")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = handler.call(request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_handler_is_shareable() {
        let handler = handler_fn(|_req: Request| async { Response::new(Full::new(Bytes::new())) });
        let clone = Arc::clone(&handler);

        let task = tokio::spawn(async move {
            let request = http::Request::new(Full::new(Bytes::new()));
            clone.call(request).await.status()
        });

        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }
}
