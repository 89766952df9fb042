//! CORS in front of the service runner.
//!
//! Wrapping the runner puts the CORS checks around the final handler, so
//! they run before the router looks at the path or method.

use std::sync::Arc;

use gatehouse_core::{BoxHandler, LogLevel, Logger, ServiceConfig, TracingLogger};
use gatehouse_server::{runner_fn, RunServer, ServerError, ShutdownSignal};

use crate::middleware::new_middleware_with_logger;

/// Wraps `next` with CORS, logging to a fresh DEBUG-level stdout logger.
///
/// # Example
///
/// ```ignore
/// use gatehouse_cors::wrap_runner;
/// use gatehouse_server::default_runner;
///
/// let runner = wrap_runner(default_runner());
/// runner(shutdown, config, router).await?;
/// ```
pub fn wrap_runner(next: RunServer) -> RunServer {
    runner_fn(move |shutdown, config, handler| {
        let next = Arc::clone(&next);
        async move {
            let logger: Arc<dyn Logger> = Arc::new(TracingLogger::stdout(LogLevel::Debug, ""));
            run_with_cors(&next, logger, shutdown, config, handler).await
        }
    })
}

/// Wraps `next` with CORS, logging to `logger`.
pub fn wrap_runner_with_logger(next: RunServer, logger: Arc<dyn Logger>) -> RunServer {
    runner_fn(move |shutdown, config, handler| {
        let next = Arc::clone(&next);
        let logger = Arc::clone(&logger);
        async move { run_with_cors(&next, logger, shutdown, config, handler).await }
    })
}

async fn run_with_cors(
    next: &RunServer,
    logger: Arc<dyn Logger>,
    shutdown: ShutdownSignal,
    config: ServiceConfig,
    handler: BoxHandler,
) -> Result<(), ServerError> {
    match new_middleware_with_logger(&config.extra_config, Some(logger)) {
        Some(cors) => {
            tracing::info!(service = %config.name, "CORS enabled");
            let handler = cors.handler(handler);
            next(shutdown, config, handler).await
        }
        None => next(shutdown, config, handler).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use gatehouse_core::{handler_fn, NoopLogger, Request};
    use http::{header, StatusCode};
    use http_body_util::Full;
    use parking_lot::Mutex;
    use serde_json::json;

    /// A runner that sends one request through the handler it is given.
    fn probe_runner(seen: Arc<Mutex<Option<http::HeaderMap>>>) -> RunServer {
        runner_fn(move |_shutdown, _config, handler: BoxHandler| {
            let seen = Arc::clone(&seen);
            async move {
                let request = http::Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "http://example.com")
                    .body(Full::new(Bytes::new()))
                    .unwrap();
                let response = handler.call(request).await;
                *seen.lock() = Some(response.headers().clone());
                Ok(())
            }
        })
    }

    fn router() -> BoxHandler {
        handler_fn(|_req: Request| async {
            http::Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::new()))
                .unwrap()
        })
    }

    #[tokio::test]
    async fn test_runner_without_cors_passes_handler_through() {
        let seen = Arc::new(Mutex::new(None));
        let runner = wrap_runner_with_logger(probe_runner(seen.clone()), Arc::new(NoopLogger));

        runner(ShutdownSignal::new(), ServiceConfig::default(), router())
            .await
            .unwrap();

        let headers = seen.lock().take().unwrap();
        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn test_runner_with_cors_wraps_handler() {
        let seen = Arc::new(Mutex::new(None));
        let runner = wrap_runner(probe_runner(seen.clone()));
        let config = ServiceConfig::default().with_extra_config(
            gatehouse_core::ExtraConfig::new().with("security/cors", json!({ "allow_methods": ["GET"] })),
        );

        runner(ShutdownSignal::new(), config, router()).await.unwrap();

        let headers = seen.lock().take().unwrap();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://example.com"
        );
    }

    #[tokio::test]
    async fn test_runner_error_propagates() {
        let failing = runner_fn(|_shutdown, _config, _handler| async {
            Err(ServerError::Runner("boom".to_string()))
        });
        let runner = wrap_runner_with_logger(failing, Arc::new(NoopLogger));

        let result = runner(ShutdownSignal::new(), ServiceConfig::default(), router()).await;
        assert!(matches!(result, Err(ServerError::Runner(msg)) if msg == "boom"));
    }
}
