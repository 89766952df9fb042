//! The service runner.
//!
//! A service runner is the function the gateway calls to start serving a
//! service: it receives a cancellation signal, the service configuration and
//! the final request handler, and returns once serving stops. Components that
//! need to sit in front of the router (CORS, for example) wrap a runner with
//! another runner instead of modifying the router itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use gatehouse_server::{default_runner, ShutdownSignal};
//!
//! let runner = default_runner();
//! runner(ShutdownSignal::with_os_signals(), config, handler).await?;
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gatehouse_core::{BoxFuture, BoxHandler, Request, Response, ServiceConfig};
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use crate::error::ServerError;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The signature every service runner implements.
pub type RunServer = Arc<
    dyn Fn(ShutdownSignal, ServiceConfig, BoxHandler) -> BoxFuture<'static, Result<(), ServerError>>
        + Send
        + Sync,
>;

/// Turns an async function into a [`RunServer`].
pub fn runner_fn<F, Fut>(func: F) -> RunServer
where
    F: Fn(ShutdownSignal, ServiceConfig, BoxHandler) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ServerError>> + Send + 'static,
{
    Arc::new(move |shutdown, config, handler| Box::pin(func(shutdown, config, handler)))
}

/// Returns the standard hyper-based runner.
pub fn default_runner() -> RunServer {
    runner_fn(run_server)
}

/// Binds the configured address and serves until `shutdown` fires.
pub async fn run_server(
    shutdown: ShutdownSignal,
    config: ServiceConfig,
    handler: BoxHandler,
) -> Result<(), ServerError> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| ServerError::Bind {
        addr: addr.to_string(),
        source: e,
    })?;

    serve(listener, shutdown, config, handler).await
}

/// Serves connections from an already bound listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    shutdown: ShutdownSignal,
    config: ServiceConfig,
    handler: BoxHandler,
) -> Result<(), ServerError> {
    let local_addr = listener.local_addr()?;
    tracing::info!(service = %config.name, "Server listening on {}", local_addr);

    let tracker = ConnectionTracker::new();
    let request_timeout = config.timeout;

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, remote_addr)) => {
                        let handler = Arc::clone(&handler);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, handler, request_timeout, shutdown).await {
                                tracing::error!("Connection error from {}: {}", remote_addr, e);
                            }
                            drop(token);
                        });
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                    }
                }
            }

            _ = shutdown.recv() => {
                tracing::info!(service = %config.name, "Shutdown signal received, stopping server");
                break;
            }
        }
    }

    tokio::select! {
        _ = tracker.wait_for_drain() => {
            tracing::info!("All connections closed");
        }
        _ = tokio::time::sleep(config.shutdown_timeout) => {
            tracing::warn!(
                "Shutdown timeout reached, {} connections still active",
                tracker.active_connections()
            );
        }
    }

    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    handler: BoxHandler,
    request_timeout: Duration,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: http::Request<Incoming>| {
        let handler = Arc::clone(&handler);
        async move { Ok::<_, Infallible>(handle_request(handler, req, request_timeout).await) }
    });

    let conn = http1::Builder::new().serve_connection(io, service);

    tokio::select! {
        result = conn => result,
        _ = shutdown.recv() => Ok(()),
    }
}

async fn handle_request(
    handler: BoxHandler,
    req: http::Request<Incoming>,
    request_timeout: Duration,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    tracing::debug!("{} {}", method, path);

    let request = match tokio::time::timeout(request_timeout, collect_request(req)).await {
        Ok(Ok(request)) => request,
        Ok(Err(e)) => {
            tracing::error!("Failed to collect request body: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "BODY_READ_ERROR",
                &format!("Failed to read request body: {}", e),
            );
        }
        Err(_) => {
            tracing::warn!("Request body collection timed out");
            return error_response(
                StatusCode::REQUEST_TIMEOUT,
                "REQUEST_TIMEOUT",
                "Request body collection timed out",
            );
        }
    };

    match tokio::time::timeout(request_timeout, handler.call(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!("Handler execution timed out for {} {}", method, path);
            error_response(
                StatusCode::GATEWAY_TIMEOUT,
                "HANDLER_TIMEOUT",
                "Handler execution timed out",
            )
        }
    }
}

async fn collect_request(req: http::Request<Incoming>) -> Result<Request, hyper::Error> {
    let (parts, body) = req.into_parts();
    let bytes = body.collect().await?.to_bytes();
    Ok(http::Request::from_parts(parts, Full::new(bytes)))
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "code": code,
            "message": message
        }
    });

    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| http::Response::new(Full::new(Bytes::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::handler_fn;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn echo_path_handler() -> BoxHandler {
        handler_fn(|req: Request| async move {
            http::Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::from(req.uri().path().to_string())))
                .unwrap()
        })
    }

    async fn raw_get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn test_error_response_shape() {
        let response = error_response(StatusCode::BAD_REQUEST, "BAD", "nope");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_serve_routes_to_handler_and_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();

        let config = ServiceConfig {
            shutdown_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let server = tokio::spawn(serve(listener, shutdown.clone(), config, echo_path_handler()));

        let raw = raw_get(addr, "/orders").await;
        assert!(raw.starts_with("HTTP/1.1 200"));
        assert!(raw.ends_with("/orders"));

        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("server should stop")
            .expect("task should not panic");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_server_rejects_bad_address() {
        let config = ServiceConfig {
            host: "not an address".to_string(),
            ..Default::default()
        };

        let result = run_server(ShutdownSignal::new(), config, echo_path_handler()).await;
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[tokio::test]
    async fn test_runner_fn_wraps_async_fn() {
        let runner = runner_fn(|_shutdown, config: ServiceConfig, _handler| async move {
            Err(ServerError::Runner(config.name))
        });

        let result = runner(ShutdownSignal::new(), ServiceConfig::default(), echo_path_handler()).await;
        assert!(matches!(result, Err(ServerError::Runner(name)) if name == "gatehouse"));
    }
}
