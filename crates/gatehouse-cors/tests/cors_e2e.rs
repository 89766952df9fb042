//! End-to-end tests for the CORS integration.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gatehouse_core::{handler_fn, BoxHandler, ExtraConfig, Logger, Request, Response, ServiceConfig};
use gatehouse_cors::{new_middleware, new_middleware_with_logger, wrap_runner_with_logger, CORS_NAMESPACE};
use gatehouse_server::{runner_fn, serve, ServerError, ShutdownSignal};
use http::{header, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Recorder {
    fn lines(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

impl Logger for Recorder {
    fn debug(&self, message: &str) {
        self.0.lock().push(message.to_string());
    }
    fn info(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn critical(&self, _message: &str) {}
}

fn cors_config(value: serde_json::Value) -> ExtraConfig {
    ExtraConfig::new().with(CORS_NAMESPACE, value)
}

fn router() -> BoxHandler {
    handler_fn(|req: Request| async move {
        http::Response::builder()
            .status(StatusCode::OK)
            .header("x-path", req.uri().path())
            .body(Full::new(Bytes::from("routed")))
            .unwrap()
    })
}

fn get(origin: &str) -> Request {
    http::Request::builder()
        .uri("/users")
        .header(header::ORIGIN, origin)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn preflight(origin: &str) -> Request {
    http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/users")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

async fn body_of(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

#[tokio::test]
async fn empty_origin_list_accepts_request_without_debug_output() {
    let recorder = Arc::new(Recorder::default());
    let cors = new_middleware_with_logger(
        &cors_config(json!({ "allow_origins": [], "allow_methods": ["GET"], "debug": false })),
        Some(recorder.clone()),
    )
    .unwrap();
    assert!(!cors.engine().has_debug_bridge());

    let handler = cors.handler(router());
    let response = handler.call(get("http://example.com")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://example.com"
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(recorder.lines().is_empty());
}

#[tokio::test]
async fn listed_origins_reject_others() {
    let cors = new_middleware(&cors_config(json!({ "allow_origins": ["http://a.com"] }))).unwrap();
    let handler = cors.handler(router());

    let rejected = handler.call(get("http://b.com")).await;
    assert!(rejected.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

    let rejected = handler.call(preflight("http://b.com")).await;
    assert!(rejected.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

    let accepted = handler.call(get("http://a.com")).await;
    assert_eq!(
        accepted.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://a.com"
    );
}

#[tokio::test]
async fn missing_config_leaves_handler_untouched() {
    assert!(new_middleware(&ExtraConfig::new()).is_none());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recording = {
        let seen = Arc::clone(&seen);
        runner_fn(move |_shutdown, _config, handler: BoxHandler| {
            let seen = Arc::clone(&seen);
            async move {
                for request in [get("http://a.com"), preflight("http://a.com")] {
                    let response = handler.call(request).await;
                    let status = response.status();
                    let headers = response.headers().clone();
                    let body = body_of(response).await;
                    seen.lock().push((status, headers, body));
                }
                Ok(())
            }
        })
    };

    let runner = wrap_runner_with_logger(recording, Arc::new(Recorder::default()));
    runner(ShutdownSignal::new(), ServiceConfig::default(), router())
        .await
        .unwrap();

    let direct = router();
    let mut expected = Vec::new();
    for request in [get("http://a.com"), preflight("http://a.com")] {
        let response = direct.call(request).await;
        let status = response.status();
        let headers = response.headers().clone();
        let body = body_of(response).await;
        expected.push((status, headers, body));
    }

    assert_eq!(*seen.lock(), expected);
}

#[tokio::test]
async fn max_age_is_sent_in_whole_seconds() {
    for (configured, expected) in [("90s", "90"), ("1500ms", "1")] {
        let cors = new_middleware(&cors_config(json!({ "max_age": configured }))).unwrap();
        let response = cors.handler(router()).call(preflight("http://a.com")).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_MAX_AGE).unwrap(),
            expected
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn debug_output_reaches_logger_in_order() {
    let recorder = Arc::new(Recorder::default());
    let cors = new_middleware_with_logger(
        &cors_config(json!({ "allow_origins": ["http://a.com"], "debug": true })),
        Some(recorder.clone()),
    )
    .unwrap();
    assert!(cors.engine().has_debug_bridge());

    let handler = cors.handler(router());
    let origins = ["http://a.com", "http://b.com", "http://c.com", "http://a.com"];
    for origin in origins {
        handler.call(get(origin)).await;
    }

    tokio::time::timeout(Duration::from_secs(2), async {
        while recorder.lines().len() < origins.len() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("every diagnostic line should be relayed");

    let lines = recorder.lines();
    assert_eq!(lines.len(), origins.len());
    assert!(lines[0].contains("Actual response added headers"));
    assert!(lines[1].contains("http://b.com"));
    assert!(lines[2].contains("http://c.com"));
    assert!(lines[3].contains("Actual response added headers"));
}

#[tokio::test]
async fn dropping_middleware_keeps_buffered_debug_lines() {
    for _ in 0..50 {
        let recorder = Arc::new(Recorder::default());
        let cors = new_middleware_with_logger(
            &cors_config(json!({ "allow_origins": ["http://a.com"], "debug": true })),
            Some(recorder.clone()),
        )
        .unwrap();

        let handler = cors.handler(router());
        let origins = ["http://b.com", "http://c.com", "http://d.com"];
        for origin in origins {
            handler.call(get(origin)).await;
        }
        drop(handler);
        drop(cors);

        tokio::time::timeout(Duration::from_secs(2), async {
            while recorder.lines().len() < origins.len() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("lines written before the drop should still be relayed");

        let lines = recorder.lines();
        assert_eq!(lines.len(), origins.len());
        for (line, origin) in lines.iter().zip(origins) {
            assert!(line.contains(origin), "{line} should mention {origin}");
        }
    }
}

#[tokio::test]
async fn served_preflight_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let slot = Arc::new(Mutex::new(Some(listener)));

    let inner = runner_fn(move |shutdown, config, handler| {
        let listener = slot.lock().take();
        async move {
            let listener =
                listener.ok_or_else(|| ServerError::Runner("listener already used".to_string()))?;
            serve(listener, shutdown, config, handler).await
        }
    });
    let runner = wrap_runner_with_logger(inner, Arc::new(Recorder::default()));

    let config = ServiceConfig {
        shutdown_timeout: Duration::from_millis(100),
        ..Default::default()
    }
    .with_extra_config(cors_config(json!({
        "allow_origins": ["http://a.com"],
        "allow_methods": ["GET", "PUT"]
    })));

    let shutdown = ShutdownSignal::new();
    let server = tokio::spawn(runner(shutdown.clone(), config, router()));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"OPTIONS /users HTTP/1.1\r\n\
              Host: localhost\r\n\
              Origin: http://a.com\r\n\
              Access-Control-Request-Method: PUT\r\n\
              Connection: close\r\n\r\n",
        )
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8_lossy(&raw).to_ascii_lowercase();

    assert!(raw.starts_with("http/1.1 204"));
    assert!(raw.contains("access-control-allow-origin: http://a.com"));
    assert!(raw.contains("access-control-allow-methods: put"));
    assert!(!raw.contains("x-path"));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .expect("server should stop")
        .expect("task should not panic")
        .unwrap();
}

proptest! {
    #[test]
    fn empty_origin_list_echoes_any_origin(origin in "[a-zA-Z0-9:/._-]{1,40}") {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let cors = new_middleware(&cors_config(json!({}))).unwrap();
        let handler = cors.handler(router());

        let response = runtime.block_on(handler.call(get(&origin)));
        let allowed = response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN);
        prop_assert_eq!(allowed.and_then(|v| v.to_str().ok()), Some(origin.as_str()));
    }
}
