//! The CORS engine.
//!
//! [`CorsEngine`] owns every CORS decision the gateway makes. It is built
//! once per service start and then shared by all connections. Both router
//! adapters go through [`CorsEngine::handle`], so preflight and actual
//! request handling exist in one place.
//!
//! ## Preflight Requests
//!
//! An `OPTIONS` request carrying `Access-Control-Request-Method` is a
//! preflight. The engine answers it directly (status 204 by default) without
//! calling the handler, unless `options_passthrough` is set. A preflight that
//! fails any check is still answered, only without CORS headers, which the
//! browser treats as a rejection.
//!
//! ## Actual Requests
//!
//! Every other request always reaches the handler. When its origin and method
//! are allowed, the engine adds `Access-Control-Allow-Origin` and related
//! headers to the handler's response.
//!
//! ## Example
//!
//! ```
//! use gatehouse_cors::{CorsEngine, CorsOptions};
//!
//! let engine = CorsEngine::new(CorsOptions {
//!     allowed_origins: vec!["https://*.example.com".to_string()],
//!     allowed_methods: vec!["GET".to_string(), "PUT".to_string()],
//!     max_age: 600,
//!     ..Default::default()
//! });
//!
//! assert!(engine.is_origin_allowed("https://app.example.com"));
//! assert!(!engine.is_origin_allowed("https://example.org"));
//! ```

use std::fmt;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use gatehouse_core::{handler_fn, BoxHandler, Request, Response};
use http::header::{self, HeaderMap, HeaderValue};
use http::{Method, StatusCode};
use http_body_util::Full;
use parking_lot::Mutex;

use crate::bridge::LogBridge;
use crate::origin::{origin_predicate, OriginPredicate};
use crate::policy::CorsPolicy;

/// CORS header names not covered by [`http::header`].
pub mod headers {
    /// `Access-Control-Request-Private-Network` header (preflight).
    pub const REQUEST_PRIVATE_NETWORK: &str = "access-control-request-private-network";
    /// `Access-Control-Allow-Private-Network` header.
    pub const ALLOW_PRIVATE_NETWORK: &str = "access-control-allow-private-network";
}

const DEFAULT_METHODS: [&str; 3] = ["GET", "POST", "HEAD"];
const DEFAULT_HEADERS: [&str; 4] = ["origin", "accept", "content-type", "x-requested-with"];
const PREFLIGHT_VARY: &str = "Origin, Access-Control-Request-Method, Access-Control-Request-Headers";

/// Construction options for [`CorsEngine`].
#[derive(Clone, Default)]
pub struct CorsOptions {
    /// Allowed origins. Supports `"*"` and one `*` wildcard per entry.
    pub allowed_origins: Vec<String>,
    /// Replaces list matching when set.
    pub allow_origin_func: Option<OriginPredicate>,
    /// Allowed methods. Empty means `GET`, `POST` and `HEAD`.
    pub allowed_methods: Vec<String>,
    /// Allowed request headers. Empty means a small default set.
    pub allowed_headers: Vec<String>,
    /// Response headers exposed to scripts.
    pub exposed_headers: Vec<String>,
    /// Whether credentialed requests are allowed.
    pub allow_credentials: bool,
    /// Answer Private Network Access preflights.
    pub allow_private_network: bool,
    /// Preflight cache lifetime in seconds. `0` omits the header.
    pub max_age: u64,
    /// Forward preflights to the handler instead of answering them.
    pub options_passthrough: bool,
    /// Status for answered preflights. `0` means 204.
    pub options_success_status: u16,
}

impl fmt::Debug for CorsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorsOptions")
            .field("allowed_origins", &self.allowed_origins)
            .field("allow_origin_func", &self.allow_origin_func.is_some())
            .field("allowed_methods", &self.allowed_methods)
            .field("allowed_headers", &self.allowed_headers)
            .field("exposed_headers", &self.exposed_headers)
            .field("allow_credentials", &self.allow_credentials)
            .field("allow_private_network", &self.allow_private_network)
            .field("max_age", &self.max_age)
            .field("options_passthrough", &self.options_passthrough)
            .field("options_success_status", &self.options_success_status)
            .finish()
    }
}

/// The set of allowed origins.
#[derive(Debug, Clone)]
enum AllowedOrigins {
    /// Any origin (a `"*"` entry).
    Any,
    /// Lower-cased exact and wildcard entries.
    List {
        exact: Vec<String>,
        wildcards: Vec<WildcardOrigin>,
    },
}

impl AllowedOrigins {
    fn from_list(origins: &[String]) -> Self {
        let mut exact = Vec::new();
        let mut wildcards = Vec::new();

        for origin in origins {
            let origin = origin.to_ascii_lowercase();
            if origin == "*" {
                return Self::Any;
            }
            match origin.split_once('*') {
                Some((prefix, suffix)) => wildcards.push(WildcardOrigin {
                    prefix: prefix.to_string(),
                    suffix: suffix.to_string(),
                }),
                None => exact.push(origin),
            }
        }

        Self::List { exact, wildcards }
    }

    fn is_allowed(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List { exact, wildcards } => {
                let origin = origin.to_ascii_lowercase();
                exact.iter().any(|o| *o == origin) || wildcards.iter().any(|w| w.matches(&origin))
            }
        }
    }
}

#[derive(Debug, Clone)]
struct WildcardOrigin {
    prefix: String,
    suffix: String,
}

impl WildcardOrigin {
    fn matches(&self, origin: &str) -> bool {
        origin.len() >= self.prefix.len() + self.suffix.len()
            && origin.starts_with(&self.prefix)
            && origin.ends_with(&self.suffix)
    }
}

/// What the engine decided for one request.
#[derive(Debug, Clone)]
pub enum CorsDecision {
    /// A preflight. Answered directly unless passthrough is enabled.
    Preflight(HeaderMap),
    /// An actual request. The headers are added to the handler's response.
    Actual(HeaderMap),
}

impl CorsDecision {
    /// Returns the CORS headers for the response.
    pub fn headers(&self) -> &HeaderMap {
        match self {
            Self::Preflight(headers) | Self::Actual(headers) => headers,
        }
    }
}

/// Origin, method and header checks for one service.
///
/// Request evaluation only reads state fixed at construction, so one engine
/// can be shared across all connections through an `Arc`.
pub struct CorsEngine {
    allowed_origins: AllowedOrigins,
    origin_predicate: Option<OriginPredicate>,
    allowed_methods: Vec<String>,
    allowed_headers: Vec<String>,
    allow_any_header: bool,
    exposed_headers: Option<HeaderValue>,
    allow_credentials: bool,
    allow_private_network: bool,
    max_age: u64,
    options_passthrough: bool,
    success_status: StatusCode,
    log: Option<Mutex<Box<dyn Write + Send>>>,
    bridge: Option<LogBridge>,
}

impl fmt::Debug for CorsEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorsEngine")
            .field("allowed_origins", &self.allowed_origins)
            .field("origin_predicate", &self.origin_predicate.is_some())
            .field("allowed_methods", &self.allowed_methods)
            .field("allowed_headers", &self.allowed_headers)
            .field("allow_credentials", &self.allow_credentials)
            .field("max_age", &self.max_age)
            .field("success_status", &self.success_status)
            .field("debug_bridge", &self.bridge.is_some())
            .finish_non_exhaustive()
    }
}

impl CorsEngine {
    /// Builds an engine from `options`.
    pub fn new(options: CorsOptions) -> Self {
        let allowed_methods = if options.allowed_methods.is_empty() {
            DEFAULT_METHODS.iter().map(ToString::to_string).collect()
        } else {
            options
                .allowed_methods
                .iter()
                .map(|m| m.to_ascii_uppercase())
                .collect()
        };

        let mut allowed_headers: Vec<String> = if options.allowed_headers.is_empty() {
            DEFAULT_HEADERS.iter().map(ToString::to_string).collect()
        } else {
            options
                .allowed_headers
                .iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .collect()
        };
        // Origin is always allowed.
        if !allowed_headers.iter().any(|h| h == "origin") {
            allowed_headers.push("origin".to_string());
        }
        let allow_any_header = allowed_headers.iter().any(|h| h == "*");

        let exposed_headers = expose_header_value(&options.exposed_headers);

        let success_status =
            StatusCode::from_u16(options.options_success_status).unwrap_or(StatusCode::NO_CONTENT);

        Self {
            allowed_origins: AllowedOrigins::from_list(&options.allowed_origins),
            origin_predicate: options.allow_origin_func,
            allowed_methods,
            allowed_headers,
            allow_any_header,
            exposed_headers,
            allow_credentials: options.allow_credentials,
            allow_private_network: options.allow_private_network,
            max_age: options.max_age,
            options_passthrough: options.options_passthrough,
            success_status,
            log: None,
            bridge: None,
        }
    }

    /// Returns `true` if requests from `origin` may be shared.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        match &self.origin_predicate {
            Some(predicate) => predicate(origin),
            None => self.allowed_origins.is_allowed(origin),
        }
    }

    fn is_method_allowed(&self, method: &str) -> bool {
        let method = method.to_ascii_uppercase();
        // Preflights are always allowed.
        method == Method::OPTIONS.as_str() || self.allowed_methods.iter().any(|m| *m == method)
    }

    fn are_headers_allowed(&self, requested: &[String]) -> bool {
        self.allow_any_header
            || requested
                .iter()
                .all(|h| self.allowed_headers.iter().any(|allowed| allowed == h))
    }

    /// `*` is only sent when every origin is allowed by the list itself.
    fn allows_all_origins(&self) -> bool {
        self.origin_predicate.is_none() && matches!(self.allowed_origins, AllowedOrigins::Any)
    }

    /// Returns the preflight cache lifetime in seconds.
    pub fn max_age(&self) -> u64 {
        self.max_age
    }

    /// Returns the status used for answered preflights.
    pub fn success_status(&self) -> StatusCode {
        self.success_status
    }

    /// Evaluates `request` without calling any handler.
    pub fn evaluate<B>(&self, request: &http::Request<B>) -> CorsDecision {
        let headers = request.headers();
        if request.method() == Method::OPTIONS
            && headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
        {
            CorsDecision::Preflight(self.preflight_headers(headers))
        } else {
            CorsDecision::Actual(self.actual_headers(request.method(), headers))
        }
    }

    fn preflight_headers(&self, request: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::new();
        out.append(header::VARY, HeaderValue::from_static(PREFLIGHT_VARY));

        let origin = match header_str(request, header::ORIGIN.as_str()) {
            Some(origin) if !origin.is_empty() => origin,
            _ => {
                self.logf(format_args!("Preflight aborted: empty origin"));
                return out;
            }
        };
        if !self.is_origin_allowed(origin) {
            self.logf(format_args!("Preflight aborted: origin '{origin}' not allowed"));
            return out;
        }

        let method = header_str(request, header::ACCESS_CONTROL_REQUEST_METHOD.as_str()).unwrap_or("");
        if !self.is_method_allowed(method) {
            self.logf(format_args!("Preflight aborted: method '{method}' not allowed"));
            return out;
        }

        let requested = requested_headers(request);
        if !self.are_headers_allowed(&requested) {
            self.logf(format_args!("Preflight aborted: headers '{requested:?}' not allowed"));
            return out;
        }

        self.insert_allow_origin(&mut out, origin);
        if let Ok(value) = HeaderValue::from_str(&method.to_ascii_uppercase()) {
            out.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        if !requested.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&requested.join(", ")) {
                out.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
            }
        }
        if self.allow_credentials {
            out.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        if self.allow_private_network
            && header_str(request, headers::REQUEST_PRIVATE_NETWORK) == Some("true")
        {
            out.insert(headers::ALLOW_PRIVATE_NETWORK, HeaderValue::from_static("true"));
        }
        if self.max_age > 0 {
            out.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.max_age));
        }

        self.logf(format_args!("Preflight response headers: {out:?}"));
        out
    }

    fn actual_headers(&self, method: &Method, request: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::new();
        out.append(header::VARY, HeaderValue::from_static("Origin"));

        let origin = match header_str(request, header::ORIGIN.as_str()) {
            Some(origin) if !origin.is_empty() => origin,
            _ => {
                self.logf(format_args!("Actual request no headers added: missing origin"));
                return out;
            }
        };
        if !self.is_origin_allowed(origin) {
            self.logf(format_args!(
                "Actual request no headers added: origin '{origin}' not allowed"
            ));
            return out;
        }
        if !self.is_method_allowed(method.as_str()) {
            self.logf(format_args!(
                "Actual request no headers added: method '{method}' not allowed"
            ));
            return out;
        }

        self.insert_allow_origin(&mut out, origin);
        if let Some(exposed) = &self.exposed_headers {
            out.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, exposed.clone());
        }
        if self.allow_credentials {
            out.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }

        self.logf(format_args!("Actual response added headers: {out:?}"));
        out
    }

    fn insert_allow_origin(&self, out: &mut HeaderMap, origin: &str) {
        if self.allows_all_origins() {
            out.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        } else if let Ok(value) = HeaderValue::from_str(origin) {
            out.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
    }

    /// Runs the CORS checks around `next`.
    ///
    /// Answered preflights never call `next`. Everything else calls it
    /// exactly once and gets the CORS headers added to its response.
    pub async fn handle<F, Fut>(&self, request: Request, next: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        match self.evaluate(&request) {
            CorsDecision::Preflight(headers) if !self.options_passthrough => {
                let mut response = http::Response::new(Full::new(Bytes::new()));
                *response.status_mut() = self.success_status;
                apply_headers(&headers, &mut response);
                response
            }
            CorsDecision::Preflight(headers) | CorsDecision::Actual(headers) => {
                let mut response = next(request).await;
                apply_headers(&headers, &mut response);
                response
            }
        }
    }

    /// Wraps `handler` so every request goes through [`CorsEngine::handle`].
    pub fn wrap(self: Arc<Self>, handler: BoxHandler) -> BoxHandler {
        handler_fn(move |request: Request| {
            let engine = Arc::clone(&self);
            let handler = Arc::clone(&handler);
            async move { engine.handle(request, |req| handler.call(req)).await }
        })
    }

    /// Sends one diagnostic line per decision to `writer`.
    pub fn set_log_writer<W: Write + Send + 'static>(&mut self, writer: W) {
        self.log = Some(Mutex::new(Box::new(writer)));
    }

    /// Returns `true` if a diagnostic writer is attached.
    pub fn has_log_writer(&self) -> bool {
        self.log.is_some()
    }

    /// Returns `true` if a debug bridge relays this engine's diagnostics.
    pub fn has_debug_bridge(&self) -> bool {
        self.bridge.is_some()
    }

    pub(crate) fn set_bridge(&mut self, bridge: LogBridge) {
        self.bridge = Some(bridge);
    }

    fn logf(&self, args: fmt::Arguments<'_>) {
        let Some(log) = &self.log else {
            return;
        };
        // One write per line keeps lines whole on the other end of a pipe.
        let line = format!("[cors] {args}\n");
        if let Err(e) = log.lock().write_all(line.as_bytes()) {
            tracing::trace!(error = %e, "Dropped CORS diagnostic line");
        }
    }
}

/// Builds the engine for `policy`.
///
/// `max_age` is truncated to whole seconds.
pub fn build_engine(policy: &CorsPolicy) -> CorsEngine {
    CorsEngine::new(CorsOptions {
        allowed_origins: policy.allow_origins.clone(),
        allow_origin_func: origin_predicate(policy),
        allowed_methods: policy.allow_methods.clone(),
        allowed_headers: policy.allow_headers.clone(),
        exposed_headers: policy.expose_headers.clone(),
        allow_credentials: policy.allow_credentials,
        allow_private_network: policy.allow_private_network,
        max_age: policy.max_age.as_secs(),
        options_passthrough: policy.options_passthrough,
        options_success_status: policy.options_success_status,
    })
}

/// Joins the valid entries of `names`. Invalid ones are skipped with a warning.
fn expose_header_value(names: &[String]) -> Option<HeaderValue> {
    let valid: Vec<&str> = names
        .iter()
        .map(|name| name.trim())
        .filter(|name| {
            let ok = !name.is_empty() && HeaderValue::from_str(name).is_ok();
            if !ok {
                tracing::warn!(header = %name, "Skipping invalid CORS expose header");
            }
            ok
        })
        .collect();
    if valid.is_empty() {
        return None;
    }
    HeaderValue::from_str(&valid.join(", ")).ok()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn requested_headers(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .collect()
}

fn apply_headers(headers: &HeaderMap, response: &mut Response) {
    let target = response.headers_mut();
    for (name, value) in headers {
        if name == header::VARY {
            target.append(name.clone(), value.clone());
        } else {
            target.insert(name.clone(), value.clone());
        }
    }
}
