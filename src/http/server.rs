//! HTTP server setup and per-request orchestration.
//!
//! # Responsibilities
//! - Create the Axum router and wire up middleware (trace, timeout, ID)
//! - Resolve the service for each inbound request
//! - Drive forward → decompress → rewrite → respond
//! - Convert every failure into exactly one client-facing error
//!
//! Per-request flow (no state is ever retried):
//! resolve → {403 | 404 | forward} → {504 | 502 | rewrite} → respond.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Request, Response, StatusCode},
    response::{Html, IntoResponse},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::forward::{parse_cookie_header, BackendResponse, Forwarder, ProxyRequest};
use crate::http::error::ProxyError;
use crate::http::pages;
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::observability::{logging, metrics};
use crate::registry::{FallbackResolver, Resolution, ServiceRegistry};
use crate::rewrite::{self, content, headers as header_rewrite, ContentCategory, RewriteContext};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
    pub forwarder: Arc<Forwarder>,
    pub fallback: Option<Arc<FallbackResolver>>,
    pub config: Arc<ProxyConfig>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, crate::forward::ForwardError> {
        let registry = Arc::new(ServiceRegistry::from_services(
            &config.services,
            &config.blocklist,
        ));
        let forwarder = Arc::new(Forwarder::new(
            &config.upstream,
            &config.public.host,
            &config.public.scheme,
        )?);
        let fallback =
            FallbackResolver::from_config(&config.fallback, &config.upstream.scheme).map(Arc::new);

        let state = AppState {
            registry,
            forwarder,
            fallback,
            config: Arc::new(config),
        };
        let router = Self::build_router(state);
        Ok(Self { router })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        // The outer timeout sits above the forwarder's own, with margin, so
        // backend stalls surface as classified 504s rather than layer 408s.
        let outer_timeout = state.config.upstream.request_timeout_secs + 5;
        Router::new()
            .route("/", any(home_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(outer_timeout)))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Landing page: status and service listing.
async fn home_handler(State(state): State<AppState>) -> Html<String> {
    let entries = state.registry.entries_by_rank();
    Html(pages::home_page(&entries, env!("CARGO_PKG_VERSION")))
}

/// Main proxy handler: resolve, forward, rewrite, respond.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response<Body> {
    let start = Instant::now();
    let request_id = request.request_id().to_string();

    let path = request.uri().path().to_string();
    let trimmed = path.trim_start_matches('/');
    let (service, remainder) = match trimmed.split_once('/') {
        Some((service, rest)) => (service.to_string(), rest.to_string()),
        None => (trimmed.to_string(), String::new()),
    };
    let method_str = request.method().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method_str,
        service = %service,
        path = %path,
        "Proxying request"
    );

    // Bot files at the root (favicon.ico, robots.txt) are not services.
    if service.contains('.') {
        metrics::record_request(&method_str, 404, "none", start);
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    // The in-memory log viewer occupies a reserved internal name.
    if service == "_logs" {
        return logs_response(&state, &method_str, start);
    }

    let entry = match state.registry.resolve(&service) {
        Resolution::Found(entry) => entry,
        Resolution::Blocked => {
            tracing::warn!(request_id = %request_id, service = %service, "Blocked service name");
            metrics::record_request(&method_str, 403, &service, start);
            return ProxyError::Blocked(service).into_response();
        }
        Resolution::Unknown => {
            let probed = match &state.fallback {
                Some(fallback) => fallback.probe(&service).await,
                None => None,
            };
            match probed {
                Some(entry) => entry,
                None => {
                    tracing::info!(request_id = %request_id, service = %service, "Unknown service");
                    metrics::record_request(&method_str, 404, &service, start);
                    return ProxyError::UnknownService(service).into_response();
                }
            }
        }
    };

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.config.limits.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            metrics::record_request(&method_str, 413, &service, start);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let cookies = parts
        .headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(parse_cookie_header)
        .unwrap_or_default();
    let inbound_host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let proxy_request = ProxyRequest {
        method: parts.method,
        remainder,
        query: parts.uri.query().map(|q| q.to_string()),
        headers: parts.headers,
        cookies,
        body,
        inbound_host,
    };

    let ctx = state.forwarder.rewrite_context(&entry);
    let backend = match state.forwarder.forward(proxy_request, &entry).await {
        Ok(response) => response,
        Err(error) => {
            tracing::error!(
                request_id = %request_id,
                service = %service,
                target = %entry.target_host,
                %error,
                "Forwarding failed"
            );
            let proxy_error = ProxyError::from_forward(error, &service);
            metrics::record_request(&method_str, proxy_error.status().as_u16(), &service, start);
            return proxy_error.into_response();
        }
    };

    let status = backend.status;
    let response = match finalize_response(backend, &ctx, state.forwarder.public_host()) {
        Ok(response) => response,
        Err(proxy_error) => {
            tracing::error!(request_id = %request_id, service = %service, error = %proxy_error, "Rewrite failed");
            metrics::record_request(&method_str, proxy_error.status().as_u16(), &service, start);
            return proxy_error.into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        service = %service,
        status = status.as_u16(),
        "Responding"
    );
    metrics::record_request(&method_str, status.as_u16(), &service, start);
    response
}

fn logs_response(state: &AppState, method: &str, start: Instant) -> Response<Body> {
    if !state.config.observability.log_buffer_enabled {
        metrics::record_request(method, 404, "_logs", start);
        return (
            StatusCode::NOT_FOUND,
            "Logs service not enabled. Set observability.log_buffer_enabled to enable.",
        )
            .into_response();
    }
    metrics::record_request(method, 200, "_logs", start);
    Html(pages::logs_page(&logging::recent_lines())).into_response()
}

/// Decompress, rewrite, and re-head the backend response.
fn finalize_response(
    backend: BackendResponse,
    ctx: &RewriteContext,
    public_host: &str,
) -> Result<Response<Body>, ProxyError> {
    let category = ContentCategory::from_content_type(backend.content_type());
    let encoding = backend
        .content_encoding()
        .filter(|e| !e.eq_ignore_ascii_case("identity"))
        .map(|e| e.to_string());

    let mut body: Bytes = backend.body;
    let mut dropped_encoding = false;

    // An encoding the rewriter cannot undo forces opaque passthrough even
    // for textual types.
    let rewritable = category.is_textual()
        && encoding
            .as_deref()
            .map(rewrite::is_supported_encoding)
            .unwrap_or(true);

    if rewritable {
        if let Some(encoding) = &encoding {
            let decoded = rewrite::decode_body(&body, encoding)
                .map_err(|e| ProxyError::Upstream(format!("decompression failed: {e}")))?;
            body = Bytes::from(decoded);
            dropped_encoding = true;
        }
        let text = String::from_utf8_lossy(&body);
        let rewritten = content::rewrite(&text, category, ctx);
        body = Bytes::from(rewritten.into_bytes());
    }

    let mut response = Response::builder().status(backend.status);
    let response_headers = response
        .headers_mut()
        .ok_or_else(|| ProxyError::Upstream("response build failed".to_string()))?;
    copy_response_headers(response_headers, &backend.headers, ctx, public_host, dropped_encoding);

    response
        .body(Body::from(body))
        .map_err(|e| ProxyError::Upstream(e.to_string()))
}

/// Copy backend headers, rewriting Location and Set-Cookie and dropping the
/// hop-by-hop set (plus Content-Encoding once decompressed).
fn copy_response_headers(
    out: &mut HeaderMap,
    upstream: &HeaderMap,
    ctx: &RewriteContext,
    public_host: &str,
    dropped_encoding: bool,
) {
    for (name, value) in upstream.iter() {
        if header_rewrite::is_stripped_response_header(name) {
            continue;
        }
        if dropped_encoding && name == header::CONTENT_ENCODING {
            continue;
        }
        if name == header::LOCATION {
            if let Ok(location) = value.to_str() {
                let rewritten = header_rewrite::rewrite_location(location, ctx);
                if let Ok(v) = rewritten.parse() {
                    out.insert(header::LOCATION, v);
                    continue;
                }
            }
        }
        if name == header::SET_COOKIE {
            // Each Set-Cookie forwards independently; merging loses cookies.
            if let Ok(cookie) = value.to_str() {
                let rewritten = header_rewrite::rewrite_set_cookie(cookie, ctx, public_host);
                if let Ok(v) = rewritten.parse() {
                    out.append(header::SET_COOKIE, v);
                    continue;
                }
            }
        }
        out.append(name.clone(), value.clone());
    }
}
