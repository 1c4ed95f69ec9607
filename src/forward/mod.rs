//! Outbound request forwarding.
//!
//! # Responsibilities
//! - Build the backend URL from a service entry and the remainder path
//! - Translate request headers between the two address spaces
//! - Send the call with an explicit timeout, never following redirects
//! - Classify transport failures into terminal kinds
//!
//! # Design Decisions
//! - Cookies travel through a rebuilt Cookie header from the flat map, not
//!   the raw inbound header
//! - Accept-Encoding is pinned to the encodings the rewriter can undo
//! - No retries: one failure, one classified error, one response

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use url::Url;

use crate::config::schema::UpstreamConfig;
use crate::registry::ServiceEntry;
use crate::rewrite::RewriteContext;

/// An inbound request reduced to what the backend call needs.
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path with the leading `/{service}/` segment stripped, no leading `/`.
    pub remainder: String,
    /// Raw query string, forwarded verbatim.
    pub query: Option<String>,
    /// Inbound headers; hop-by-hop entries are filtered at forward time.
    pub headers: HeaderMap,
    /// Flat cookie name→value pairs; attributes are never forwarded inbound.
    pub cookies: Vec<(String, String)>,
    pub body: Bytes,
    /// Host header the client used, for X-Forwarded-Host.
    pub inbound_host: Option<String>,
}

/// What came back from the backend, owned by this request.
#[derive(Debug)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
    }
}

/// Terminal forwarding failures.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("backend request timed out")]
    Timeout,
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("forwarding failed: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for ForwardError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Unreachable(error.to_string())
        } else {
            Self::Unknown(error.to_string())
        }
    }
}

/// Inbound request headers that never reach the backend verbatim.
fn is_skipped_request_header(name: &header::HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection" | "host" | "cookie" | "content-length" | "accept-encoding"
    )
}

/// Sends backend calls on behalf of the proxy.
pub struct Forwarder {
    client: reqwest::Client,
    scheme: String,
    public_host: String,
    public_scheme: String,
}

impl Forwarder {
    pub fn new(
        upstream: &UpstreamConfig,
        public_host: &str,
        public_scheme: &str,
    ) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(upstream.connect_timeout_secs))
            .timeout(Duration::from_secs(upstream.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ForwardError::Unknown(e.to_string()))?;
        Ok(Self {
            client,
            scheme: upstream.scheme.clone(),
            public_host: public_host.to_string(),
            public_scheme: public_scheme.to_string(),
        })
    }

    /// Forward one request to the resolved backend.
    pub async fn forward(
        &self,
        request: ProxyRequest,
        entry: &ServiceEntry,
    ) -> Result<BackendResponse, ForwardError> {
        let mut url = format!(
            "{}://{}{}/{}",
            self.scheme, entry.target_host, entry.base_path, request.remainder
        );
        if let Some(query) = &request.query {
            url.push('?');
            url.push_str(query);
        }

        let headers = self.translate_request_headers(&request, entry);

        tracing::debug!(
            service = %entry.name,
            method = %request.method,
            url = %url,
            "Forwarding to backend"
        );

        let response = self
            .client
            .request(request.method, &url)
            .headers(headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(BackendResponse {
            status,
            headers,
            body,
        })
    }

    /// A rewrite context for a resolved entry (shared by content and
    /// header rewriting downstream of the forward).
    pub fn rewrite_context(&self, entry: &ServiceEntry) -> RewriteContext {
        RewriteContext {
            service: entry.name.clone(),
            target_host: entry.target_host.clone(),
        }
    }

    pub fn public_host(&self) -> &str {
        &self.public_host
    }

    fn translate_request_headers(
        &self,
        request: &ProxyRequest,
        entry: &ServiceEntry,
    ) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in request.headers.iter() {
            if is_skipped_request_header(name) {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        if let Ok(host) = HeaderValue::from_str(&entry.target_host) {
            headers.insert(header::HOST, host);
        }

        let forwarded_host = request
            .inbound_host
            .clone()
            .unwrap_or_else(|| self.public_host.clone());
        if let Ok(value) = HeaderValue::from_str(&forwarded_host) {
            headers.insert("x-forwarded-host", value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.public_scheme) {
            headers.insert("x-forwarded-proto", value);
        }

        // Undo the proxy prefix on Referer before the backend sees it.
        if let Some(referer) = request.headers.get(header::REFERER).and_then(|v| v.to_str().ok())
        {
            if let Some(rewritten) = rewrite_referer(
                referer,
                &forwarded_host,
                &entry.name,
                &self.scheme,
                &entry.target_host,
            ) {
                if let Ok(value) = HeaderValue::from_str(&rewritten) {
                    headers.insert(header::REFERER, value);
                }
            }
        }

        if request.headers.contains_key(header::ORIGIN) {
            let origin = format!("{}://{}", self.scheme, entry.target_host);
            if let Ok(value) = HeaderValue::from_str(&origin) {
                headers.insert(header::ORIGIN, value);
            }
        }

        // Only encodings the rewriter can undo.
        headers.insert(
            header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        if !request.cookies.is_empty() {
            let cookie_line = request
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            if let Ok(value) = HeaderValue::from_str(&cookie_line) {
                headers.insert(header::COOKIE, value);
            }
        }

        headers
    }
}

/// Rewrite a Referer pointing at `https://<proxy-host>/<service>/...` to the
/// backend's own address space. Returns `None` when the value does not
/// reference this service through the proxy.
pub fn rewrite_referer(
    referer: &str,
    public_host: &str,
    service: &str,
    upstream_scheme: &str,
    target_host: &str,
) -> Option<String> {
    let parsed = Url::parse(referer).ok()?;
    if parsed.host_str() != Some(public_host.split(':').next().unwrap_or(public_host)) {
        return None;
    }
    let path = parsed.path();
    let prefix = format!("/{service}");
    let rest = path.strip_prefix(&prefix)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }
    let rest = if rest.is_empty() { "/" } else { rest };
    let mut rewritten = format!("{upstream_scheme}://{target_host}{rest}");
    if let Some(query) = parsed.query() {
        rewritten.push('?');
        rewritten.push_str(query);
    }
    Some(rewritten)
}

/// Parse an inbound Cookie header into flat name→value pairs.
pub fn parse_cookie_header(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}
