//! Client-facing error kinds.
//!
//! Every failure at the resolution, forwarding, or rewriting boundary is
//! converted into exactly one of these before leaving the proxy; nothing
//! escapes as an unhandled fault.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::forward::ForwardError;
use crate::http::pages;

/// Terminal per-request outcomes that are not backend responses.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("service \"{0}\" is reserved")]
    Blocked(String),

    #[error("unknown service \"{0}\"")]
    UnknownService(String),

    #[error("backend for \"{0}\" timed out")]
    Timeout(String),

    #[error("backend for \"{service}\" unreachable: {detail}")]
    Unreachable { service: String, detail: String },

    #[error("{0}")]
    Upstream(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Blocked(_) => StatusCode::FORBIDDEN,
            Self::UnknownService(_) => StatusCode::NOT_FOUND,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Unreachable { .. } | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Attach the service name to a classified forward failure.
    pub fn from_forward(error: ForwardError, service: &str) -> Self {
        match error {
            ForwardError::Timeout => Self::Timeout(service.to_string()),
            ForwardError::Unreachable(detail) => Self::Unreachable {
                service: service.to_string(),
                detail,
            },
            ForwardError::Unknown(detail) => Self::Upstream(detail),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            // Unknown services get a friendly page naming the service, not
            // a bare status.
            Self::UnknownService(service) => (
                status,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                pages::service_not_found_page(service),
            )
                .into_response(),
            _ => (
                status,
                axum::Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
        }
    }
}
