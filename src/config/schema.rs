//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Public-facing identity of the proxy.
    pub public: PublicConfig,

    /// Upstream (backend-facing) settings.
    pub upstream: UpstreamConfig,

    /// Statically registered services.
    pub services: Vec<ServiceConfig>,

    /// Additional blocked service names, on top of the built-in list.
    pub blocklist: Vec<String>,

    /// Fallback resolution for unregistered names.
    pub fallback: FallbackConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request limits.
    pub limits: LimitsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// How the proxy is reached by browsers.
///
/// TLS is terminated externally; the proxy only needs to know the host and
/// scheme clients use, for cookie-domain and Referer rewriting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublicConfig {
    /// Public hostname (e.g., "apps.example.com"). Used when the inbound
    /// request carries no Host header.
    pub host: String,

    /// Scheme clients use to reach the proxy. The proxy cannot observe the
    /// original scheme behind a TLS terminator, so this configured value is
    /// what `X-Forwarded-Proto` carries on the backend leg.
    pub scheme: String,
}

impl Default for PublicConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            scheme: "https".to_string(),
        }
    }
}

/// Settings for the backend-facing leg.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Scheme used for outbound backend calls.
    pub scheme: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
        }
    }
}

/// A single service definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service name; becomes the `/{name}/...` path prefix.
    pub name: String,

    /// Target host the backend actually lives on.
    pub target: String,

    /// Optional base path on the target host (e.g., "/app").
    #[serde(default)]
    pub base_path: Option<String>,

    /// Optional human-readable description for the listing page.
    #[serde(default)]
    pub description: Option<String>,

    /// Display rank on the listing page (lower sorts first).
    #[serde(default)]
    pub rank: Option<u32>,
}

/// Fallback resolution for names absent from the static map.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Enable fallback resolution.
    pub enabled: bool,

    /// Host pattern with a `{name}` placeholder
    /// (e.g., "{name}.up.railway.app").
    pub host_pattern: String,

    /// Existence probe timeout in seconds.
    pub probe_timeout_secs: u64,

    /// Body substrings that mark a probe response as "not found" even when
    /// the status is not 404 (some platforms answer 200 with an error page).
    pub not_found_markers: Vec<String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host_pattern: String::new(),
            probe_timeout_secs: 3,
            not_found_markers: vec!["Application not found".to_string()],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Capture recent log lines in memory and serve them at `/_logs`.
    pub log_buffer_enabled: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_buffer_enabled: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}
