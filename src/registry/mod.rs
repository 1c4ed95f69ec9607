//! Service name resolution.
//!
//! # Responsibilities
//! - Map service names to their backend targets
//! - Enforce the reserved-name blocklist
//! - Optionally probe a patterned fallback host for unregistered names
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Blocklist beats registry contents: a registered reserved name stays 403
//! - Duplicate definitions: first occurrence wins, later ones warn
//! - Invalid names (containing `/` or `.`) are dropped at build time

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::config::schema::{FallbackConfig, ServiceConfig};

/// Names that are never proxied, regardless of configuration.
pub const DEFAULT_BLOCKLIST: &[&str] = &["www", "mail", "ftp", "ssh"];

/// A resolved service: where requests for `/{name}/...` go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub name: String,
    pub target_host: String,
    /// Path prefix on the target host, "" or "/some/base".
    pub base_path: String,
    pub description: Option<String>,
    pub rank: u32,
}

/// Rank assigned to services without an explicit one; sorts last.
const UNRANKED: u32 = 999;

/// Outcome of a registry lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(ServiceEntry),
    Blocked,
    Unknown,
}

/// Immutable name → target mapping, built once at startup.
#[derive(Debug)]
pub struct ServiceRegistry {
    entries: HashMap<String, ServiceEntry>,
    blocked: HashSet<String>,
}

impl ServiceRegistry {
    /// Build the registry from configured service definitions.
    pub fn from_services(services: &[ServiceConfig], extra_blocked: &[String]) -> Self {
        let mut entries: HashMap<String, ServiceEntry> = HashMap::new();

        for svc in services {
            if svc.name.contains('/') || svc.name.contains('.') || svc.name.is_empty() {
                tracing::warn!(name = %svc.name, "Invalid service name, skipping");
                continue;
            }
            if let Some(existing) = entries.get(&svc.name) {
                tracing::warn!(
                    name = %svc.name,
                    kept = %existing.target_host,
                    ignored = %svc.target,
                    "Duplicate service definition ignored"
                );
                continue;
            }
            entries.insert(
                svc.name.clone(),
                ServiceEntry {
                    name: svc.name.clone(),
                    target_host: svc.target.clone(),
                    base_path: svc.base_path.clone().unwrap_or_default(),
                    description: svc.description.clone(),
                    rank: svc.rank.unwrap_or(UNRANKED),
                },
            );
        }

        let blocked = DEFAULT_BLOCKLIST
            .iter()
            .map(|s| s.to_string())
            .chain(extra_blocked.iter().cloned())
            .collect();

        Self { entries, blocked }
    }

    /// Resolve a service name.
    ///
    /// The blocklist is checked first so reserved names return `Blocked`
    /// even when a matching entry exists.
    pub fn resolve(&self, name: &str) -> Resolution {
        if self.blocked.contains(name) {
            return Resolution::Blocked;
        }
        match self.entries.get(name) {
            Some(entry) => Resolution::Found(entry.clone()),
            None => Resolution::Unknown,
        }
    }

    /// All entries ordered for display: rank ascending, then name.
    pub fn entries_by_rank(&self) -> Vec<&ServiceEntry> {
        let mut entries: Vec<&ServiceEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves unregistered names by probing a patterned host.
///
/// The pattern carries a `{name}` placeholder; a GET to the derived host
/// with a short timeout decides whether the service exists. A 404, a
/// configured "not found" body marker, or any transport failure all mean
/// the name stays unknown.
pub struct FallbackResolver {
    client: reqwest::Client,
    scheme: String,
    host_pattern: String,
    not_found_markers: Vec<String>,
}

impl FallbackResolver {
    /// Build a resolver from config, or `None` when fallback is disabled
    /// or the pattern is unusable.
    pub fn from_config(config: &FallbackConfig, scheme: &str) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        if !config.host_pattern.contains("{name}") {
            tracing::warn!(
                pattern = %config.host_pattern,
                "Fallback host pattern has no {{name}} placeholder, fallback disabled"
            );
            return None;
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .ok()?;
        Some(Self {
            client,
            scheme: scheme.to_string(),
            host_pattern: config.host_pattern.clone(),
            not_found_markers: config.not_found_markers.clone(),
        })
    }

    /// Probe the derived host for existence.
    pub async fn probe(&self, name: &str) -> Option<ServiceEntry> {
        let host = self.host_pattern.replace("{name}", name);
        let url = format!("{}://{}/", self.scheme, host);

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(error) => {
                tracing::debug!(service = %name, host = %host, %error, "Fallback probe failed");
                return None;
            }
        };

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(service = %name, host = %host, "Fallback probe got 404");
            return None;
        }

        let body = response.text().await.unwrap_or_default();
        if self.not_found_markers.iter().any(|m| body.contains(m)) {
            tracing::debug!(service = %name, host = %host, "Fallback probe body marked not-found");
            return None;
        }

        tracing::info!(service = %name, host = %host, "Resolved service via fallback probe");
        Some(ServiceEntry {
            name: name.to_string(),
            target_host: host,
            base_path: String::new(),
            description: None,
            rank: UNRANKED,
        })
    }
}
