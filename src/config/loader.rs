//! Configuration loading from disk and environment.
//!
//! Services can be defined in the TOML file or through environment
//! variables in the form `SERVICE_<NAME>=target.host[/base/path]`, with
//! optional `SERVICE_<NAME>_DESC` and `SERVICE_<NAME>_RANK` companions.
//! Environment definitions are appended after the file's; the registry
//! applies first-occurrence-wins on duplicates.

use std::fs;
use std::path::Path;

use crate::config::schema::{ProxyConfig, ServiceConfig};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load configuration from a TOML file and merge `SERVICE_*` env vars.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: ProxyConfig = toml::from_str(&content)?;
    config.services.extend(services_from_env());
    Ok(config)
}

/// Collect service definitions from the process environment.
pub fn services_from_env() -> Vec<ServiceConfig> {
    services_from_pairs(std::env::vars())
}

/// Parse `SERVICE_*` definitions out of key-value pairs.
///
/// Names are lowercased: env keys are conventionally uppercase while the
/// proxy's path prefixes are lowercase.
pub fn services_from_pairs(
    vars: impl Iterator<Item = (String, String)>,
) -> Vec<ServiceConfig> {
    let pairs: Vec<(String, String)> = vars.collect();
    let mut services = Vec::new();

    for (key, value) in &pairs {
        let Some(raw_name) = key.strip_prefix("SERVICE_") else {
            continue;
        };
        if raw_name.ends_with("_DESC") || raw_name.ends_with("_RANK") {
            continue;
        }
        let name = raw_name.to_lowercase();

        // "target.host/base/path" splits into host and base path.
        let (target, base_path) = match value.split_once('/') {
            Some((host, base)) => (host.to_string(), Some(format!("/{base}"))),
            None => (value.clone(), None),
        };

        let desc_key = format!("SERVICE_{raw_name}_DESC");
        let description = pairs
            .iter()
            .find(|(k, _)| *k == desc_key)
            .map(|(_, v)| v.clone());

        let rank_key = format!("SERVICE_{raw_name}_RANK");
        let rank = pairs
            .iter()
            .find(|(k, _)| *k == rank_key)
            .and_then(|(_, v)| v.parse::<u32>().ok());

        services.push(ServiceConfig {
            name,
            target,
            base_path,
            description,
            rank,
        });
    }

    services
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> impl Iterator<Item = (String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_plain_target() {
        let services = services_from_pairs(pairs(&[("SERVICE_BLOG", "blog.internal")]));
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "blog");
        assert_eq!(services[0].target, "blog.internal");
        assert_eq!(services[0].base_path, None);
    }

    #[test]
    fn splits_base_path() {
        let services =
            services_from_pairs(pairs(&[("SERVICE_WIKI", "wiki.internal/docs/site")]));
        assert_eq!(services[0].target, "wiki.internal");
        assert_eq!(services[0].base_path.as_deref(), Some("/docs/site"));
    }

    #[test]
    fn picks_up_description_and_rank() {
        let services = services_from_pairs(pairs(&[
            ("SERVICE_BLOG", "blog.internal"),
            ("SERVICE_BLOG_DESC", "My blog"),
            ("SERVICE_BLOG_RANK", "2"),
        ]));
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].description.as_deref(), Some("My blog"));
        assert_eq!(services[0].rank, Some(2));
    }

    #[test]
    fn bad_rank_is_ignored() {
        let services = services_from_pairs(pairs(&[
            ("SERVICE_BLOG", "blog.internal"),
            ("SERVICE_BLOG_RANK", "first"),
        ]));
        assert_eq!(services[0].rank, None);
    }

    #[test]
    fn unrelated_vars_are_skipped() {
        let services = services_from_pairs(pairs(&[
            ("PATH", "/usr/bin"),
            ("SERVICE_BLOG_DESC", "orphan description"),
        ]));
        assert!(services.is_empty());
    }

    #[test]
    fn toml_round_trip() {
        let toml_src = r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [public]
            host = "apps.example.com"

            [[services]]
            name = "blog"
            target = "blog.internal"
            description = "Blog"
            rank = 1
        "#;
        let config: ProxyConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.public.host, "apps.example.com");
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0].name, "blog");
        assert_eq!(config.upstream.request_timeout_secs, 30);
    }
}
