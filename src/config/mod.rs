//! Configuration subsystem.
//!
//! # Responsibilities
//! - Define the TOML configuration schema (serde)
//! - Load and parse configuration files
//! - Merge `SERVICE_*` environment variable definitions
//!
//! # Design Decisions
//! - Everything has a sane default; an empty config file is valid
//! - Service definitions are validated at load time, not at request time
//! - Duplicate service names: first occurrence wins, later ones warn

pub mod loader;
pub mod schema;

pub use loader::{load_config, services_from_env, ConfigError};
pub use schema::{FallbackConfig, ProxyConfig, ServiceConfig};
