//! Multi-tenant path-prefix reverse proxy library.
//!
//! Mounts independent backend services under `/service-name/` path
//! prefixes on a single public origin, rewriting bodies, redirects and
//! cookies so backends built for a root origin work unmodified.

pub mod config;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod rewrite;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use registry::ServiceRegistry;
