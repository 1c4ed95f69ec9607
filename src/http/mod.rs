//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → server.rs (Axum setup, per-request orchestration)
//!     → request.rs (request ID)
//!     → [registry resolves the service]
//!     → [forwarder sends the backend call]
//!     → [rewrite transforms body and headers]
//!     → Send to client
//! ```

pub mod error;
pub mod pages;
pub mod request;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::HttpServer;
