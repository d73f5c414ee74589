//! vtfs server
//!
//! HTTP transport, configuration and process wiring for the vtfs
//! filesystem service. Filesystem semantics live in `vtfs-service`,
//! storage in `vtfs-core` (traits, in-memory backend) and
//! `vtfs-redb-storage` (durable backend).

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use config::AppConfig;
pub use server::AppState;
pub use server::build_router;
