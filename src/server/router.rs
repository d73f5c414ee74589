//! Axum router configuration
//!
//! ```text
//! /
//! ├── /api/*    - Filesystem calls, binary response frames
//! └── /health   - Liveness check (JSON)
//! ```

use axum::Router;
use axum::routing::get;
use vtfs_core::StorageBackend;

use super::AppState;
use crate::handlers::fs;
use crate::handlers::health::health;
use crate::middleware::request_id;

/// Build the complete router with all routes and the request-id layer
pub fn build_router<B: StorageBackend>(state: AppState<B>) -> Router {
    Router::new()
        .nest("/api", fs_api_router(state))
        .route("/health", get(health))
        .layer(axum::middleware::from_fn(request_id))
}

/// Filesystem API routes
///
/// Routes:
/// - `GET /api/init` - Create a namespace
/// - `GET /api/get_root` - Root metadata, creating the namespace on first use
/// - `GET /api/lookup` - Resolve a name in a directory
/// - `GET /api/iterate_dir` - Entry at a cursor offset
/// - `GET /api/create_file` / `GET /api/mkdir` - Create a node
/// - `GET /api/unlink` / `GET /api/rmdir` - Remove an entry
/// - `GET /api/read` / `GET /api/write` - File content
/// - `GET /api/link` - Add a hard link
/// - `GET /api/count_links` - Reference count of an inode
fn fs_api_router<B: StorageBackend>(state: AppState<B>) -> Router {
    Router::new()
        .route("/init", get(fs::init::<B>))
        .route("/get_root", get(fs::get_root::<B>))
        .route("/lookup", get(fs::lookup::<B>))
        .route("/iterate_dir", get(fs::iterate_dir::<B>))
        .route("/create_file", get(fs::create_file::<B>))
        .route("/mkdir", get(fs::mkdir::<B>))
        .route("/unlink", get(fs::unlink::<B>))
        .route("/rmdir", get(fs::rmdir::<B>))
        .route("/read", get(fs::read::<B>))
        .route("/write", get(fs::write::<B>))
        .route("/link", get(fs::link::<B>))
        .route("/count_links", get(fs::count_links::<B>))
        .with_state(state)
}
