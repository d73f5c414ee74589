//! HTTP transport for the filesystem service
//!
//! Every filesystem call is a `GET /api/<call>` whose body is a binary
//! response frame. Orchestrator calls are synchronous and run on the
//! blocking pool; one that outlives the configured request timeout is
//! logged and left to finish.

mod lifecycle;
mod router;

use std::time::Duration;

use tracing::Instrument;
use vtfs_core::Errno;
use vtfs_core::FsError;
use vtfs_core::ResponseFrame;
use vtfs_core::StorageBackend;
use vtfs_service::FileSystemService;

pub use lifecycle::serve;
pub use lifecycle::serve_with_shutdown;
pub use lifecycle::shutdown_signal;
pub use router::build_router;

/// Shared state handed to every handler
pub struct AppState<B> {
    service: FileSystemService<B>,
    request_timeout: Duration,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl<B: StorageBackend> AppState<B> {
    pub fn new(service: FileSystemService<B>, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
        }
    }

    pub fn service(&self) -> &FileSystemService<B> {
        &self.service
    }

    /// Run one orchestrator call on the blocking pool.
    ///
    /// Domain errors come back as their error frame and a panicked call
    /// yields the catch-all `ENOMEM` frame. A call that outlives the request
    /// timeout is logged and still awaited: its transaction may already have
    /// committed, so only its own outcome is reported.
    pub async fn run<T, F>(&self, op: &'static str, call: F) -> Result<T, ResponseFrame>
    where
        T: Send + 'static,
        F: FnOnce(&FileSystemService<B>) -> Result<T, FsError> + Send + 'static,
    {
        let service = self.service.clone();
        let span = tracing::Span::current();
        let mut task = tokio::task::spawn_blocking(move || span.in_scope(|| call(&service)));

        let joined = match tokio::time::timeout(self.request_timeout, &mut task).in_current_span().await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(
                    op,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "operation exceeded request timeout, awaiting its outcome"
                );
                task.in_current_span().await
            }
        };

        match joined {
            Ok(result) => result.map_err(|err| ResponseFrame::error(&err)),
            Err(join_err) => {
                tracing::error!(op, error = %join_err, "operation task failed");
                Err(ResponseFrame::Err(Errno::Enomem.wire_code()))
            }
        }
    }
}
