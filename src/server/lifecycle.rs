//! Server lifecycle coordination
//!
//! Serves until SIGINT/SIGTERM, then drains in-flight requests for at most
//! the configured shutdown timeout.

use std::future::Future;
use std::future::IntoFuture;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Serve `router` until a shutdown signal arrives.
pub async fn serve(listener: TcpListener, router: Router, shutdown_timeout: Duration) -> Result<()> {
    serve_with_shutdown(listener, router, shutdown_signal(), shutdown_timeout).await
}

/// Serve `router` until `shutdown` resolves.
///
/// Once shutdown starts, connections get `shutdown_timeout` to finish before
/// the server is dropped.
pub async fn serve_with_shutdown(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
    shutdown_timeout: Duration,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "vtfs server listening");
    }

    let (started_tx, mut started_rx) = watch::channel(false);
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutdown signal received, draining connections");
            let _ = started_tx.send(true);
        })
        .into_future();
    tokio::pin!(server);

    let drain_deadline = async move {
        if started_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = &mut server => {
            result?;
            info!("server stopped");
        }
        _ = drain_deadline => {
            warn!(timeout_ms = shutdown_timeout.as_millis() as u64, "shutdown timed out, dropping open connections");
        }
    }
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM).
///
/// Tiger Style: Handles both signals for graceful shutdown in production
/// (systemd sends SIGTERM) and development (Ctrl-C sends SIGINT).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(err) => error!("failed to install Ctrl+C handler: {}", err),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => error!("failed to install SIGTERM handler: {}", err),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received SIGINT, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}
