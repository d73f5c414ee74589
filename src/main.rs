//! vtfs-server: serves the vtfs filesystem calls over HTTP.
//!
//! Configuration precedence (lowest to highest): defaults, TOML file,
//! `VTFS_*` environment variables, command-line flags.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vtfs::AppConfig;
use vtfs::AppState;
use vtfs::build_router;
use vtfs::server;
use vtfs_redb_storage::RedbBackend;
use vtfs_service::FileSystemService;

#[derive(Parser, Debug)]
#[command(name = "vtfs-server", version, about = "Metadata and content backend for the vtfs kernel client")]
struct Args {
    /// Path to TOML configuration file.
    #[arg(long, env = "VTFS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind the HTTP listener to.
    #[arg(long)]
    bind_addr: Option<String>,

    /// HTTP listener port.
    #[arg(long)]
    port: Option<u16>,

    /// Path to the redb database file.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

impl Args {
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(bind_addr) = &self.bind_addr {
            config.server.bind_addr = bind_addr.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(db_path) = &self.db_path {
            config.storage.db_path = db_path.clone();
        }
    }
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load_with_layers(args.config.as_deref()).context("failed to load configuration")?;
    args.apply_to(&mut config);
    config.validate().context("invalid configuration")?;

    init_tracing(&config.logging.filter);
    match &args.config {
        Some(path) => info!(path = %path.display(), "loaded configuration file"),
        None => info!("no configuration file given, using defaults and environment"),
    }
    info!(
        listen_addr = %config.server.listen_addr(),
        db_path = %config.storage.db_path.display(),
        request_timeout_ms = config.server.request_timeout_ms,
        "starting vtfs-server"
    );

    let backend = RedbBackend::open(&config.storage.db_path)
        .with_context(|| format!("failed to open database at {}", config.storage.db_path.display()))?;
    let service = FileSystemService::new(Arc::new(backend));
    let router = build_router(AppState::new(service, config.server.request_timeout()));

    let listener = TcpListener::bind(config.server.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_addr()))?;

    server::serve(listener, router, config.server.shutdown_timeout()).await?;

    info!("vtfs-server stopped");
    Ok(())
}
