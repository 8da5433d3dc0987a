//! skiffd — the Skiff daemon.
//!
//! Single binary that assembles the orchestration service:
//! - Release history and automation flags (redb)
//! - Image catalog from `skiff.toml`
//! - Workload platform from `skiff.toml` (optional)
//! - REST API
//!
//! # Usage
//!
//! ```text
//! skiffd init --path skiff.toml
//! skiffd serve --config skiff.toml --port 3030 --data-dir /var/lib/skiff
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use skiff_core::SkiffConfig;
use skiff_service::{CatalogPlatform, CatalogRegistry, Platform, Service};
use skiff_state::StateStore;

const DEFAULT_FILTER: &str = "info,skiffd=debug,skiff=debug";

#[derive(Parser)]
#[command(name = "skiffd", about = "Skiff orchestration daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the REST API.
    Serve {
        /// Path to skiff.toml. Built-in defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides `server.port`).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides `server.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Write a starter skiff.toml.
    Init {
        /// Destination file.
        #[arg(long, default_value = "skiff.toml")]
        path: PathBuf,

        /// Repository to seed the catalog with.
        #[arg(long, default_value = "app")]
        repository: String,

        /// Workload to seed the platform with.
        #[arg(long, default_value = "web")]
        workload: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
        } => run_serve(config.as_deref(), port, data_dir).await,
        Command::Init {
            path,
            repository,
            workload,
        } => run_init(&path, &repository, &workload),
    }
}

fn run_init(path: &Path, repository: &str, workload: &str) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    let rendered = SkiffConfig::scaffold(repository, workload).to_toml_string()?;
    std::fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), repository, workload, "wrote starter config");
    Ok(())
}

async fn run_serve(
    config_path: Option<&Path>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    info!("Skiff daemon starting");

    let mut config = match config_path {
        Some(path) => SkiffConfig::from_file(path)?,
        None => SkiffConfig::default(),
    };
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(data_dir) = data_dir {
        config.server.data_dir = data_dir;
    }

    // ── Initialize leaves ──────────────────────────────────────

    std::fs::create_dir_all(&config.server.data_dir)
        .with_context(|| format!("creating {}", config.server.data_dir.display()))?;
    let db_path = config.server.data_dir.join("skiff.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let registry = CatalogRegistry::from_config(&config.registry);
    info!(repositories = registry.len(), "image catalog loaded");

    let platform = match &config.platform {
        Some(platform) => {
            info!(workloads = platform.workloads.len(), "platform loaded");
            Some(Arc::new(CatalogPlatform::from_config(platform)) as Arc<dyn Platform>)
        }
        None => {
            warn!("no platform configured; workload operations are unavailable");
            None
        }
    };

    let store = Arc::new(store);
    let service = Service::new(Arc::new(registry), platform, store.clone(), store);

    // ── Start API server ───────────────────────────────────────

    let router = skiff_api::build_router(service);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("Skiff daemon stopped");
    Ok(())
}
