use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use bundle_server::config::{default_config, load_config, ConfigOverrides, ConfigWatcher};
use bundle_server::http::HttpServer;
use bundle_server::lifecycle::{signals, startup, Shutdown};
use bundle_server::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "bundle-server")]
#[command(about = "Serves scripts compiled per client capabilities", long_about = None)]
struct Cli {
    /// TOML configuration file, watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to serve (overrides `content.root`).
    #[arg(short = 'r', long)]
    project_root: Option<PathBuf>,

    /// Port to listen on (overrides the port of `listener.bind_address`).
    #[arg(short, long)]
    port: Option<u16>,

    /// Maximum concurrent bundler processes.
    #[arg(long)]
    max_workers: Option<usize>,

    /// Delete all build caches under the project root before serving.
    #[arg(long)]
    reset_cache: bool,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            root: self.project_root.clone(),
            port: self.port,
            max_workers: self.max_workers,
            verbose: self.verbose,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let overrides = cli.overrides();

    let config = match &cli.config {
        Some(path) => load_config(path, &overrides)?,
        None => default_config(&overrides)?,
    };
    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "bundle-server starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        root = %config.content.root.display(),
        compiler = %config.compiler.program,
        max_workers = config.compiler.max_workers,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let root = config.content.root.clone();
    let cache_dir = config.content.cache_dir.clone();
    if cli.reset_cache {
        let removed = startup::reset_caches(&root, &cache_dir)?;
        tracing::info!(removed, "Build caches reset");
    }
    startup::log_inventory(&root, &cache_dir);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, overrides.clone());
            match watcher.run() {
                Ok(handle) => (Some(handle), updates),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload unavailable");
                    (None, updates)
                }
            }
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
