use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_vault::{
    cache::ResponseCache,
    config::Config,
    services::IngestService,
    storage::{FsObjectStore, ObjectStore},
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "image-vault")]
#[command(version)]
#[command(about = "A minimal image ingestion and serving proxy with durable storage and HTTP caching")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = format!("image_vault={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting image-vault v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration from specified file
    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    // Override config with CLI arguments
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    config.validate()?;

    let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(&config.storage.path).await?);
    info!("Object store ready at {:?}", config.storage.path);

    let cache = Arc::new(ResponseCache::new(config.cache.max_age));
    let ingest = Arc::new(IngestService::new(
        store.clone(),
        &config.web.base_url,
        config.ingest.fetch_timeout,
    )?);

    let sweep_interval = config.cache.sweep_interval;
    tokio::spawn(cache.clone().sweep_loop(sweep_interval));
    info!(
        "Response cache initialized (max age {}, sweep every {})",
        humantime::format_duration(config.cache.max_age),
        humantime::format_duration(sweep_interval)
    );

    let state = AppState {
        config: Arc::new(config),
        store,
        cache,
        ingest,
    };

    let web_server = WebServer::new(state)?;
    info!("Starting web server on {}", web_server.addr());

    // Create a channel to signal when the server is ready or fails to bind
    let (server_ready_tx, server_ready_rx) = tokio::sync::oneshot::channel();

    let server_handle = tokio::spawn(async move {
        if let Err(e) = web_server.serve_with_signal(server_ready_tx).await {
            tracing::error!("Web server failed: {}", e);
        }
    });

    match server_ready_rx.await {
        Ok(Ok(())) => {
            info!("Web server is now listening");
        }
        Ok(Err(bind_error)) => {
            tracing::error!("Failed to bind web server: {}", bind_error);
            return Err(bind_error);
        }
        Err(_) => {
            tracing::error!("Web server task completed without signaling");
            return Err(anyhow::anyhow!("Web server failed to start"));
        }
    }

    // Wait for the server to complete (this will block until shutdown)
    server_handle.await?;

    Ok(())
}
