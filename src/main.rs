//! JsonLog Server Binary
//!
//! Collects JSON records over HTTP into daily-rotated per-stream files.

use clap::Parser;
use jsonlog::config::ServerConfig;
use jsonlog::server::LogServer;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "jsonlog-server")]
#[command(about = "JSON log collector with daily file rotation")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/server.toml")]
    config: PathBuf,

    /// Address to bind to
    #[arg(short, long)]
    bind: Option<String>,

    /// Root directory for stream files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit diagnostics as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    let builder = tracing_subscriber::fmt()
        .with_env_filter(if args.verbose {
            "jsonlog=debug,info"
        } else {
            "jsonlog=info,warn,error"
        })
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let installed = if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.expect("Failed to set tracing subscriber");

    info!(
        "Starting JsonLog Server v{} on {}",
        env!("CARGO_PKG_VERSION"),
        gethostname::gethostname().to_string_lossy()
    );

    // Load configuration
    let mut config = if args.config.exists() {
        ServerConfig::from_file(&args.config)?
    } else {
        info!("Config file not found, using defaults");
        ServerConfig::default()
    };

    // Override config with CLI arguments
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }

    // Validate configuration
    config.validate()?;

    info!("Configuration loaded successfully");
    info!("Bind address: {}", config.server.bind);
    info!("Data directory: {}", config.storage.data_dir.display());
    info!("Buffer capacity: {} messages", config.storage.buffer_capacity);
    info!(
        "Rotation enabled: {} (daily: {})",
        config.storage.rotate, config.storage.daily
    );

    let server = LogServer::new(config).await?;
    info!("Registered streams: {:?}", server.registry().keys());

    // Handle shutdown gracefully
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = server.start() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                server.close().await;
                std::process::exit(1);
            }
        }
        _ = shutdown_signal => {
            info!("Shutting down gracefully...");
        }
    }

    server.close().await;
    info!("JsonLog Server stopped");
    Ok(())
}
