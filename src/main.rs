//! TTLKV - A Persistent Key-Value Server with Per-Key Expiration
//!
//! This is the main entry point for the TTLKV server.
//! It opens the database, sets up the TCP listener, and runs the server
//! until Ctrl+C.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use ttlkv::config::{ServerConfig, DEFAULT_DB_PATH, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WORKERS};
use ttlkv::server::Server;
use ttlkv::storage::RedbStorage;

/// TTLKV server
#[derive(Debug, Parser)]
#[command(name = "ttlkv", version, about)]
struct Cli {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Path of the database file
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    dbpath: PathBuf,

    /// Number of worker tasks
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Maximum number of queued requests (0 = unbounded)
    #[arg(long, default_value_t = 0)]
    max_queue: usize,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            db_path: self.dbpath,
            workers: self.workers,
            max_queue_len: self.max_queue,
            ..Default::default()
        }
    }
}

fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

fn print_banner(config: &ServerConfig) {
    println!(
        r#"
TTLKV v{} - Persistent Key-Value Server with Expiration
──────────────────────────────────────────────────────────────
Database:  {}
Workers:   {}
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        ttlkv::VERSION,
        config.db_path.display(),
        config.workers,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let config = cli.into_config();

    let storage = RedbStorage::open(&config.db_path)
        .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;
    info!(path = %config.db_path.display(), "Database opened");

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    print_banner(&config);

    let server = Server::new(config, Arc::new(storage)).context("failed to initialise server")?;

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    server.run(listener, shutdown).await;

    info!("Server shutdown complete");
    Ok(())
}
