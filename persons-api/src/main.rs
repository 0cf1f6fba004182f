//! persons-api - Main entry point
//!
//! Loads configuration, opens the database, wires the classifier client,
//! enrichment coordinator, repository and service into the HTTP router,
//! and serves until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use persons_common::config::{default_config_path, Config, LogFormat, LoggingConfig};
use persons_common::db::init_database;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use persons_api::classifier::HttpClassifier;
use persons_api::enrichment::Enricher;
use persons_api::repository::SqlitePersonRepository;
use persons_api::service::PersonService;
use persons_api::{build_router, AppState};

/// Command-line arguments for persons-api
///
/// Each flag overrides the matching configuration file value.
#[derive(Parser, Debug)]
#[command(name = "persons-api")]
#[command(about = "Person records enriched with age, gender and nationality guesses")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "PERSONS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "PERSONS_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PERSONS_PORT")]
    port: Option<u16>,

    /// sqlx SQLite connection string
    #[arg(long, env = "PERSONS_DATABASE_URL")]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PERSONS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format (text or json)
    #[arg(long, env = "PERSONS_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

impl Args {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.http.host = host.clone();
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting persons-api");
    match args.config.as_deref().or_else(|| default_config_path()) {
        Some(path) => info!(path = %path.display(), "Loaded configuration file"),
        None => warn!("No configuration file found, using built-in defaults"),
    }

    let pool = init_database(&config.database)
        .await
        .context("Failed to initialize database")?;
    info!(url = %config.database.url, "Database ready");

    let classifier = HttpClassifier::new(&config.classifier)
        .context("Failed to build classifier client")?;
    let enricher = Enricher::new(Arc::new(classifier));
    let repository = Arc::new(SqlitePersonRepository::new(pool.clone()));
    let service = Arc::new(PersonService::new(repository, enricher));

    let app = build_router(AppState::new(service), config.http.request_timeout());

    let addr = config.http.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!(addr = %listener.local_addr()?, "Starting HTTP server");

    let shutdown = CancellationToken::new();
    let mut server = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        })
    };

    tokio::select! {
        joined = &mut server => {
            // Server stopped without a shutdown request
            pool.close().await;
            joined.context("Server task failed")?.context("Server error")?;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    shutdown.cancel();

    let grace = config.http.shutdown_timeout();
    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => joined.context("Server task failed")?.context("Server error")?,
        Err(_) => {
            warn!(
                timeout_ms = config.http.shutdown_timeout_ms,
                "Graceful shutdown timed out, dropping in-flight requests"
            );
            server.abort();
        }
    }

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level '{}'", logging.level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
    .context("Failed to initialize tracing")
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
