//! threadcast entry point.
//!
//! `serve` exposes the trigger endpoint for an external scheduler,
//! `run-once` performs a single worker invocation from the command line and
//! `migrate` applies pending database migrations.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::{Parser, Subcommand};
use sea_orm::DatabaseConnection;
use threadcast_api::{AppState, router as api_router};
use threadcast_common::{Config, LogFormat, LoggingConfig};
use threadcast_core::{
    Clock, DbCredentialProvider, PublishWorker, SystemClock, ThreadRngJitter, ThreadsClient,
    TokioDelay,
};
use threadcast_db::repositories::{PublishingCredentialRepository, ScheduledPostJobRepository};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "threadcast")]
#[command(about = "Publishes scheduled threads at their due time")]
#[command(version)]
struct Cli {
    /// Configuration file; defaults to `config/default.toml` plus the
    /// `THREADCAST_ENV` overlay
    #[arg(short, long, env = "THREADCAST_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server exposing the cron trigger
    Serve,

    /// Process at most one due job and print the run summary as JSON
    RunOnce,

    /// Apply pending database migrations and exit
    Migrate,
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout is reserved for the run-once summary.
    match logging.format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load().context("failed to load config")?,
    };
    Ok(config)
}

fn build_worker(config: &Config, db: DatabaseConnection) -> anyhow::Result<PublishWorker> {
    let db = Arc::new(db);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(ScheduledPostJobRepository::new(db.clone()));
    let credentials = Arc::new(DbCredentialProvider::new(
        PublishingCredentialRepository::new(db),
        clock.clone(),
    ));
    let publisher = Arc::new(ThreadsClient::new(&config.publisher)?);

    Ok(PublishWorker::new(
        store,
        publisher,
        credentials,
        clock,
        Arc::new(TokioDelay),
        Arc::new(ThreadRngJitter),
        config.worker.clone(),
    ))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Starting threadcast server...");

    let db = threadcast_db::init(&config).await?;
    info!("Connected to database");
    info!("Running database migrations...");
    threadcast_db::migrate(&db).await?;
    info!("Migrations completed");

    let worker = Arc::new(build_worker(&config, db)?);
    if config.server.cron_secret.is_none() {
        tracing::warn!("No cron secret configured; the trigger endpoint is open");
    }
    let state = AppState::new(worker, config.server.cron_secret.clone());

    let app = Router::new()
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server host or port")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn run_once(config: Config) -> anyhow::Result<()> {
    let db = threadcast_db::init(&config).await?;
    let worker = build_worker(&config, db)?;
    let summary = worker.run_once().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn migrate(config: Config) -> anyhow::Result<()> {
    let db = threadcast_db::init(&config).await?;
    info!("Running database migrations...");
    threadcast_db::migrate(&db).await?;
    info!("Migrations completed");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging);

    let result = match cli.command {
        Commands::Serve => serve(config).await,
        Commands::RunOnce => run_once(config).await,
        Commands::Migrate => migrate(config).await,
    };

    if let Err(e) = &result {
        error!(error = %e, "threadcast exited with an error");
    }
    result
}
