//! Wallet Ledger Server
//!
//! Top-ups, payments and asynchronously settled transfers over a ledger of
//! integer balances.

mod api;
mod config;
mod runtime;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use runtime::{WalletRuntime, seed_accounts};
use server::{build_router, run_server};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wallet_core::store::{MemoryLedger, PgLedger, SharedLedger};

/// Wallet ledger - balances, payments and settled transfers
#[derive(Parser, Debug)]
#[command(name = "wallet-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./wallet-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Keep the ledger in process memory instead of Postgres
    #[arg(long, default_value = "false", conflicts_with = "migrate")]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting wallet-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let db_pool = if args.in_memory {
        tracing::warn!("Using the in-memory ledger, nothing survives a restart");
        None
    } else {
        Some(connect_database(args.migrate).await?)
    };
    let ledger: SharedLedger = match &db_pool {
        Some(db_pool) => Arc::new(PgLedger::new(db_pool.clone())),
        None => Arc::new(MemoryLedger::new()),
    };

    seed_accounts(&ledger, &loaded_config.accounts)
        .await
        .map_err(|e| {
            tracing::error!("Failed to open configured accounts: {}", e);
            e
        })?;

    // Worker subscribes before recovery publishes anything
    let runtime = WalletRuntime::start(ledger, &loaded_config.settlement).await?;

    // Build the router
    let router = build_router(runtime.state.clone());

    // Run the server
    tracing::info!("Starting HTTP server on {}", loaded_config.listen);
    let result = run_server(router, loaded_config.listen).await;

    runtime.shutdown().await;

    // Close database connections gracefully
    if let Some(db_pool) = db_pool {
        tracing::info!("Closing database connections...");
        db_pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Connect to Postgres using `DATABASE_URL`, optionally running migrations.
async fn connect_database(migrate: bool) -> anyhow::Result<PgPool> {
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    Ok(db_pool)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
