//! Matchfeed Server
//!
//! Ingests live match events, keeps per-match state and publishes each
//! fact to a webhook at most once.

mod adapters;
mod api;
mod config;
mod retention;
mod server;
mod shutdown;
mod state;

use adapters::{ConfigTabularStore, HttpDeliveryGateway, OptOutConsentGate};
use clap::Parser;
use config::{ConfigLoader, get_database_url};
use matchfeed_core::MatchFeed;
use matchfeed_core::entities::{DispatchStore, MemoryDispatchStore, PgDispatchStore};
use matchfeed_core::framework::DatabaseProcessor;
use retention::spawn_retention_task;
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Matchfeed - live match event classification and webhook dispatch
#[derive(Parser, Debug)]
#[command(name = "matchfeed-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./matchfeed.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup (only with DATABASE_URL)
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting matchfeed-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let listen_addr = loaded_config.server.listen;
    let feed_config = loaded_config.feed.clone();
    let delivery = loaded_config.delivery.clone();
    let shared_config = loaded_config.into_shared();

    // Dispatch records live in Postgres when a database is configured.
    let (records, db_pool) = match get_database_url() {
        Some(database_url) => {
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

            if args.migrate {
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

            let store: Arc<dyn DispatchStore> = Arc::new(PgDispatchStore::new(
                DatabaseProcessor {
                    pool: db_pool.clone(),
                },
                delivery.claim_lease,
            ));
            (store, Some(db_pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, dispatch records are kept in memory");
            if args.migrate {
                tracing::warn!("--migrate ignored without DATABASE_URL");
            }
            let store: Arc<dyn DispatchStore> = Arc::new(MemoryDispatchStore::new());
            (store, None)
        }
    };

    let retention_notify = delivery.retention.map(|retention| {
        tracing::info!("Purging delivered records older than {:?}", retention);
        spawn_retention_task(records.clone(), retention)
    });

    let feed = MatchFeed::new(
        feed_config,
        Arc::new(ConfigTabularStore::new(shared_config.matches.clone())),
        Arc::new(OptOutConsentGate::new(shared_config.consent.clone())),
        Arc::new(HttpDeliveryGateway::new(
            delivery.webhook_url.clone(),
            delivery.secret_bytes(),
        )),
        records,
    );
    tracing::info!("Delivering to {}", delivery.webhook_url);

    let state = AppState::new(feed, shared_config);

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(state.clone(), config_loader);

    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    shutdown_notify.notify_one();
    if let Some(retention_notify) = retention_notify {
        retention_notify.notify_one();
    }

    if let Some(db_pool) = db_pool {
        tracing::info!("Closing database connections...");
        db_pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
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
