use dotenv::dotenv;
use payables_core::config::Config;
use payables_core::db;
use payables_core::store::PgBillStore;
use payables_core::sweeper::OverdueSweeper;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Worker binary that moves pending bills past their due date to overdue.
///
/// Runs the same status derivation as the API on a fixed interval, so
/// stored statuses stay current even for bills nobody touches.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting payables overdue sweeper...");

    let config = Config::from_env()?;
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    let sweeper = Arc::new(OverdueSweeper::new(
        PgBillStore::new(pool),
        config.sweeper_poll_interval_seconds,
        config.sweeper_batch_size,
    ));

    // Spawn the sweeper in a task
    let worker = Arc::clone(&sweeper);
    let sweeper_handle = tokio::spawn(async move {
        if let Err(e) = worker.start().await {
            tracing::error!("Sweeper error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            sweeper.stop().await;
        }
        _ = sweeper_handle => {
            info!("Sweeper task completed");
        }
    }

    info!("Payables overdue sweeper stopped");
    Ok(())
}
