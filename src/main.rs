use std::path::Path;

use anyhow::Context;
use migration::MigratorTrait;
use reading_sync::{
    config::Config, remote::sqlite::SqliteBridge, storage::library::LibraryScan, sync::SyncEngine,
};
use sea_orm::Database;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

type ReadingSyncResult<T> = anyhow::Result<T>;

#[tokio::main]
async fn main() -> ReadingSyncResult<()> {
    // Respect RUST_LOG if set, default to info for our crate and warn for the database stack.
    let default_filter = format!("{}=info,sea_orm=warn,sqlx=warn", env!("CARGO_PKG_NAME"));
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting reading state sync"
    );
    // Load environment variables from .env files
    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load()?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let Some(library_dir) = config.library_dir.clone() else {
        println!("No library directory configured (set LIBRARY_DIR); nothing to reconcile.");
        return Ok(());
    };
    let candidates = match LibraryScan::new(&library_dir).candidates() {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::info!(error = %e, "library scan unavailable");
            println!("{e}; nothing to reconcile.");
            return Ok(());
        }
    };

    let db_conn = Database::connect(&config.store_url)
        .await
        .with_context(|| "Failed to connect to reading state store")?;
    migration::Migrator::up(&db_conn, None)
        .await
        .with_context(|| "Failed to run database migrations")?;

    let bridge = SqliteBridge::new(db_conn, config.authority.clone());
    let mut engine = SyncEngine::new(bridge, config.sync_options());
    tracing::info!(library = %library_dir.display(), candidates = candidates.len(), "reconciling library");

    let report = engine.reconcile_all(candidates).await;
    println!(
        "Updated {} record(s), skipped {}.",
        report.updated, report.skipped
    );
    Ok(())
}
