//! archive-works - Works service
//!
//! Hosts the search-query normalizer and the posting/authorization workflow
//! engine behind a JSON HTTP API. Authentication is upstream; requests
//! arrive with forwarded identity headers.

use std::sync::Arc;

use anyhow::Result;
use archive_common::config::TomlConfig;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use archive_works::db::SqliteStore;
use archive_works::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting archive-works");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = TomlConfig::load()?;
    info!("Database: {}", config.database_path);
    info!("Search index: {}", config.search_index_url);

    let store = Arc::new(SqliteStore::connect(&config.database_path).await?);
    info!("Database connection established");

    let state = AppState::from_config(store, &config);
    let app = archive_works::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on {}", config.bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}
