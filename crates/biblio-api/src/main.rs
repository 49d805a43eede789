//! Biblio REST API server.

use biblio_api::{seed, server, AppState, ServerConfig};
use biblio_enrich::LayeredEnricher;
use biblio_lifecycle::LibraryManager;
use biblio_store::{InMemoryLibraryStore, SqliteLibraryStore};
use biblio_types::LibraryStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let store: Arc<dyn LibraryStore> = match &config.db_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "using SQLite store");
            Arc::new(SqliteLibraryStore::new(path)?)
        }
        None => {
            tracing::info!("using in-memory store");
            Arc::new(InMemoryLibraryStore::new())
        }
    };
    let library = LibraryManager::new(store)
        .with_enricher(LayeredEnricher::from_env())
        .with_default_due_days(config.default_due_days);
    if config.seed {
        seed::seed_dev_data(&library).await?;
    }

    let app = server::router(Arc::new(AppState { library }));
    tracing::info!("Biblio API listening on {}", config.listen);
    axum::serve(
        tokio::net::TcpListener::bind(config.listen).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
