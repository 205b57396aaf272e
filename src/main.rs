use anyhow::{Context, Result};
use autoplaza_search::{
    cache::MemoryCacheStore,
    catalog::SeedData,
    config::Settings,
    history::{CsvAuditSink, SearchHistoryRecorder},
    repository::InMemoryListingRepository,
    routes,
    search::SearchEngine,
    AppState,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "autoplaza_search=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing listing search server...");

    // Load configuration
    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    let shared_settings = Arc::new(settings);

    // Brands, models and listings served by the in-memory collaborators
    let seed = SeedData::load(&shared_settings.seed_path)
        .with_context(|| format!("Failed to load seed data from {}", shared_settings.seed_path))?;
    let (catalog, listings) = seed.into_parts();
    tracing::info!("Loaded {} listings from {}", listings.len(), shared_settings.seed_path);

    let history = match shared_settings.history_path.as_deref() {
        Some(path) => {
            tracing::info!("Recording search history to {}", path);
            SearchHistoryRecorder::new(Arc::new(CsvAuditSink::new(path)))
        }
        None => SearchHistoryRecorder::disabled(),
    };

    let engine = SearchEngine::new(
        &shared_settings,
        Arc::new(InMemoryListingRepository::new(listings)),
        Arc::new(catalog),
        Arc::new(MemoryCacheStore::new(shared_settings.cache_capacity)),
        history,
    );

    let app_state = AppState {
        settings: shared_settings.clone(),
        engine: Arc::new(engine),
    };
    let app = routes::create_router(app_state);

    // Parse the server address from settings
    let addr: SocketAddr = shared_settings
        .server_address
        .parse()
        .with_context(|| format!("Invalid server address format: {}", shared_settings.server_address))?;

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
