use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsdesk::config::Config;
use newsdesk::db::Database;
use newsdesk::fetcher::{start_background_refresh, Fetcher};
use newsdesk::routes::{self, AppState};
use newsdesk::state::FeedStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsdesk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("NEWSDESK_CONFIG").unwrap_or_else(|_| "newsdesk.toml".to_string());
    let config = Config::load(&config_path)?;
    info!("Loaded configuration from {} (api_base {})", config_path, config.api_base);

    // Initialize bookmark store
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:newsdesk.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let store = Arc::new(FeedStore::new());

    // Create fetcher
    let fetcher = Arc::new(Fetcher::new(&config, store.clone())?);

    // Start background refresh task
    let bg_fetcher = fetcher.clone();
    let refresh_interval = config.refresh_interval;
    tokio::spawn(async move {
        start_background_refresh(bg_fetcher, refresh_interval).await;
    });

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState {
        config,
        db: Arc::new(db),
        fetcher,
        store,
    });

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server starting on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
