use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bangla_news::config::Config;
use bangla_news::routes::{router, AppState};
use bangla_news::scheduler::start_daily_refresh;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bangla_news=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("BANGLA_NEWS_CONFIG").unwrap_or_else(|_| "feeds.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(
        path = %config_path,
        categories = config.categories.len(),
        "Loaded configuration"
    );

    let state = Arc::new(AppState::from_config(&config)?);
    state.registry.load_state().await?;

    // Start background refresh task
    let scheduler = state.scheduler.clone();
    let refresh_hour = config.refresh_hour;
    tokio::spawn(async move {
        start_daily_refresh(scheduler, refresh_hour).await;
    });

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let bind = std::env::var("BANGLA_NEWS_BIND").unwrap_or(config.bind);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("News backend running at http://{}", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
