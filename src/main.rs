use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use showfinder::{
    api::{create_router, AppState},
    config::Config,
    db::{create_pool, run_migrations, PgCatalogRepository, PgConcertSource, PgSubscriberSource},
    services::{ListenBrainzProvider, LogMailer, SimilarityCache},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("showfinder=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let settings = config.engine()?;

    let pool = create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool).await?;

    let provider = ListenBrainzProvider::from_config(&config, settings.provider_timeout)
        .context("Failed to build ListenBrainz client")?;
    let cache = Arc::new(SimilarityCache::new(
        Arc::new(PgCatalogRepository::new(pool.clone())),
        Arc::new(provider),
        settings.cache_ttl,
        settings.provider_timeout,
    ));

    let state = AppState::new(
        cache,
        Arc::new(PgConcertSource::new(pool.clone())),
        Arc::new(PgSubscriberSource::new(pool)),
        Arc::new(LogMailer),
        settings,
    );
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
