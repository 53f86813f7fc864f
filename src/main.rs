use anyhow::{Context, Result};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use songrec_api::{
    config::Config,
    db::{create_redis_client, Cache, CacheWriterHandle},
    models::SongDataset,
    routes::{create_router, AppState},
    services::SpotifyProvider,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,songrec_api=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!(
        catalog = %config.catalog_path,
        liked = %config.liked_songs_path,
        "Starting songrec-api"
    );

    // 1. Datasets
    let catalog = SongDataset::from_path(&config.catalog_path)
        .with_context(|| format!("Failed to load catalog from {}", config.catalog_path))?;
    let liked = SongDataset::from_path(&config.liked_songs_path)
        .with_context(|| format!("Failed to load liked songs from {}", config.liked_songs_path))?;

    // 2. Optional metadata cache
    let (cache, cache_handle) = match &config.redis_url {
        Some(url) => {
            let client = create_redis_client(url)?;
            let (cache, handle) = Cache::new(client).await;
            tracing::info!("Redis metadata cache enabled");
            (Some(cache), Some(handle))
        }
        None => (None, None),
    };

    // 3. Optional Spotify provider
    let mut state = AppState::new(config.clone(), catalog, liked);
    match config.spotify_credentials() {
        Some((client_id, client_secret)) => {
            let provider = SpotifyProvider::new(
                client_id,
                client_secret,
                config.spotify_api_url.clone(),
                config.spotify_token_url.clone(),
                cache,
            );
            state = state.with_metadata_provider(Arc::new(provider));
            tracing::info!("Spotify metadata provider enabled");
        }
        None => tracing::info!("Spotify credentials not set, unknown songs will not be resolved"),
    }

    // 4. Initial content model; the service still starts without one
    let state = Arc::new(state);
    match state
        .train_content_model(config.training_songs, config.test_fraction, config.training_seed)
        .await
    {
        Ok(summary) => tracing::info!(
            train_rows = summary.train_rows,
            pool_rows = summary.pool_rows,
            seed = ?summary.seed,
            "Content model ready"
        ),
        Err(e) => tracing::warn!(error = %e, "Initial content model training failed"),
    }

    // 5. Serve
    let app = create_router(state).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cache_handle))
        .await?;

    Ok(())
}

/// Waits for Ctrl+C, then flushes pending cache writes
async fn shutdown_signal(cache_handle: Option<CacheWriterHandle>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }

    tracing::info!("Shutdown signal received");

    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }
}
