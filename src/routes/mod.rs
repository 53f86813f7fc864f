use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rand::{rngs::StdRng, SeedableRng};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    middleware::{make_span_with_request_id, request_id_middleware},
    models::SongDataset,
    services::{ContentRecommender, MetadataProvider, TrainedContentRecommender, TrainingSummary},
};

pub mod models;
pub mod recommendations;

/// Shared application state
pub struct AppState {
    pub config: Config,
    /// Candidate catalog recommendations are drawn from
    pub catalog: Arc<SongDataset>,
    /// Liked songs, the positive class of the content model
    pub liked: Arc<SongDataset>,
    /// Current content model; `None` until the first successful training.
    /// Readers clone the `Arc` and release the lock before doing any work.
    pub content_model: RwLock<Option<Arc<TrainedContentRecommender>>>,
    /// Resolves songs missing from the catalog, when configured
    pub metadata_provider: Option<Arc<dyn MetadataProvider>>,
}

impl AppState {
    pub fn new(config: Config, catalog: SongDataset, liked: SongDataset) -> Self {
        Self {
            config,
            catalog: Arc::new(catalog),
            liked: Arc::new(liked),
            content_model: RwLock::new(None),
            metadata_provider: None,
        }
    }

    pub fn with_metadata_provider(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.metadata_provider = Some(provider);
        self
    }

    /// The model currently serving requests
    pub async fn content_model(&self) -> AppResult<Arc<TrainedContentRecommender>> {
        self.content_model
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::NotReady("Content model has not been trained".to_string()))
    }

    /// Trains a new content model and swaps it in
    ///
    /// The previous model keeps serving until training succeeds, and stays in
    /// place if it fails. Without a seed one is drawn at random and reported in
    /// the summary so the run can be reproduced.
    pub async fn train_content_model(
        &self,
        n_songs: usize,
        test_fraction: f64,
        seed: Option<u64>,
    ) -> AppResult<TrainingSummary> {
        let seed = seed.unwrap_or_else(rand::random);
        let catalog = Arc::clone(&self.catalog);
        let liked = Arc::clone(&self.liked);

        let trained = tokio::task::spawn_blocking(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            ContentRecommender::preprocess(catalog, liked)?
                .train(n_songs, test_fraction, &mut rng)
                .map(|trained| trained.with_seed(seed))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Training task failed: {}", e)))??;

        let summary = trained.summary().clone();
        *self.content_model.write().await = Some(Arc::new(trained));

        Ok(summary)
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/recommendations/collaborative",
            post(recommendations::collaborative),
        )
        .route("/recommendations/content", post(recommendations::content))
        .route("/models/content", get(models::content_status))
        .route("/models/content/train", post(models::train_content))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
