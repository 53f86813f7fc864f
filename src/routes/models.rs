use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::RequestId,
    routes::AppState,
    services::TrainingSummary,
};

/// Overrides for a retraining run; unset fields use the configured defaults
#[derive(Debug, Default, Deserialize)]
pub struct TrainRequest {
    pub n_songs: Option<usize>,
    pub test_fraction: Option<f64>,
    pub seed: Option<u64>,
}

/// Handler for retraining the content model
pub async fn train_content(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<TrainRequest>, JsonRejection>,
) -> AppResult<Json<TrainingSummary>> {
    let Json(request) = payload?;
    let n_songs = request.n_songs.unwrap_or(state.config.training_songs);
    let test_fraction = request.test_fraction.unwrap_or(state.config.test_fraction);

    tracing::info!(
        request_id = %request_id,
        n_songs,
        test_fraction,
        seed = ?request.seed,
        "Retraining content model"
    );

    let summary = state
        .train_content_model(n_songs, test_fraction, request.seed)
        .await
        .inspect_err(|e| {
            tracing::warn!(request_id = %request_id, error = %e, "Retraining failed, keeping previous model");
        })?;

    Ok(Json(summary))
}

/// Summary of the content model currently serving requests
pub async fn content_status(State(state): State<Arc<AppState>>) -> AppResult<Json<TrainingSummary>> {
    let model = state.content_model().await?;
    Ok(Json(model.summary().clone()))
}
