use axum::{
    extract::{rejection::JsonRejection, State},
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderMap,
    },
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{write_songs, ScoredSong, SongDataset, SongRecord},
    routes::AppState,
    services::{resolve_track, CollaborativeFilter},
};

#[derive(Debug, Deserialize)]
pub struct CollaborativeRequest {
    pub playlist: Vec<SongRecord>,
    /// Songs to recommend for; the first playlist song when empty
    #[serde(default)]
    pub query_track_ids: Vec<String>,
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CollaborativeResponse {
    pub k: usize,
    pub recommendations: Vec<SongRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    pub song_id: String,
    pub num_recs: Option<usize>,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum SongSource {
    Catalog,
    Provider,
}

#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub song_id: String,
    /// Where the query song was found
    pub source: SongSource,
    pub recommendations: Vec<ScoredSong>,
}

/// Whether the client asked for CSV rather than JSON
fn wants_csv(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("text/csv"))
}

/// Ranked songs as CSV with the dataset column set
fn csv_response<'a, I>(songs: I) -> AppResult<Response>
where
    I: IntoIterator<Item = &'a SongRecord>,
{
    let mut body = Vec::new();
    write_songs(songs, &mut body)?;
    Ok(([(CONTENT_TYPE, "text/csv")], body).into_response())
}

/// Finds a query song in the playlist, then the catalog, then upstream
async fn resolve_query(
    state: &AppState,
    playlist: &SongDataset,
    track_id: &str,
) -> AppResult<SongRecord> {
    if let Some(song) = playlist.find(track_id).or_else(|| state.catalog.find(track_id)) {
        return Ok(song.clone());
    }

    match &state.metadata_provider {
        Some(provider) => resolve_track(provider.as_ref(), track_id).await,
        None => Err(AppError::NotFound(format!("Song {} not found", track_id))),
    }
}

/// Handler for playlist-seeded collaborative recommendations
pub async fn collaborative(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    payload: Result<Json<CollaborativeRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = payload?;
    let playlist = SongDataset::new(request.playlist);
    if playlist.is_empty() {
        return Err(AppError::InvalidInput("Playlist cannot be empty".to_string()));
    }

    // An explicit k is validated by the pipeline; the default shrinks to fit the playlist
    let k = request
        .k
        .unwrap_or_else(|| state.config.default_k.min(playlist.len()));

    tracing::info!(
        request_id = %request_id,
        playlist_rows = playlist.len(),
        queries = request.query_track_ids.len(),
        k,
        "Processing collaborative recommendation request"
    );

    // 1. Resolve query songs; none means the first playlist row
    let mut queries = Vec::with_capacity(request.query_track_ids.len());
    for track_id in &request.query_track_ids {
        queries.push(resolve_query(&state, &playlist, track_id).await?);
    }

    // 2. Preprocess, train and recommend off the async runtime
    let catalog = Arc::clone(&state.catalog);
    let recommendations = tokio::task::spawn_blocking(move || {
        let filter = CollaborativeFilter::preprocess(playlist, catalog)?;
        let trained = filter.train(k)?;
        if queries.is_empty() {
            trained.recommend_playlist_rows(&[0])
        } else {
            Ok(trained.recommend(&queries))
        }
    })
    .await
    .map_err(|e| AppError::Internal(format!("Recommendation task failed: {}", e)))??;

    tracing::info!(
        request_id = %request_id,
        returned = recommendations.len(),
        "Collaborative recommendations completed"
    );

    if wants_csv(&headers) {
        return csv_response(&recommendations);
    }

    Ok(Json(CollaborativeResponse { k, recommendations }).into_response())
}

/// Handler for content-based recommendations from the trained model
pub async fn content(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    payload: Result<Json<ContentRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = payload?;
    let num_recs = request.num_recs.unwrap_or(state.config.default_num_recs);

    tracing::info!(
        request_id = %request_id,
        song_id = %request.song_id,
        num_recs,
        "Processing content recommendation request"
    );

    // A retrain may swap the model while the provider lookup is pending
    let model = state.content_model().await?;

    let (source, recommendations) = match model.recommend(&request.song_id, num_recs) {
        Ok(recommendations) => (SongSource::Catalog, recommendations),
        Err(AppError::NotFound(msg)) => {
            let provider = state
                .metadata_provider
                .as_ref()
                .ok_or(AppError::NotFound(msg))?;

            let song = resolve_track(provider.as_ref(), &request.song_id).await?;
            (SongSource::Provider, model.recommend_for_song(&song, num_recs)?)
        }
        Err(e) => return Err(e),
    };

    tracing::info!(
        request_id = %request_id,
        source = ?source,
        returned = recommendations.len(),
        "Content recommendations completed"
    );

    if wants_csv(&headers) {
        return csv_response(recommendations.iter().map(|scored| &scored.song));
    }

    Ok(Json(ContentResponse {
        song_id: request.song_id,
        source,
        recommendations,
    })
    .into_response())
}
