use std::sync::Arc;
use std::time::Duration;

use axum::http::{header::ACCEPT, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use tokio::sync::Notify;

use songrec_api::{
    config::Config,
    error::{AppError, AppResult},
    models::{SongDataset, SongRecord},
    routes::{create_router, AppState},
    services::MetadataProvider,
};

fn song(track_id: &str, artist: &str, genre: &str, popularity: f64, duration_ms: f64) -> SongRecord {
    SongRecord {
        track_id: track_id.to_string(),
        track_name: format!("{} title", track_id),
        artist_names: artist.to_string(),
        genre: genre.to_string(),
        popularity,
        duration_ms,
        year: 2012,
    }
}

fn catalog() -> SongDataset {
    SongDataset::new(
        (0..20)
            .map(|i| {
                song(
                    &format!("c{}", i),
                    &format!("Artist {}", i % 5),
                    if i % 2 == 0 { "acoustic" } else { "metal" },
                    30.0 + i as f64 * 2.0,
                    160_000.0 + i as f64 * 4_000.0,
                )
            })
            .collect(),
    )
}

fn liked() -> SongDataset {
    SongDataset::new(
        (0..10)
            .map(|i| {
                song(
                    &format!("l{}", i),
                    "Chris Lake",
                    "house",
                    60.0 + i as f64,
                    205_000.0 + i as f64 * 1_500.0,
                )
            })
            .collect(),
    )
}

fn test_config() -> Config {
    envy::from_iter(vec![
        ("DEFAULT_NUM_RECS".to_string(), "3".to_string()),
        ("DEFAULT_K".to_string(), "30".to_string()),
        ("TRAINING_SONGS".to_string(), "6".to_string()),
        ("TEST_FRACTION".to_string(), "0.5".to_string()),
    ])
    .unwrap()
}

/// Resolves a single known track, fails every other lookup upstream
struct StubProvider;

#[async_trait::async_trait]
impl MetadataProvider for StubProvider {
    async fn lookup_track(&self, track_id: &str) -> AppResult<SongRecord> {
        if track_id == "remote1" {
            Ok(song("remote1", "Chris Lake", "house", 66.0, 210_000.0))
        } else {
            Err(AppError::ExternalApi("upstream unavailable".to_string()))
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Holds every lookup until `release` is notified, and signals `started` on entry
struct GatedProvider {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait::async_trait]
impl MetadataProvider for GatedProvider {
    async fn lookup_track(&self, track_id: &str) -> AppResult<SongRecord> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(song(track_id, "Chris Lake", "house", 66.0, 210_000.0))
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

fn untrained_state() -> AppState {
    AppState::new(test_config(), catalog(), liked())
}

async fn create_test_server() -> TestServer {
    let state = untrained_state().with_metadata_provider(Arc::new(StubProvider));
    state.train_content_model(6, 0.5, Some(7)).await.unwrap();

    TestServer::new(create_router(Arc::new(state))).unwrap()
}

fn playlist_json(ids: &[&str]) -> Vec<Value> {
    let catalog = catalog();
    ids.iter()
        .map(|id| serde_json::to_value(catalog.find(id).unwrap()).unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server().await;
    let response = server.get("/health").await;

    response.assert_status_ok();
    response.assert_json(&json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let server = create_test_server().await;
    let response = server.get("/health").await;

    let header = response.header("x-request-id");
    assert!(uuid::Uuid::parse_str(header.to_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_collaborative_excludes_playlist_and_defaults_k() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/recommendations/collaborative")
        .json(&json!({ "playlist": playlist_json(&["c0", "c1", "c2"]) }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["k"], 3);

    let recommendations = body["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 3);
    for rec in recommendations {
        let id = rec["track_id"].as_str().unwrap();
        assert!(!["c0", "c1", "c2"].contains(&id), "playlist song {} returned", id);
    }
}

#[tokio::test]
async fn test_collaborative_with_catalog_query() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/recommendations/collaborative")
        .json(&json!({
            "playlist": playlist_json(&["c0", "c1"]),
            "query_track_ids": ["c10"],
            "k": 2
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let ids: Vec<&str> = body["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["track_id"].as_str().unwrap())
        .collect();

    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&"c10"));
}

#[tokio::test]
async fn test_collaborative_k_larger_than_playlist() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/recommendations/collaborative")
        .json(&json!({ "playlist": playlist_json(&["c0", "c1"]), "k": 5 }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("Insufficient"));
}

#[tokio::test]
async fn test_collaborative_unknown_query_is_not_found() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/recommendations/collaborative")
        .json(&json!({
            "playlist": playlist_json(&["c0", "c1"]),
            "query_track_ids": ["nowhere"]
        }))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn test_collaborative_empty_playlist_is_bad_request() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/recommendations/collaborative")
        .json(&json!({ "playlist": [] }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_content_recommendations_for_catalog_song() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/recommendations/content")
        .json(&json!({ "song_id": "c4" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["source"], "catalog");

    let recommendations = body["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 3);

    let scores: Vec<f64> = recommendations
        .iter()
        .map(|r| r["score"].as_f64().unwrap())
        .collect();
    assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[tokio::test]
async fn test_content_falls_back_to_provider() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/recommendations/content")
        .json(&json!({ "song_id": "remote1", "num_recs": 2 }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["source"], "provider");
    assert_eq!(body["recommendations"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_content_unknown_song_is_not_found() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/recommendations/content")
        .json(&json!({ "song_id": "missing" }))
        .await;

    response.assert_status_not_found();
    let body: Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_content_before_training_is_unavailable() {
    let server = TestServer::new(create_router(Arc::new(untrained_state()))).unwrap();

    let response = server
        .post("/api/v1/recommendations/content")
        .json(&json!({ "song_id": "c1" }))
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let response = server.get("/api/v1/models/content").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_retrain_reports_summary() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/models/content/train")
        .json(&json!({ "n_songs": 5, "test_fraction": 0.2, "seed": 99 }))
        .await;

    response.assert_status_ok();
    let summary: Value = response.json();
    assert_eq!(summary["n_songs"], 5);
    assert_eq!(summary["labelled_rows"], 10);
    assert_eq!(summary["train_rows"], 8);
    assert_eq!(summary["pool_rows"], 2);
    assert_eq!(summary["seed"], 99);

    let status: Value = server.get("/api/v1/models/content").await.json();
    assert_eq!(status, summary);
}

#[tokio::test]
async fn test_failed_retrain_keeps_previous_model() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/models/content/train")
        .json(&json!({ "n_songs": 50 }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let status: Value = server.get("/api/v1/models/content").await.json();
    assert_eq!(status["n_songs"], 6);
    assert_eq!(status["seed"], 7);

    server
        .post("/api/v1/recommendations/content")
        .json(&json!({ "song_id": "c2" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_retrain_not_blocked_by_pending_provider_lookup() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let provider = GatedProvider {
        started: Arc::clone(&started),
        release: Arc::clone(&release),
    };

    let state = Arc::new(untrained_state().with_metadata_provider(Arc::new(provider)));
    state.train_content_model(6, 0.5, Some(7)).await.unwrap();
    let server = TestServer::new(create_router(Arc::clone(&state))).unwrap();

    let lookup = async {
        server
            .post("/api/v1/recommendations/content")
            .json(&json!({ "song_id": "remote1", "num_recs": 2 }))
            .await
    };

    let retrain = async {
        started.notified().await;
        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            state.train_content_model(5, 0.2, Some(99)),
        )
        .await
        .expect("retrain waited on a pending content request")
        .unwrap();
        release.notify_one();
        summary
    };

    let (response, summary) = tokio::join!(lookup, retrain);

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["source"], "provider");
    assert_eq!(summary.seed, Some(99));

    let status: Value = server.get("/api/v1/models/content").await.json();
    assert_eq!(status["seed"], 99);
}

#[tokio::test]
async fn test_collaborative_csv_output() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/recommendations/collaborative")
        .add_header(ACCEPT, HeaderValue::from_static("text/csv"))
        .json(&json!({ "playlist": playlist_json(&["c0", "c1", "c2"]) }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "text/csv");

    let recommendations = SongDataset::from_reader(response.text().as_bytes()).unwrap();
    assert_eq!(recommendations.len(), 3);
    assert!(recommendations
        .iter()
        .all(|song| !["c0", "c1", "c2"].contains(&song.track_id.as_str())));
}

#[tokio::test]
async fn test_content_csv_output() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/recommendations/content")
        .add_header(ACCEPT, HeaderValue::from_static("text/csv"))
        .json(&json!({ "song_id": "c4", "num_recs": 2 }))
        .await;

    response.assert_status_ok();
    let recommendations = SongDataset::from_reader(response.text().as_bytes()).unwrap();
    assert_eq!(recommendations.len(), 2);
}

#[tokio::test]
async fn test_malformed_body_returns_error_json() {
    let server = create_test_server().await;

    let mut entry = serde_json::to_value(catalog().find("c0").unwrap()).unwrap();
    entry.as_object_mut().unwrap().remove("genre");

    let response = server
        .post("/api/v1/recommendations/collaborative")
        .json(&json!({ "playlist": [entry] }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("genre"));

    let response = server
        .post("/api/v1/models/content/train")
        .text("{ not json")
        .content_type("application/json")
        .await;

    assert!(response.status_code().is_client_error());
    let body: Value = response.json();
    assert!(body["error"].is_string());
}
