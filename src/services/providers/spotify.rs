/// Spotify Web API provider
///
/// Authenticates with the client credentials flow and resolves a track ID in
/// two calls:
/// 1. `/tracks/{id}` → name, artists, popularity, duration, album release date
/// 2. `/artists/{id}` for the first artist → genres (tracks carry none)
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{parse_release_year, SongRecord},
    services::providers::MetadataProvider,
};

const TRACK_CACHE_TTL: u64 = 86400; // 1 day
const GENRE_CACHE_TTL: u64 = 604800; // 1 week

/// Refresh this long before the token actually expires
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

const NO_GENRE: &str = "No Genre";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtistRef {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    release_date: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    artists: Vec<SpotifyArtistRef>,
    album: SpotifyAlbum,
    duration_ms: u64,
    popularity: u32,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Clone)]
pub struct SpotifyProvider {
    http_client: HttpClient,
    client_id: String,
    client_secret: String,
    api_url: String,
    token_url: String,
    cache: Option<Cache>,
    token: Arc<RwLock<Option<AccessToken>>>,
}

impl SpotifyProvider {
    pub fn new(
        client_id: String,
        client_secret: String,
        api_url: String,
        token_url: String,
        cache: Option<Cache>,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            client_id,
            client_secret,
            api_url: api_url.trim_end_matches('/').to_string(),
            token_url,
            cache,
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns a valid access token, requesting a new one when needed
    async fn access_token(&self) -> AppResult<String> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if token.expires_at > Utc::now() {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut guard = self.token.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *guard = Some(token);

        Ok(value)
    }

    async fn request_token(&self) -> AppResult<AccessToken> {
        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Spotify token request returned status {}: {}",
                status, body
            )));
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = (body.expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0);

        tracing::debug!(expires_in = body.expires_in, "Obtained Spotify access token");

        Ok(AccessToken {
            value: body.access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        })
    }

    /// GET `{api_url}/{path}` with the bearer token, deserializing the JSON body
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let token = self.access_token().await?;
        let url = format!("{}/{}", self.api_url, path);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Err(AppError::NotFound(format!("Spotify has no resource at {}", path)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Spotify API returned status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    /// Comma-joined genres of an artist, or "No Genre"
    async fn artist_genres(&self, artist_id: &str) -> AppResult<String> {
        let fetch = async {
            let artist: SpotifyArtist = self.get_json(&format!("artists/{}", artist_id)).await?;
            let genres = if artist.genres.is_empty() {
                NO_GENRE.to_string()
            } else {
                artist.genres.join(", ")
            };
            Ok::<_, AppError>(genres)
        };

        match &self.cache {
            Some(cache) => cached!(
                cache,
                CacheKey::ArtistGenres(artist_id.to_string()),
                GENRE_CACHE_TTL,
                fetch
            ),
            None => fetch.await,
        }
    }

    async fn fetch_track(&self, track_id: &str) -> AppResult<SongRecord> {
        let track: SpotifyTrack = self.get_json(&format!("tracks/{}", track_id)).await?;

        // Genre comes from the main (first) artist
        let genre = match track.artists.first() {
            Some(artist) => self.artist_genres(&artist.id).await?,
            None => NO_GENRE.to_string(),
        };

        let artist_names = track
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let song = SongRecord {
            track_id: track.id,
            track_name: track.name,
            artist_names,
            genre,
            popularity: f64::from(track.popularity),
            duration_ms: track.duration_ms as f64,
            year: parse_release_year(&track.album.release_date)?,
        };

        tracing::info!(
            track_id = %song.track_id,
            genre = %song.genre,
            "Fetched track from Spotify"
        );

        Ok(song)
    }
}

#[async_trait::async_trait]
impl MetadataProvider for SpotifyProvider {
    async fn lookup_track(&self, track_id: &str) -> AppResult<SongRecord> {
        let track_id = track_id.trim();
        if track_id.is_empty() {
            return Err(AppError::InvalidInput(
                "Track ID cannot be empty".to_string(),
            ));
        }

        match &self.cache {
            Some(cache) => cached!(
                cache,
                CacheKey::Track(track_id.to_string()),
                TRACK_CACHE_TTL,
                self.fetch_track(track_id)
            ),
            None => self.fetch_track(track_id).await,
        }
    }

    fn name(&self) -> &'static str {
        "Spotify"
    }
}
