/// Song metadata providers
///
/// Recommendation requests may name songs that are not in the local catalog.
/// A provider resolves such a track ID into a full `SongRecord` using a
/// music-streaming API, so it can be encoded like any catalog row.
use crate::{
    error::{AppError, AppResult},
    models::SongRecord,
};

pub mod spotify;

pub use spotify::SpotifyProvider;

/// Trait for song metadata sources
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetches the song with the given track ID
    async fn lookup_track(&self, track_id: &str) -> AppResult<SongRecord>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Looks up a track, reporting any upstream failure as `NotFound`
///
/// Callers only need to know whether the song could be resolved; the
/// upstream cause is logged here.
pub async fn resolve_track(
    provider: &dyn MetadataProvider,
    track_id: &str,
) -> AppResult<SongRecord> {
    match provider.lookup_track(track_id).await {
        Ok(song) => {
            tracing::info!(
                provider = provider.name(),
                track_id = %track_id,
                "Resolved track from provider"
            );
            Ok(song)
        }
        Err(AppError::NotFound(msg)) => Err(AppError::NotFound(msg)),
        Err(e) => {
            tracing::warn!(
                provider = provider.name(),
                track_id = %track_id,
                error = %e,
                "Upstream track lookup failed"
            );
            Err(AppError::NotFound(format!(
                "Song {} could not be resolved",
                track_id
            )))
        }
    }
}
