use std::collections::HashSet;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1};

use crate::{
    error::{AppError, AppResult},
    models::{SongDataset, SongRecord},
    services::{
        encoder::{FeatureEncoder, FittedEncoder},
        similarity::NearestNeighbors,
    },
};

/// Playlist-seeded nearest-neighbor recommender (preprocessed state)
///
/// The encoder is fitted on the playlist only. Candidates are catalog songs,
/// one per `track_id`, encoded in the playlist's feature space, so neighbors are
/// identified by `track_id` rather than by a row position shared between the
/// playlist and the catalog.
pub struct CollaborativeFilter {
    playlist: SongDataset,
    catalog: Arc<SongDataset>,
    encoder: FittedEncoder,
    playlist_features: Array2<f64>,
}

impl CollaborativeFilter {
    /// Fits the feature encoder on the playlist and encodes it
    pub fn preprocess(playlist: SongDataset, catalog: Arc<SongDataset>) -> AppResult<Self> {
        if playlist.is_empty() {
            return Err(AppError::InsufficientRows(
                "Playlist has no songs to learn from".to_string(),
            ));
        }

        let encoder = FeatureEncoder::new().fit(&playlist)?;
        let playlist_features = encoder.transform_batch(&playlist);

        tracing::info!(
            playlist_rows = playlist.len(),
            catalog_rows = catalog.len(),
            dimension = encoder.dimension(),
            "Preprocessed playlist for collaborative filtering"
        );

        Ok(Self {
            playlist,
            catalog,
            encoder,
            playlist_features,
        })
    }

    pub fn encoder(&self) -> &FittedEncoder {
        &self.encoder
    }

    pub fn playlist(&self) -> &SongDataset {
        &self.playlist
    }

    /// Playlist rows in encoded form, one row per playlist song
    pub fn playlist_features(&self) -> &Array2<f64> {
        &self.playlist_features
    }

    /// Prepares a cosine neighbor search returning `k` songs per query
    ///
    /// `k` may not exceed the playlist size; on failure `self` is unchanged.
    /// A catalog with fewer than `k` candidates is not an error, it only
    /// bounds how many songs `recommend` can return.
    pub fn train(&self, k: usize) -> AppResult<TrainedCollaborativeFilter<'_>> {
        let playlist_rows = self.playlist_features.nrows();
        if k == 0 || k > playlist_rows {
            return Err(AppError::InsufficientRows(format!(
                "Insufficient neighbors: k = {} but the playlist has {} songs",
                k, playlist_rows
            )));
        }

        // One candidate per track_id, first catalog occurrence wins
        let mut seen = HashSet::new();
        let candidates: Vec<&SongRecord> = self
            .catalog
            .iter()
            .filter(|song| seen.insert(song.track_id.as_str()))
            .collect();

        let index = NearestNeighbors::new(k)?;

        tracing::info!(k, candidates = candidates.len(), "Trained neighbor search");

        Ok(TrainedCollaborativeFilter {
            filter: self,
            candidates,
            index,
        })
    }
}

/// Collaborative recommender ready to answer queries
pub struct TrainedCollaborativeFilter<'a> {
    filter: &'a CollaborativeFilter,
    candidates: Vec<&'a SongRecord>,
    index: NearestNeighbors,
}

impl<'a> TrainedCollaborativeFilter<'a> {
    pub fn k(&self) -> usize {
        self.index.n_neighbors()
    }

    /// Recommends up to `k` catalog songs close to the query songs
    ///
    /// Candidates already in the playlist (or among the queries) are skipped
    /// before ranking, so exactly `k` songs come back whenever enough
    /// candidates remain. Results from several queries are merged in query
    /// order without duplicates.
    pub fn recommend(&self, queries: &[SongRecord]) -> Vec<SongRecord> {
        let mut excluded: HashSet<&str> = self.filter.playlist.track_ids();
        excluded.extend(queries.iter().map(|q| q.track_id.as_str()));

        let vectors: Vec<Array1<f64>> = queries
            .iter()
            .map(|query| self.filter.encoder.transform(query))
            .collect();

        self.rank(vectors.iter().map(|v| v.view()), &excluded)
    }

    /// Recommends for playlist songs given by row, using their stored encoding
    pub fn recommend_playlist_rows(&self, rows: &[usize]) -> AppResult<Vec<SongRecord>> {
        let features = &self.filter.playlist_features;
        if let Some(row) = rows.iter().find(|&&row| row >= features.nrows()) {
            return Err(AppError::InvalidInput(format!(
                "Playlist row {} out of range ({} rows)",
                row,
                features.nrows()
            )));
        }

        let excluded = self.filter.playlist.track_ids();
        Ok(self.rank(rows.iter().map(|&row| features.row(row)), &excluded))
    }

    /// Recommends for a song identified by `track_id` (playlist first, then catalog)
    pub fn recommend_for_track(&self, track_id: &str) -> AppResult<Vec<SongRecord>> {
        let query = self
            .filter
            .playlist
            .find(track_id)
            .or_else(|| self.filter.catalog.find(track_id))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Song {} not found", track_id)))?;

        Ok(self.recommend(std::slice::from_ref(&query)))
    }

    /// Streams the remaining candidates past each query, keeping the `k` nearest
    fn rank<'q, I>(&self, queries: I, excluded: &HashSet<&str>) -> Vec<SongRecord>
    where
        I: Iterator<Item = ArrayView1<'q, f64>>,
    {
        let k = self.k();
        let mut chosen: HashSet<usize> = HashSet::new();
        let mut recommendations = Vec::new();
        let mut queried = 0;

        for query in queries {
            if recommendations.len() == k {
                break;
            }
            queried += 1;

            let remaining = self
                .candidates
                .iter()
                .enumerate()
                .filter(|(i, song)| {
                    !chosen.contains(i) && !excluded.contains(song.track_id.as_str())
                })
                .map(|(i, song)| (i, self.filter.encoder.transform(song)));

            let neighbors = self.index.search(query, remaining);

            for neighbor in neighbors {
                if recommendations.len() == k {
                    break;
                }
                chosen.insert(neighbor.index);
                recommendations.push(self.candidates[neighbor.index].clone());
            }
        }

        tracing::info!(
            queries = queried,
            k,
            returned = recommendations.len(),
            "Collaborative recommendations computed"
        );

        recommendations
    }
}
