use std::sync::Arc;

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{ScoredSong, SongDataset, SongRecord},
    services::{
        classifier::{LikeClassifier, LogisticRegression},
        encoder::{FeatureEncoder, FittedEncoder},
        sampling::{sample_without_replacement, stratified_split},
        similarity::cosine_similarity,
    },
};

/// Outcome of one content-model training run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingSummary {
    /// Songs drawn from each source
    pub n_songs: usize,
    pub labelled_rows: usize,
    pub train_rows: usize,
    /// Held-out rows, which become the recommendation pool
    pub pool_rows: usize,
    pub test_fraction: f64,
    pub seed: Option<u64>,
}

/// Content-based recommender over liked songs (preprocessed state)
pub struct ContentRecommender {
    catalog: Arc<SongDataset>,
    liked: Arc<SongDataset>,
    encoder: FittedEncoder,
}

impl ContentRecommender {
    /// Fits one encoder over catalog and liked songs together, so both share a vocabulary
    pub fn preprocess(catalog: Arc<SongDataset>, liked: Arc<SongDataset>) -> AppResult<Self> {
        let encoder = FeatureEncoder::new().fit(catalog.iter().chain(liked.iter()))?;

        tracing::info!(
            catalog_rows = catalog.len(),
            liked_rows = liked.len(),
            dimension = encoder.dimension(),
            "Preprocessed songs for content recommendations"
        );

        Ok(Self {
            catalog,
            liked,
            encoder,
        })
    }

    pub fn encoder(&self) -> &FittedEncoder {
        &self.encoder
    }

    /// Trains the default logistic-regression like classifier
    pub fn train<R>(
        &self,
        n: usize,
        test_fraction: f64,
        rng: &mut R,
    ) -> AppResult<TrainedContentRecommender>
    where
        R: Rng + ?Sized,
    {
        self.train_with(LogisticRegression::new(), n, test_fraction, rng)
    }

    /// Trains `classifier` on `n` liked and `n` random catalog songs
    ///
    /// The held-out split of the labelled set is kept as the pool that
    /// recommendations are drawn from. On failure `self` is unchanged.
    pub fn train_with<C, R>(
        &self,
        mut classifier: C,
        n: usize,
        test_fraction: f64,
        rng: &mut R,
    ) -> AppResult<TrainedContentRecommender<C>>
    where
        C: LikeClassifier,
        R: Rng + ?Sized,
    {
        if n == 0 {
            return Err(AppError::InvalidInput(
                "Training needs at least one song per source".to_string(),
            ));
        }

        // 1. Balanced sample: liked = 1, random catalog = 0
        let liked = sample_without_replacement(self.liked.songs(), n, rng, "liked songs")?;
        let random = sample_without_replacement(self.catalog.songs(), n, rng, "catalog")?;

        let labelled: Vec<(&SongRecord, u8)> = liked
            .into_iter()
            .map(|song| (song, 1))
            .chain(random.into_iter().map(|song| (song, 0)))
            .collect();
        let labelled_rows = labelled.len();

        // 2. Stratified train/test split
        let split = stratified_split(labelled, test_fraction, rng)?;

        // 3. Fit the classifier on the training split
        let train_features = self
            .encoder
            .transform_batch(split.train.iter().map(|(song, _)| *song));
        classifier.fit(&train_features, &split.train_labels())?;

        // 4. Keep the test split as the candidate pool
        let pool: Vec<SongRecord> = split.test.iter().map(|(song, _)| (*song).clone()).collect();
        let pool_features = self.encoder.transform_batch(&pool);

        let summary = TrainingSummary {
            n_songs: n,
            labelled_rows,
            train_rows: split.train.len(),
            pool_rows: pool.len(),
            test_fraction,
            seed: None,
        };

        tracing::info!(
            n_songs = n,
            train_rows = summary.train_rows,
            pool_rows = summary.pool_rows,
            "Trained content recommender"
        );

        Ok(TrainedContentRecommender {
            catalog: Arc::clone(&self.catalog),
            encoder: self.encoder.clone(),
            classifier,
            pool,
            pool_features,
            summary,
        })
    }
}

/// Content recommender ready to answer queries
pub struct TrainedContentRecommender<C = LogisticRegression> {
    catalog: Arc<SongDataset>,
    encoder: FittedEncoder,
    classifier: C,
    pool: Vec<SongRecord>,
    pool_features: Array2<f64>,
    summary: TrainingSummary,
}

impl<C: LikeClassifier> TrainedContentRecommender<C> {
    /// Records the seed that drove sampling
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.summary.seed = Some(seed);
        self
    }

    pub fn summary(&self) -> &TrainingSummary {
        &self.summary
    }

    pub fn pool(&self) -> &[SongRecord] {
        &self.pool
    }

    /// Top `num_recs` pool songs for a catalog song
    pub fn recommend(&self, song_id: &str, num_recs: usize) -> AppResult<Vec<ScoredSong>> {
        let song = self
            .catalog
            .find(song_id)
            .ok_or_else(|| AppError::NotFound(format!("Song {} not found", song_id)))?;

        self.recommend_for_song(song, num_recs)
    }

    /// Top `num_recs` pool songs for any song record
    ///
    /// Score is cosine similarity to the pool song times the query's like
    /// probability. Equal scores keep pool order.
    pub fn recommend_for_song(
        &self,
        song: &SongRecord,
        num_recs: usize,
    ) -> AppResult<Vec<ScoredSong>> {
        let vector = self.encoder.transform(song);
        let probability = self.classifier.predict_proba(&vector)?;

        let mut scored: Vec<(usize, f64)> = self
            .pool_features
            .rows()
            .into_iter()
            .map(|row| cosine_similarity(vector.view(), row) * probability)
            .enumerate()
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(num_recs);

        tracing::debug!(
            track_id = %song.track_id,
            probability,
            returned = scored.len(),
            "Content recommendations computed"
        );

        Ok(scored
            .into_iter()
            .map(|(index, score)| ScoredSong {
                song: self.pool[index].clone(),
                score,
            })
            .collect())
    }
}
