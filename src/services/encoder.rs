//! Feature encoding for song records
//!
//! `FeatureEncoder::fit` learns a fixed vocabulary per categorical field and the
//! mean/standard deviation per numeric field, and returns an immutable
//! `FittedEncoder`. Transforming never changes the learned state.
//!
//! Vector layout: one one-hot block per categorical field (in field order, block
//! width = vocabulary size), followed by one z-scored value per numeric field.

use std::collections::BTreeSet;
use std::collections::HashMap;

use ndarray::{Array1, Array2};

use crate::{
    error::{AppError, AppResult},
    models::SongRecord,
};

/// Categorical song fields that are one-hot encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalField {
    TrackId,
    TrackName,
    ArtistNames,
    Genre,
}

impl CategoricalField {
    pub fn value<'a>(&self, song: &'a SongRecord) -> &'a str {
        match self {
            CategoricalField::TrackId => &song.track_id,
            CategoricalField::TrackName => &song.track_name,
            CategoricalField::ArtistNames => &song.artist_names,
            CategoricalField::Genre => &song.genre,
        }
    }
}

/// Numeric song fields that are standardized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    Popularity,
    DurationMs,
}

impl NumericField {
    pub fn value(&self, song: &SongRecord) -> f64 {
        match self {
            NumericField::Popularity => song.popularity,
            NumericField::DurationMs => song.duration_ms,
        }
    }
}

/// Encoder configuration: which fields feed the feature vector
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    categorical: Vec<CategoricalField>,
    numeric: Vec<NumericField>,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEncoder {
    /// Encoder over track_id, track_name, artist_names, genre + popularity, duration_ms
    pub fn new() -> Self {
        Self {
            categorical: vec![
                CategoricalField::TrackId,
                CategoricalField::TrackName,
                CategoricalField::ArtistNames,
                CategoricalField::Genre,
            ],
            numeric: vec![NumericField::Popularity, NumericField::DurationMs],
        }
    }

    /// Learns vocabularies and numeric statistics from `rows`
    pub fn fit<'a, I>(&self, rows: I) -> AppResult<FittedEncoder>
    where
        I: IntoIterator<Item = &'a SongRecord>,
        I::IntoIter: Clone,
    {
        let rows = rows.into_iter();
        let count = rows.clone().count();

        if count == 0 {
            return Err(AppError::InsufficientRows(
                "Cannot fit feature encoder on an empty dataset".to_string(),
            ));
        }

        let blocks = self
            .categorical
            .iter()
            .map(|&field| OneHotBlock::fit(field, rows.clone()))
            .collect();

        let scalers = self
            .numeric
            .iter()
            .map(|&field| StandardScaler::fit(field, rows.clone(), count))
            .collect();

        let encoder = FittedEncoder { blocks, scalers };

        tracing::debug!(
            rows = count,
            dimension = encoder.dimension(),
            "Fitted feature encoder"
        );

        Ok(encoder)
    }
}

/// One-hot block for a single categorical field
#[derive(Debug, Clone, PartialEq)]
struct OneHotBlock {
    field: CategoricalField,
    /// Category → column offset within the block, in sorted category order
    vocabulary: HashMap<String, usize>,
}

impl OneHotBlock {
    fn fit<'a>(field: CategoricalField, rows: impl Iterator<Item = &'a SongRecord>) -> Self {
        let categories: BTreeSet<&str> = rows.map(|song| field.value(song)).collect();
        let vocabulary = categories
            .into_iter()
            .enumerate()
            .map(|(offset, category)| (category.to_string(), offset))
            .collect();

        Self { field, vocabulary }
    }

    fn width(&self) -> usize {
        self.vocabulary.len()
    }

    /// Offset of the row's category, or None for a category unseen at fit time
    fn offset(&self, song: &SongRecord) -> Option<usize> {
        self.vocabulary.get(self.field.value(song)).copied()
    }
}

/// Z-score scaler for a single numeric field (population standard deviation)
#[derive(Debug, Clone, PartialEq)]
struct StandardScaler {
    field: NumericField,
    mean: f64,
    scale: f64,
}

impl StandardScaler {
    fn fit<'a>(
        field: NumericField,
        rows: impl Iterator<Item = &'a SongRecord> + Clone,
        count: usize,
    ) -> Self {
        let n = count as f64;
        let mean = rows.clone().map(|song| field.value(song)).sum::<f64>() / n;
        let variance = rows
            .map(|song| (field.value(song) - mean).powi(2))
            .sum::<f64>()
            / n;
        let std = variance.sqrt();

        // Constant columns would divide by zero; they map to 0.0 instead
        let scale = if std > f64::EPSILON { std } else { 1.0 };

        Self { field, mean, scale }
    }

    fn transform(&self, song: &SongRecord) -> f64 {
        (self.field.value(song) - self.mean) / self.scale
    }
}

/// Immutable, fitted feature encoder
#[derive(Debug, Clone, PartialEq)]
pub struct FittedEncoder {
    blocks: Vec<OneHotBlock>,
    scalers: Vec<StandardScaler>,
}

impl FittedEncoder {
    /// Length of every vector this encoder produces
    pub fn dimension(&self) -> usize {
        self.blocks.iter().map(OneHotBlock::width).sum::<usize>() + self.scalers.len()
    }

    /// Vocabulary size learned for a categorical field
    pub fn vocabulary_size(&self, field: CategoricalField) -> usize {
        self.blocks
            .iter()
            .find(|b| b.field == field)
            .map(OneHotBlock::width)
            .unwrap_or(0)
    }

    /// Encodes one song
    ///
    /// Categories unseen at fit time leave their block all zero.
    pub fn transform(&self, song: &SongRecord) -> Array1<f64> {
        let mut vector = Array1::zeros(self.dimension());
        let mut start = 0;

        for block in &self.blocks {
            if let Some(offset) = block.offset(song) {
                vector[start + offset] = 1.0;
            }
            start += block.width();
        }

        for (i, scaler) in self.scalers.iter().enumerate() {
            vector[start + i] = scaler.transform(song);
        }

        vector
    }

    /// Encodes songs into a row-per-song matrix
    pub fn transform_batch<'a, I>(&self, songs: I) -> Array2<f64>
    where
        I: IntoIterator<Item = &'a SongRecord>,
    {
        let rows: Vec<Array1<f64>> = songs.into_iter().map(|s| self.transform(s)).collect();
        let mut matrix = Array2::zeros((rows.len(), self.dimension()));

        for (i, row) in rows.iter().enumerate() {
            matrix.row_mut(i).assign(row);
        }

        matrix
    }
}
