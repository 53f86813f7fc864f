use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// One row of tabular song data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongRecord {
    pub track_id: String,
    pub track_name: String,
    pub artist_names: String,
    pub genre: String,
    /// Streaming popularity, 0–100
    pub popularity: f64,
    pub duration_ms: f64,
    pub year: i32,
}

impl SongRecord {
    /// Decade bucket derived from the release year (1994 → 1990)
    pub fn decade(&self) -> i32 {
        self.year.div_euclid(10) * 10
    }
}

/// A recommended song together with its ranking score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredSong {
    #[serde(flatten)]
    pub song: SongRecord,
    pub score: f64,
}

/// Parses a release year from `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
pub fn parse_release_year(raw: &str) -> AppResult<i32> {
    let year = raw.trim().split('-').next().unwrap_or_default();

    year.parse::<i32>()
        .ok()
        .or_else(|| {
            year.parse::<f64>()
                .ok()
                .filter(|y| y.is_finite())
                .map(|y| y.trunc() as i32)
        })
        .ok_or_else(|| AppError::InvalidInput(format!("Invalid release date '{}'", raw)))
}
