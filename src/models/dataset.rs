use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use super::song::{parse_release_year, SongRecord};
use crate::error::{AppError, AppResult};

/// Logical columns every song dataset must provide, with the header aliases
/// used by the data-collection exports
const COLUMNS: [(&str, &[&str]); 7] = [
    ("track_id", &[]),
    ("track_name", &[]),
    ("artist_names", &["artist_name", "artists_names"]),
    ("genre", &[]),
    ("popularity", &[]),
    ("duration_ms", &[]),
    ("year", &["release_date"]),
];

/// Header positions of the required columns, in `COLUMNS` order
struct ColumnPositions([usize; 7]);

impl ColumnPositions {
    fn resolve(headers: &csv::StringRecord) -> AppResult<Self> {
        let mut positions = [0usize; 7];
        let mut missing = Vec::new();

        for (slot, (name, aliases)) in COLUMNS.iter().enumerate() {
            let found = headers.iter().position(|header| {
                let header = header.trim();
                header == *name || aliases.contains(&header)
            });

            match found {
                Some(position) => positions[slot] = position,
                None => missing.push(name.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(AppError::MissingColumns(missing));
        }

        Ok(Self(positions))
    }

    fn parse(&self, record: &csv::StringRecord, line: usize) -> AppResult<SongRecord> {
        let cell = |slot: usize| record.get(self.0[slot]).unwrap_or_default().trim();

        let numeric = |slot: usize| -> AppResult<f64> {
            match cell(slot).parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(AppError::InvalidInput(format!(
                    "Line {}: column '{}' is not a finite number: '{}'",
                    line,
                    COLUMNS[slot].0,
                    cell(slot)
                ))),
            }
        };

        let year = parse_release_year(cell(6))
            .map_err(|e| AppError::InvalidInput(format!("Line {}: {}", line, e)))?;

        Ok(SongRecord {
            track_id: cell(0).to_string(),
            track_name: cell(1).to_string(),
            artist_names: cell(2).to_string(),
            genre: cell(3).to_string(),
            popularity: numeric(4)?,
            duration_ms: numeric(5)?,
            year,
        })
    }
}

/// An ordered, read-only collection of songs (a playlist or the global catalog)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongDataset {
    songs: Vec<SongRecord>,
}

impl SongDataset {
    pub fn new(songs: Vec<SongRecord>) -> Self {
        Self { songs }
    }

    /// Loads a dataset from a CSV file with a header row
    pub fn from_path<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let dataset = Self::from_reader(File::open(path)?)?;

        tracing::info!(
            path = %path.display(),
            rows = dataset.len(),
            "Loaded song dataset"
        );

        Ok(dataset)
    }

    /// Parses CSV song data
    ///
    /// Required columns are checked against the header before any row is read.
    /// Columns outside the song record (audio features, album, uri, ...) are ignored.
    pub fn from_reader<R: Read>(reader: R) -> AppResult<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let positions = ColumnPositions::resolve(reader.headers()?)?;

        let mut songs = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            // header is line 1
            songs.push(positions.parse(&record, index + 2)?);
        }

        Ok(Self::new(songs))
    }

    pub fn songs(&self) -> &[SongRecord] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SongRecord> {
        self.songs.iter()
    }

    /// First song with the given track ID
    pub fn find(&self, track_id: &str) -> Option<&SongRecord> {
        self.songs.iter().find(|s| s.track_id == track_id)
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.find(track_id).is_some()
    }

    pub fn track_ids(&self) -> HashSet<&str> {
        self.songs.iter().map(|s| s.track_id.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a SongDataset {
    type Item = &'a SongRecord;
    type IntoIter = std::slice::Iter<'a, SongRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.songs.iter()
    }
}

impl From<Vec<SongRecord>> for SongDataset {
    fn from(songs: Vec<SongRecord>) -> Self {
        Self::new(songs)
    }
}

/// Writes any sequence of songs as CSV with a header row
pub fn write_songs<'a, I, W>(songs: I, writer: W) -> AppResult<()>
where
    I: IntoIterator<Item = &'a SongRecord>,
    W: Write,
{
    let mut writer = csv::Writer::from_writer(writer);
    for song in songs {
        writer.serialize(song)?;
    }
    writer.flush()?;
    Ok(())
}
