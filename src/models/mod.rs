pub mod dataset;
pub mod song;

pub use dataset::{write_songs, SongDataset};
pub use song::{parse_release_year, ScoredSong, SongRecord};
