use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Candidate catalog CSV (the global song dataset)
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// Liked songs CSV used to train the content model
    #[serde(default = "default_liked_songs_path")]
    pub liked_songs_path: String,

    /// Redis connection URL for the metadata cache; caching is off when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Spotify client credentials. Upstream lookups are disabled unless both are set.
    #[serde(default)]
    pub spotify_client_id: Option<String>,
    #[serde(default)]
    pub spotify_client_secret: Option<String>,

    /// Spotify Web API base URL
    #[serde(default = "default_spotify_api_url")]
    pub spotify_api_url: String,

    /// Spotify accounts token endpoint
    #[serde(default = "default_spotify_token_url")]
    pub spotify_token_url: String,

    /// Recommendations returned when a request does not specify a count
    #[serde(default = "default_num_recs")]
    pub default_num_recs: usize,

    /// Neighbors per query for collaborative filtering
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Songs sampled from each source when training the content model
    #[serde(default = "default_training_songs")]
    pub training_songs: usize,

    /// Share of the labelled sample held out as the recommendation pool
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,

    /// Fixed seed for content model sampling; random when unset
    #[serde(default)]
    pub training_seed: Option<u64>,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_catalog_path() -> String {
    "data/spotify_data.csv".to_string()
}

fn default_liked_songs_path() -> String {
    "data/liked_songs.csv".to_string()
}

fn default_spotify_api_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_spotify_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_num_recs() -> usize {
    30
}

fn default_k() -> usize {
    30
}

fn default_training_songs() -> usize {
    100
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Spotify credentials, present only when both halves are configured
    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        match (&self.spotify_client_id, &self.spotify_client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.clone(), secret.clone()))
            }
            _ => None,
        }
    }
}
