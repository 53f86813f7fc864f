pub mod classifier;
pub mod collaborative;
pub mod content;
pub mod encoder;
pub mod providers;
pub mod sampling;
pub mod similarity;

pub use classifier::{LikeClassifier, LogisticRegression};
pub use collaborative::{CollaborativeFilter, TrainedCollaborativeFilter};
pub use content::{ContentRecommender, TrainedContentRecommender, TrainingSummary};
pub use encoder::{FeatureEncoder, FittedEncoder};
pub use providers::{resolve_track, MetadataProvider, SpotifyProvider};
