//! shop-rater: star-rating estimates for e-commerce listings
//!
//! Listings of one product category are projected onto their numeric columns,
//! normalized row by row, split 80/20, and used to fit a 200-tree random
//! forest. The fitted forest then rates a hypothetical listing described by
//! seven seller and item attributes.
//!
//! ```no_run
//! use shop_rater::{load_listings, train_rating_model, PipelineConfig, PredictionQuery};
//!
//! # fn main() -> shop_rater::Result<()> {
//! let df = load_listings("listings.csv", Some("Watches"))?;
//! let rater = train_rating_model(df, &PipelineConfig::default())?;
//! println!("Prediction accuracy: {}%", rater.accuracy_percent());
//!
//! let estimate = rater.estimate(&PredictionQuery::default())?;
//! println!("Item rating estimate (Stars): {}", estimate.rounded());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod forest;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod prediction;
pub mod projector;
pub mod record;
pub mod splitter;

pub use config::{ForestConfig, MaxFeatures, PipelineConfig};
pub use error::{RaterError, Result};
pub use forest::{FittedForest, RandomForestRegressor};
pub use normalizer::{normalize_matrix, normalize_rows, NormalizedFrame};
pub use pipeline::{train_rating_model, TrainedRater};
pub use prediction::{
    estimate_stars, parse_query_field, response_rate_from_percent, stars_from_normalized,
    PredictionQuery, StarEstimate,
};
pub use projector::{project_features, FeatureFrame};
pub use record::{
    known_categories, load_listings, records_to_frame, Column, RawRecord, FEATURE_COLUMNS,
    NUMERIC_COLUMNS, TARGET_COLUMN,
};
pub use splitter::{partition, split_features_and_target, train_test_split, TrainTestPartition};
