//! End-to-end training run: project, normalize, split, fit, score.
//!
//! Each stage takes ownership of the previous stage's output. Only the fitted
//! forest and its held-out accuracy outlive the run.

use polars::prelude::DataFrame;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{RaterError, Result};
use crate::forest::{FittedForest, RandomForestRegressor};
use crate::metrics::accuracy_percent;
use crate::normalizer::normalize_rows;
use crate::prediction::{estimate_stars, PredictionQuery, StarEstimate};
use crate::projector::project_features;
use crate::splitter::{partition, split_sizes};

/// A forest fitted on one category's listings, with its held-out R².
#[derive(Debug, Clone)]
pub struct TrainedRater {
    model: FittedForest,
    r2: f64,
    train_rows: usize,
    test_rows: usize,
}

impl TrainedRater {
    pub fn model(&self) -> &FittedForest {
        &self.model
    }

    /// Coefficient of determination on the test rows
    pub fn r2(&self) -> f64 {
        self.r2
    }

    /// R² as a percentage rounded to four decimals
    pub fn accuracy_percent(&self) -> f64 {
        accuracy_percent(self.r2)
    }

    pub fn train_rows(&self) -> usize {
        self.train_rows
    }

    pub fn test_rows(&self) -> usize {
        self.test_rows
    }

    pub fn estimate(&self, query: &PredictionQuery) -> Result<StarEstimate> {
        estimate_stars(&self.model, query)
    }
}

/// Train and score a rating model on a listing frame.
pub fn train_rating_model(df: DataFrame, config: &PipelineConfig) -> Result<TrainedRater> {
    config.validate()?;

    // Refuse before doing any work when the rows cannot fill both sides
    if df.height() == 0 {
        return Err(RaterError::InsufficientData {
            stage: "loading",
            rows: 0,
        });
    }
    split_sizes(df.height(), config.test_size)?;

    // 1. Keep the numeric columns
    let projected = project_features(df)?;

    // 2. Rescale every row to unit length
    let normalized = normalize_rows(projected);

    // 3. Split into training and testing sets, then features and target
    let parts = partition(normalized, config.test_size, config.seed)?;

    // 4. Fit the forest
    let model = RandomForestRegressor::new(config.forest.clone(), config.seed)
        .fit(&parts.train.features, &parts.train.labels)?;

    // 5. Score it on the held-out rows
    let r2 = model.score(&parts.test.features, &parts.test.labels)?;

    info!(
        accuracy = accuracy_percent(r2),
        train = parts.train.len(),
        test = parts.test.len(),
        "Rating model ready"
    );

    Ok(TrainedRater {
        model,
        r2,
        train_rows: parts.train.len(),
        test_rows: parts.test.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{records_to_frame, sample_record};

    #[test]
    fn empty_frame_is_insufficient_data() {
        let df = records_to_frame(&[]).unwrap();

        let err = train_rating_model(df, &PipelineConfig::default()).unwrap_err();

        assert!(matches!(err, RaterError::InsufficientData { rows: 0, .. }));
    }

    #[test]
    fn single_row_is_insufficient_data() {
        let df = records_to_frame(&[sample_record(4.0)]).unwrap();

        let err = train_rating_model(df, &PipelineConfig::default()).unwrap_err();

        assert!(matches!(
            err,
            RaterError::InsufficientData {
                stage: "split",
                rows: 1
            }
        ));
    }

    #[test]
    fn invalid_config_stops_the_run() {
        let df = records_to_frame(&[sample_record(4.0), sample_record(3.0)]).unwrap();
        let config = PipelineConfig {
            test_size: 1.5,
            ..PipelineConfig::default()
        };

        let err = train_rating_model(df, &config).unwrap_err();

        assert!(matches!(err, RaterError::InvalidConfig(_)));
    }
}
