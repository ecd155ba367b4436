//! Bagged ensemble of regression trees
//!
//! Each tree is grown on a bootstrap resample of the training rows and looks
//! at a random subset of features at every node. The forest predicts the mean
//! of its trees.
//!
//! Tree seeds are drawn from one seeded generator before any tree is built, so
//! the fitted forest does not depend on how rayon schedules the work.

mod tree;

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::ForestConfig;
use crate::error::{RaterError, Result};
use crate::metrics::{mse, r2_score};
use tree::{RegressionTree, TreeParams};

pub struct RandomForestRegressor {
    config: ForestConfig,
    seed: u64,
}

impl RandomForestRegressor {
    pub fn new(config: ForestConfig, seed: u64) -> Self {
        Self { config, seed }
    }

    /// Fit the forest on training features and labels.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FittedForest> {
        self.config.validate()?;

        if x.nrows() != y.len() {
            return Err(RaterError::schema(
                "fit",
                format!("{} feature rows but {} labels", x.nrows(), y.len()),
            ));
        }
        if x.ncols() == 0 {
            return Err(RaterError::schema("fit", "feature matrix has no columns"));
        }
        if x.nrows() == 0 {
            return Err(RaterError::InsufficientData {
                stage: "fit",
                rows: 0,
            });
        }

        let n_rows = x.nrows();
        let params = TreeParams::from_config(&self.config, x.ncols());

        let mut rng = StdRng::seed_from_u64(self.seed);
        let seeds: Vec<u64> = (0..self.config.n_estimators).map(|_| rng.gen()).collect();

        let x = x.view();
        let y = y.view();
        let trees: Vec<RegressionTree> = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let samples = bootstrap(n_rows, &mut rng);
                RegressionTree::fit(x, y, samples, &params, &mut rng)
            })
            .collect();

        debug!(
            max_features = params.max_features,
            mean_leaves = trees.iter().map(RegressionTree::n_leaves).sum::<usize>() as f64
                / trees.len() as f64,
            "Grew trees"
        );
        info!(
            trees = trees.len(),
            rows = n_rows,
            features = x.ncols(),
            "Fitted random forest"
        );

        Ok(FittedForest {
            trees,
            n_features: x.ncols(),
        })
    }
}

/// `n` row indices drawn with replacement
fn bootstrap<R: Rng>(n: usize, rng: &mut R) -> Vec<usize> {
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

/// A trained forest. Never mutated after fitting; safe to share across
/// threads for prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl FittedForest {
    /// Number of feature columns seen during fit
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// One prediction per row: the mean of all trees' outputs.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(RaterError::schema(
                "prediction",
                format!(
                    "model was fitted on {} feature columns, got {}",
                    self.n_features,
                    x.ncols()
                ),
            ));
        }

        Ok(x.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        sum / self.trees.len() as f64
    }

    /// R² of the forest's predictions against held-out labels.
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        if x.nrows() != y.len() {
            return Err(RaterError::schema(
                "scoring",
                format!("{} feature rows but {} labels", x.nrows(), y.len()),
            ));
        }
        if y.is_empty() {
            return Err(RaterError::InsufficientData {
                stage: "scoring",
                rows: 0,
            });
        }

        let actual = y.to_vec();
        let predicted = self.predict(x)?.to_vec();
        let r2 = r2_score(&actual, &predicted);

        info!(
            r2,
            mse = mse(&actual, &predicted),
            rows = actual.len(),
            "Scored forest on held-out rows"
        );
        Ok(r2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaxFeatures;
    use ndarray::array;

    fn small_config(n_estimators: usize) -> ForestConfig {
        ForestConfig {
            n_estimators,
            ..ForestConfig::default()
        }
    }

    fn noisy_line(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 3), |(r, c)| match c {
            0 => r as f64 / n as f64,
            1 => ((r * 31) % 17) as f64,
            _ => 1.0,
        });
        let y = Array1::from_shape_fn(n, |r| 2.0 * r as f64 / n as f64 + ((r % 3) as f64) * 0.01);
        (x, y)
    }

    #[test]
    fn fits_the_configured_number_of_trees() {
        let (x, y) = noisy_line(40);

        let forest = RandomForestRegressor::new(small_config(25), 0)
            .fit(&x, &y)
            .unwrap();

        assert_eq!(forest.n_trees(), 25);
        assert_eq!(forest.n_features(), 3);
    }

    #[test]
    fn default_forest_has_two_hundred_trees() {
        let (x, y) = noisy_line(20);

        let forest = RandomForestRegressor::new(ForestConfig::default(), 0)
            .fit(&x, &y)
            .unwrap();

        assert_eq!(forest.n_trees(), 200);
    }

    #[test]
    fn learns_a_monotone_signal() {
        let (x, y) = noisy_line(200);
        let forest = RandomForestRegressor::new(small_config(50), 0)
            .fit(&x, &y)
            .unwrap();

        let r2 = forest.score(&x, &y).unwrap();

        assert!(r2 > 0.95, "r2 = {r2}");
    }

    #[test]
    fn constant_features_predict_label_mean() {
        let x = Array2::from_elem((100, 7), 0.25);
        let y = Array1::from_shape_fn(100, |r| 1.0 + 4.0 * r as f64 / 99.0);
        let mean = y.mean().unwrap();

        let forest = RandomForestRegressor::new(ForestConfig::default(), 0)
            .fit(&x, &y)
            .unwrap();
        let predicted = forest.predict(&Array2::from_elem((1, 7), 0.25)).unwrap();

        // every tree is a single leaf holding its bootstrap mean
        assert!((predicted[0] - mean).abs() < 0.15, "{} vs {mean}", predicted[0]);
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = noisy_line(60);
        let regressor = RandomForestRegressor::new(small_config(20), 7);

        assert_eq!(regressor.fit(&x, &y).unwrap(), regressor.fit(&x, &y).unwrap());
    }

    #[test]
    fn thread_count_does_not_change_the_forest() {
        let (x, y) = noisy_line(60);
        let regressor = RandomForestRegressor::new(small_config(30), 3);

        let fit_with = |threads: usize| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| regressor.fit(&x, &y).unwrap())
        };

        let single = fit_with(1);
        let many = fit_with(4);

        assert_eq!(single, many);
        assert_eq!(single.predict(&x).unwrap(), many.predict(&x).unwrap());
    }

    #[test]
    fn rejects_wrong_column_count() {
        let (x, y) = noisy_line(30);
        let forest = RandomForestRegressor::new(small_config(5), 0)
            .fit(&x, &y)
            .unwrap();

        let err = forest.predict(&array![[0.1, 0.2]]).unwrap_err();

        match err {
            RaterError::SchemaMismatch { stage, detail } => {
                assert_eq!(stage, "prediction");
                assert!(detail.contains("3"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_mismatched_labels_and_empty_training_set() {
        let regressor = RandomForestRegressor::new(small_config(5), 0);

        let err = regressor
            .fit(&Array2::zeros((3, 2)), &Array1::zeros(2))
            .unwrap_err();
        assert!(matches!(err, RaterError::SchemaMismatch { .. }));

        let err = regressor
            .fit(&Array2::zeros((0, 2)), &Array1::zeros(0))
            .unwrap_err();
        assert!(matches!(err, RaterError::InsufficientData { rows: 0, .. }));
    }

    #[test]
    fn sqrt_features_still_fits() {
        let (x, y) = noisy_line(80);
        let config = ForestConfig {
            n_estimators: 20,
            max_features: MaxFeatures::Sqrt,
            ..ForestConfig::default()
        };

        let forest = RandomForestRegressor::new(config, 0).fit(&x, &y).unwrap();

        assert!(forest.score(&x, &y).unwrap() > 0.8);
    }
}
