//! Reproducible train/test partitioning and the features/target split.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::error::{RaterError, Result};
use crate::normalizer::NormalizedFrame;
use crate::record::{FEATURE_COLUMNS, TARGET_COLUMN};

const STAGE: &str = "split";

/// One side of a partition: model inputs, labels and the source rows they
/// came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSet {
    pub rows: Vec<usize>,
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
}

impl SplitSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestPartition {
    pub train: SplitSet,
    pub test: SplitSet,
}

/// Row counts for `n` rows at `test_size`: the test side is rounded up.
pub fn split_sizes(n: usize, test_size: f64) -> Result<(usize, usize)> {
    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);

    if n_train == 0 || n_test == 0 {
        return Err(RaterError::InsufficientData {
            stage: STAGE,
            rows: n,
        });
    }

    Ok((n_train, n_test))
}

/// Shuffle the row indices with a seeded generator and hand the first
/// `ceil(test_size * n)` rows to the test side.
pub fn split_indices(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    let (_, n_test) = split_sizes(n, test_size)?;

    // generate vector from 0 to # of rows
    let mut indices: Vec<usize> = (0..n).collect();

    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train_indices = indices[n_test..].to_vec();
    indices.truncate(n_test);

    Ok((train_indices, indices))
}

/// Split a normalized frame into training and testing frames.
pub fn train_test_split(
    frame: &NormalizedFrame,
    test_size: f64,
    seed: u64,
) -> Result<(NormalizedFrame, NormalizedFrame, Vec<usize>, Vec<usize>)> {
    let (train_indices, test_indices) = split_indices(frame.height(), test_size, seed)?;

    let train = frame.select_rows(&train_indices);
    let test = frame.select_rows(&test_indices);

    Ok((train, test, train_indices, test_indices))
}

/// Pull the model inputs and the stars target out of a normalized frame.
pub fn split_features_and_target(frame: &NormalizedFrame) -> Result<(Array2<f64>, Array1<f64>)> {
    let features = frame.select_columns(&FEATURE_COLUMNS)?;
    let target = frame
        .select_columns(&[TARGET_COLUMN])?
        .index_axis_move(Axis(1), 0);

    Ok((features, target))
}

/// Partition rows 80/20 (by default) and separate features from the target on
/// both sides. The frame is consumed; only the partition survives.
pub fn partition(frame: NormalizedFrame, test_size: f64, seed: u64) -> Result<TrainTestPartition> {
    let (train_frame, test_frame, train_rows, test_rows) =
        train_test_split(&frame, test_size, seed)?;

    let (x_train, y_train) = split_features_and_target(&train_frame)?;
    let (x_test, y_test) = split_features_and_target(&test_frame)?;

    info!(
        train = train_rows.len(),
        test = test_rows.len(),
        features = FEATURE_COLUMNS.len(),
        seed,
        "Partitioned listings"
    );

    Ok(TrainTestPartition {
        train: SplitSet {
            rows: train_rows,
            features: x_train,
            labels: y_train,
        },
        test: SplitSet {
            rows: test_rows,
            features: x_test,
            labels: y_test,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize_rows;
    use crate::projector::FeatureFrame;
    use crate::record::NUMERIC_COLUMNS;
    use std::collections::HashSet;

    fn frame(rows: usize) -> NormalizedFrame {
        let values = Array2::from_shape_fn((rows, NUMERIC_COLUMNS.len()), |(r, c)| {
            (r * NUMERIC_COLUMNS.len() + c + 1) as f64
        });
        normalize_rows(FeatureFrame::new(NUMERIC_COLUMNS.to_vec(), values).unwrap())
    }

    #[test]
    fn partition_is_disjoint_and_covers_every_row() {
        let (train, test) = split_indices(103, 0.2, 0).unwrap();

        let train_set: HashSet<_> = train.iter().copied().collect();
        let test_set: HashSet<_> = test.iter().copied().collect();

        assert!(train_set.is_disjoint(&test_set));
        assert_eq!(train_set.len() + test_set.len(), 103);
        assert_eq!(test.len(), 21);
        assert_eq!(train.len(), 82);
    }

    #[test]
    fn same_seed_same_partition() {
        let first = partition(frame(50), 0.2, 0).unwrap();
        let second = partition(frame(50), 0.2, 0).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn different_seed_changes_partition() {
        let (_, a) = split_indices(50, 0.2, 0).unwrap();
        let (_, b) = split_indices(50, 0.2, 1).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn features_exclude_stock_and_products() {
        let parts = partition(frame(10), 0.2, 0).unwrap();

        assert_eq!(parts.train.features.ncols(), 7);
        assert_eq!(parts.train.labels.len(), 8);
        assert_eq!(parts.test.features.nrows(), 2);

        // labels are the normalized stars column of the source rows
        let source = frame(10);
        for (label, row) in parts.test.labels.iter().zip(&parts.test.rows) {
            assert_eq!(*label, source.values()[[*row, 0]]);
        }
        // first feature is the normalized ratings column
        for (i, row) in parts.train.rows.iter().enumerate() {
            assert_eq!(parts.train.features[[i, 0]], source.values()[[*row, 1]]);
            assert_eq!(parts.train.features[[i, 4]], source.values()[[*row, 6]]);
        }
    }

    #[test]
    fn too_few_rows_is_insufficient_data() {
        for n in [0, 1] {
            let err = split_indices(n, 0.2, 0).unwrap_err();
            assert!(matches!(
                err,
                RaterError::InsufficientData { stage: "split", rows } if rows == n
            ));
        }
        assert_eq!(split_sizes(2, 0.2).unwrap(), (1, 1));
    }
}
