//! Row-wise L2 normalization
//!
//! Every row is rescaled by its own Euclidean norm, independently of every
//! other row. No statistics are carried from fitting to inference, so a single
//! query row is normalized exactly the way a training row was.
//!
//! Rows whose norm is exactly zero are left as zero vectors.

use ndarray::{Array2, ArrayViewMut1, Axis};
use tracing::{debug, warn};

use crate::error::Result;
use crate::projector::FeatureFrame;
use crate::record::Column;

/// A [`FeatureFrame`] whose rows have unit norm (or are all zero).
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFrame {
    frame: FeatureFrame,
}

impl NormalizedFrame {
    pub fn columns(&self) -> &[Column] {
        self.frame.columns()
    }

    pub fn values(&self) -> &Array2<f64> {
        self.frame.values()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn select_columns(&self, columns: &[Column]) -> Result<Array2<f64>> {
        self.frame.select_columns(columns)
    }

    pub fn select_rows(&self, rows: &[usize]) -> NormalizedFrame {
        NormalizedFrame {
            frame: self.frame.select_rows(rows),
        }
    }
}

/// Normalize every row of a projected frame, consuming it.
pub fn normalize_rows(frame: FeatureFrame) -> NormalizedFrame {
    let (columns, values) = frame.into_parts();

    NormalizedFrame {
        frame: FeatureFrame {
            columns,
            values: normalize_matrix(values),
        },
    }
}

/// Divide each row by its Euclidean norm, in place on the owned matrix.
pub fn normalize_matrix(mut values: Array2<f64>) -> Array2<f64> {
    let mut degenerate = 0usize;
    for row in values.axis_iter_mut(Axis(0)) {
        if !normalize_row(row) {
            degenerate += 1;
        }
    }

    if degenerate > 0 {
        warn!(rows = degenerate, "Rows with zero norm left as zero vectors");
    }
    debug!(
        rows = values.nrows(),
        columns = values.ncols(),
        "Normalized rows"
    );

    values
}

/// Returns `false` when the row had zero norm and was left untouched.
pub fn normalize_row(mut row: ArrayViewMut1<'_, f64>) -> bool {
    let norm = row.dot(&row).sqrt();
    if norm == 0.0 {
        return false;
    }
    row.mapv_inplace(|v| v / norm);
    true
}
