//! Feature projection: the numeric part of a listing frame as an `f64` matrix.

use ndarray::{Array2, ArrayView1, Axis};
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{RaterError, Result};
use crate::record::{Column, IDENTIFIER_COLUMNS, NUMERIC_COLUMNS};

const STAGE: &str = "projection";

/// A numeric matrix whose columns are named by [`Column`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub(crate) columns: Vec<Column>,
    pub(crate) values: Array2<f64>,
}

impl FeatureFrame {
    pub fn new(columns: Vec<Column>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(RaterError::schema(
                STAGE,
                format!(
                    "{} column names for a matrix with {} columns",
                    columns.len(),
                    values.ncols()
                ),
            ));
        }
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    pub fn into_parts(self) -> (Vec<Column>, Array2<f64>) {
        (self.columns, self.values)
    }

    /// Position of `column`, resolved by name
    pub fn column_index(&self, column: Column) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| *c == column)
            .ok_or_else(|| RaterError::schema(STAGE, format!("missing column '{column}'")))
    }

    pub fn column(&self, column: Column) -> Result<ArrayView1<'_, f64>> {
        let idx = self.column_index(column)?;
        Ok(self.values.column(idx))
    }

    /// Copy the named columns out, in the order given
    pub fn select_columns(&self, columns: &[Column]) -> Result<Array2<f64>> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(*c))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.values.select(Axis(1), &indices))
    }

    /// Copy the given rows out, keeping the column names
    pub fn select_rows(&self, rows: &[usize]) -> FeatureFrame {
        FeatureFrame {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }
}

/// Keep the numeric listing columns, in fixed order with the stars target
/// first, and discard identifier and free-text fields.
pub fn project_features(df: DataFrame) -> Result<FeatureFrame> {
    for column in NUMERIC_COLUMNS {
        let series = df
            .column(column.header())
            .map_err(|_| RaterError::schema(STAGE, format!("missing column '{column}'")))?;

        if !series.dtype().is_numeric() {
            return Err(RaterError::schema(
                STAGE,
                format!("column '{column}' has non-numeric type {}", series.dtype()),
            ));
        }
    }

    for name in df.get_column_names() {
        if NUMERIC_COLUMNS.iter().any(|c| c.header() == name) {
            continue;
        }
        if IDENTIFIER_COLUMNS.iter().any(|c| c.header() == name) {
            debug!(column = name, "Dropping identifier column");
        } else {
            debug!(column = name, "Dropping unrecognised column");
        }
    }

    let names: Vec<&str> = NUMERIC_COLUMNS.iter().map(|c| c.header()).collect();
    let numeric = df.select(names)?;
    let values = numeric.to_ndarray::<Float64Type>(IndexOrder::C)?;

    for (row, cells) in values.outer_iter().enumerate() {
        if let Some(col) = cells.iter().position(|v| !v.is_finite()) {
            return Err(RaterError::schema(
                STAGE,
                format!(
                    "column '{}' holds a null or non-finite value at row {row}",
                    NUMERIC_COLUMNS[col]
                ),
            ));
        }
    }

    info!(
        rows = values.nrows(),
        columns = values.ncols(),
        "Projected listing features"
    );

    FeatureFrame::new(NUMERIC_COLUMNS.to_vec(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{records_to_frame, sample_record};

    #[test]
    fn keeps_numeric_columns_in_fixed_order() {
        let df = records_to_frame(&[sample_record(4.5)]).unwrap();

        let frame = project_features(df).unwrap();

        assert_eq!(frame.columns(), &NUMERIC_COLUMNS);
        assert_eq!(frame.columns()[0], Column::Stars);
        let row: Vec<f64> = frame.values().row(0).to_vec();
        assert_eq!(
            row,
            vec![4.5, 10.0, 100.0, 10.0, 50.0, 1000.0, 100.0, 250.0, 0.9, 5.0]
        );
    }

    #[test]
    fn column_order_of_input_does_not_matter() {
        let df = df!(
            "Followers" => &[5i64],
            "Stars" => &[4.0],
            "URL" => &["u"],
            "Ratings" => &[10i64],
            "Sold" => &[100i64],
            "PriceMin" => &[10.0],
            "PriceMax" => &[50.0],
            "Stock" => &[1i64],
            "SellerRatings" => &[100i64],
            "Products" => &[2i64],
            "ResponseRate" => &[0.9]
        )
        .unwrap();

        let frame = project_features(df).unwrap();

        assert_eq!(frame.column(Column::Stars).unwrap()[0], 4.0);
        assert_eq!(frame.column(Column::Followers).unwrap()[0], 5.0);
        assert_eq!(frame.values().ncols(), NUMERIC_COLUMNS.len());
    }

    #[test]
    fn missing_column_is_a_schema_mismatch() {
        let df = records_to_frame(&[sample_record(4.5)])
            .unwrap()
            .drop("Sold")
            .unwrap();

        let err = project_features(df).unwrap_err();

        match err {
            RaterError::SchemaMismatch { stage, detail } => {
                assert_eq!(stage, "projection");
                assert!(detail.contains("Sold"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn text_in_numeric_column_is_rejected() {
        let mut df = records_to_frame(&[sample_record(4.5)]).unwrap();
        df.with_column(Series::new("Ratings", &["many"])).unwrap();

        let err = project_features(df).unwrap_err();

        assert!(matches!(err, RaterError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("Ratings"));
    }

    #[test]
    fn selects_columns_by_name() {
        let df = records_to_frame(&[sample_record(3.0)]).unwrap();
        let frame = project_features(df).unwrap();

        let picked = frame
            .select_columns(&[Column::Followers, Column::Stars])
            .unwrap();

        assert_eq!(picked.row(0).to_vec(), vec![5.0, 3.0]);
    }
}
