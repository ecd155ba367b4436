//! Single-listing star estimates from a fitted forest.

use ndarray::Array2;
use tracing::debug;

use crate::error::{RaterError, Result};
use crate::forest::FittedForest;
use crate::metrics::round_to;
use crate::normalizer::normalize_matrix;
use crate::record::{Column, FEATURE_COLUMNS};

/// Attributes of a hypothetical listing. There is no stars field: stars is
/// what gets predicted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionQuery {
    pub price_min: f64,
    pub price_max: f64,
    pub sold: f64,
    pub ratings: f64,
    pub seller_ratings: f64,
    /// Fraction in [0, 1]; see [`response_rate_from_percent`]
    pub response_rate: f64,
    pub followers: f64,
}

impl Default for PredictionQuery {
    /// The rating tool's starting values.
    fn default() -> Self {
        Self {
            price_min: 10.0,
            price_max: 50.0,
            sold: 100.0,
            ratings: 100.0,
            seller_ratings: 100.0,
            response_rate: 0.9,
            followers: 5.0,
        }
    }
}

impl PredictionQuery {
    /// Value of a model input column, looked up by name.
    pub fn value(&self, column: Column) -> Option<f64> {
        match column {
            Column::Ratings => Some(self.ratings),
            Column::Sold => Some(self.sold),
            Column::PriceMin => Some(self.price_min),
            Column::PriceMax => Some(self.price_max),
            Column::SellerRatings => Some(self.seller_ratings),
            Column::ResponseRate => Some(self.response_rate),
            Column::Followers => Some(self.followers),
            _ => None,
        }
    }

    /// A 1×n matrix holding `columns` in the order given.
    pub fn feature_row(&self, columns: &[Column]) -> Result<Array2<f64>> {
        let values = columns
            .iter()
            .map(|c| {
                self.value(*c).ok_or_else(|| {
                    RaterError::schema("prediction", format!("query has no '{c}' input"))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        Array2::from_shape_vec((1, values.len()), values)
            .map_err(|e| RaterError::schema("prediction", e.to_string()))
    }

    /// Reject negative, non-finite, or out-of-range inputs.
    pub fn validate(&self) -> Result<()> {
        for column in FEATURE_COLUMNS {
            let value = self.value(column).unwrap_or_default();
            if !value.is_finite() {
                return Err(RaterError::malformed(column.header(), "must be a number"));
            }
            if value < 0.0 {
                return Err(RaterError::malformed(
                    column.header(),
                    format!("must not be negative, got {value}"),
                ));
            }
        }
        if self.response_rate > 1.0 {
            return Err(RaterError::malformed(
                Column::ResponseRate.header(),
                format!("must be a fraction between 0 and 1, got {}", self.response_rate),
            ));
        }
        Ok(())
    }
}

/// Convert the form's percentage response rate into the fraction the model
/// was trained on.
pub fn response_rate_from_percent(percent: f64) -> f64 {
    percent / 100.0
}

/// Parse one text input as a non-negative number.
pub fn parse_query_field(field: &str, text: &str) -> Result<f64> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RaterError::malformed(field, "a value is required"));
    }

    let value: f64 = text
        .parse()
        .map_err(|_| RaterError::malformed(field, format!("'{text}' is not a number")))?;

    if !value.is_finite() {
        return Err(RaterError::malformed(field, format!("'{text}' is not a number")));
    }
    if value < 0.0 {
        return Err(RaterError::malformed(
            field,
            format!("must not be negative, got {value}"),
        ));
    }

    Ok(value)
}

/// Map a normalized model output back onto the five-star scale.
///
/// This is a heuristic, not the inverse of row normalization: the query row's
/// norm is not kept, so a lower normalized output is read as a higher rating.
pub fn stars_from_normalized(output: f64) -> f64 {
    (1.0 - output) * 5.0
}

/// A predicted rating and the raw model output it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarEstimate {
    pub raw_output: f64,
    pub stars: f64,
}

impl StarEstimate {
    /// Stars rounded to two decimals, as displayed
    pub fn rounded(&self) -> f64 {
        round_to(self.stars, 2)
    }
}

/// Normalize the query row on its own, run it through the forest, and turn
/// the output into stars.
pub fn estimate_stars(model: &FittedForest, query: &PredictionQuery) -> Result<StarEstimate> {
    query.validate()?;

    let row = normalize_matrix(query.feature_row(&FEATURE_COLUMNS)?);
    let predicted = model.predict(&row)?;
    let raw_output = predicted[0];
    let stars = stars_from_normalized(raw_output);

    debug!(raw_output, stars, "Estimated listing rating");
    Ok(StarEstimate { raw_output, stars })
}
