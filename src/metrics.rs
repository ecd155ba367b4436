//! Regression accuracy metrics

/// Coefficient of determination (R²)
///
/// `1 - SS_res / SS_tot`, where `SS_tot` is taken around the mean of the
/// actual values. 1.0 is a perfect fit; 0.0 is no better than predicting the
/// mean; negative values are worse than that.
///
/// When the actual values are constant (`SS_tot == 0`) the score is 1.0 for a
/// perfect prediction and 0.0 otherwise.
///
/// Returns NaN when the inputs differ in length or are empty.
///
/// # Example
///
/// ```rust
/// use shop_rater::metrics::r2_score;
///
/// let actual = vec![3.0, -0.5, 2.0, 7.0];
/// let predicted = vec![2.5, 0.0, 2.0, 8.0];
/// let r2 = r2_score(&actual, &predicted);
/// assert!((r2 - 0.9486).abs() < 1e-4);
/// ```
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }

    let mean = actual.iter().sum::<f64>() / actual.len() as f64;

    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }

    1.0 - ss_res / ss_tot
}

/// Mean Squared Error (MSE)
///
/// Returns NaN when the inputs differ in length or are empty.
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }

    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    sum / actual.len() as f64
}

/// Round to a fixed number of decimal places.
///
/// Rounds the exact binary value, with exact ties going to the even digit,
/// so `1.115` (stored just below) becomes `1.11` and `0.125` becomes `0.12`.
pub fn round_to(value: f64, places: u32) -> f64 {
    format!("{:.*}", places as usize, value)
        .parse()
        .unwrap_or(value)
}

/// R² as a percentage rounded to four decimals, the way accuracy is reported.
pub fn accuracy_percent(r2: f64) -> f64 {
    round_to(r2 * 100.0, 4)
}
