//! Forecast accuracy metrics used to rank candidate models.

use crate::error::{Result, StockcastError};

/// Calculates Mean Absolute Error between actual and predicted values.
///
/// # Formula
/// MAE = (1/n) * Σ|actual_i - forecast_i|
///
/// # Example
/// ```
/// use stockcast_core::metrics::mae;
/// let actual = vec![1.0, 2.0, 3.0];
/// let forecast = vec![1.1, 2.2, 2.8];
/// let error = mae(&actual, &forecast).unwrap();
/// assert!((error - 0.166).abs() < 0.01);
/// ```
pub fn mae(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let sum: f64 = actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (a - f).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

fn validate_inputs(actual: &[f64], forecast: &[f64]) -> Result<()> {
    if actual.len() != forecast.len() {
        return Err(StockcastError::InvalidInput(format!(
            "Actual and forecast arrays must have the same length: {} vs {}",
            actual.len(),
            forecast.len()
        )));
    }
    if actual.is_empty() {
        return Err(StockcastError::InsufficientData { needed: 1, got: 0 });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mae() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let forecast = vec![1.1, 2.2, 2.9, 4.1, 4.8];
        let result = mae(&actual, &forecast).unwrap();
        assert_relative_eq!(result, 0.14, epsilon = 0.01);
    }

    #[test]
    fn test_mae_perfect_forecast() {
        let actual = vec![3.0, 3.0, 3.0];
        assert_eq!(mae(&actual, &actual).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(mae(&[1.0, 2.0], &[1.0]).is_err());
    }

    #[test]
    fn test_empty_inputs() {
        let err = mae(&[], &[]).unwrap_err();
        assert!(err.is_insufficient_data());
    }
}
