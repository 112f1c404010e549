//! Descriptive statistics over consumption series.

use crate::error::{Result, StockcastError};
use statrs::statistics::Statistics;

/// Summary of a demand window, as used by the policy calculator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DemandStats {
    /// Number of observations summarised
    pub count: usize,
    /// Arithmetic mean (0 for an empty window)
    pub mean: f64,
    /// Sample standard deviation (0 for fewer than two observations)
    pub std_dev: f64,
}

/// Mean and sample standard deviation of a window.
pub fn describe(values: &[f64]) -> DemandStats {
    if values.is_empty() {
        return DemandStats::default();
    }
    DemandStats {
        count: values.len(),
        mean: values.iter().mean(),
        std_dev: sample_std(values),
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().mean())
    }
}

/// Population variance (ddof = 0), 0 for an empty slice.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().population_variance()
}

/// Population standard deviation (ddof = 0), 0 for an empty slice.
pub fn population_std(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Sample standard deviation (ddof = 1), 0 for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sd = values.iter().std_dev();
    if sd.is_finite() {
        sd
    } else {
        0.0
    }
}

/// Coefficient of variation (population std / mean); 0 when the mean is 0.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    match mean(values) {
        Some(m) if m != 0.0 => population_std(values) / m,
        _ => 0.0,
    }
}

/// First and third quartiles using linear interpolation between order
/// statistics.
pub fn quartiles(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some((percentile(&sorted, 0.25), percentile(&sorted, 0.75)))
}

/// Compute percentile using linear interpolation.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let n = sorted.len() as f64;
    let idx = p * (n - 1.0);
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Least-squares line through `(i, values[i])` for a 0-based index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    /// Value of the fitted line at index `x`.
    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit ordinary least squares of `values` against their index.
pub fn linear_fit(values: &[f64]) -> Result<LinearFit> {
    let n = values.len();
    if n < 2 {
        return Err(StockcastError::InsufficientData { needed: 2, got: n });
    }

    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean: f64 = values.iter().sum::<f64>() / n_f;

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        ss_xy += dx * (y - y_mean);
        ss_xx += dx * dx;
    }

    let slope = ss_xy / ss_xx;
    if !slope.is_finite() {
        return Err(StockcastError::ComputationError(
            "non-finite regression slope".to_string(),
        ));
    }

    Ok(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_describe_window() {
        let stats = describe(&[8.0, 10.0, 12.0]);
        assert_eq!(stats.count, 3);
        assert_relative_eq!(stats.mean, 10.0);
        assert_relative_eq!(stats.std_dev, 2.0);
    }

    #[test]
    fn test_describe_degenerate_windows() {
        assert_eq!(describe(&[]), DemandStats::default());
        let single = describe(&[5.0]);
        assert_relative_eq!(single.mean, 5.0);
        assert_eq!(single.std_dev, 0.0);
    }

    #[test]
    fn test_population_std() {
        // Population std of [2, 4, 4, 4, 5, 5, 7, 9] is exactly 2
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(population_std(&values), 2.0, epsilon = 1e-12);
        assert_eq!(population_std(&[]), 0.0);
    }

    #[test]
    fn test_coefficient_of_variation() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(coefficient_of_variation(&values), 0.4, epsilon = 1e-12);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), 0.0);
        assert_eq!(coefficient_of_variation(&[]), 0.0);
    }

    #[test]
    fn test_quartiles_linear_interpolation() {
        let (q1, q3) = quartiles(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_relative_eq!(q1, 1.75);
        assert_relative_eq!(q3, 3.25);
        assert!(quartiles(&[]).is_none());

        let (q1, q3) = quartiles(&[7.0]).unwrap();
        assert_eq!((q1, q3), (7.0, 7.0));
    }

    #[test]
    fn test_linear_fit() {
        let fit = linear_fit(&[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert_relative_eq!(fit.slope, 2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.at(4.0), 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_fit_insufficient_data() {
        let err = linear_fit(&[1.0]).unwrap_err();
        assert!(err.is_insufficient_data());
    }
}
