//! Classical additive seasonal decomposition.
//!
//! `value = trend + seasonal + residual`, with the trend estimated by a
//! centered moving average over one full period. Trend and residual are
//! undefined for the first and last half period.

use crate::error::{Result, StockcastError};
use serde::Serialize;

/// Components of an additive decomposition, one entry per input point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    pub period: usize,
    /// Centered moving average; `None` near both ends of the series
    pub trend: Vec<Option<f64>>,
    /// Periodic seasonal component
    pub seasonal: Vec<f64>,
    /// `value - trend - seasonal`; `None` wherever the trend is undefined
    pub residual: Vec<Option<f64>>,
    /// Seasonal index per position in the cycle, summing to zero
    pub seasonal_indices: Vec<f64>,
}

impl Decomposition {
    /// Residuals where they are defined.
    pub fn defined_residuals(&self) -> Vec<f64> {
        self.residual.iter().flatten().copied().collect()
    }
}

/// Centered moving average of width `period`.
///
/// Even periods use the 2×period filter: half weight on both end points.
fn centered_moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let half = period / 2;
    let mut trend = vec![None; n];
    if n < 2 * half + 1 {
        return trend;
    }

    for (i, slot) in trend.iter_mut().enumerate().take(n - half).skip(half) {
        let window = &values[i - half..=i + half];
        let sum = if period % 2 == 0 {
            let inner: f64 = window[1..window.len() - 1].iter().sum();
            inner + 0.5 * (window[0] + window[window.len() - 1])
        } else {
            window.iter().sum()
        };
        *slot = Some(sum / period as f64);
    }
    trend
}

/// Decompose `values` additively with seasonal `period`.
///
/// Requires at least two full cycles.
pub fn decompose_additive(values: &[f64], period: usize) -> Result<Decomposition> {
    if period < 2 {
        return Err(StockcastError::invalid_parameter(
            "period",
            period,
            "must be at least 2",
        ));
    }
    let n = values.len();
    if n < 2 * period {
        return Err(StockcastError::InsufficientData {
            needed: 2 * period,
            got: n,
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(StockcastError::InvalidInput(
            "decomposition input contains non-finite values".to_string(),
        ));
    }

    let trend = centered_moving_average(values, period);

    // Average detrended value per cycle position
    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, (&v, t)) in values.iter().zip(&trend).enumerate() {
        if let Some(t) = t {
            sums[i % period] += v - t;
            counts[i % period] += 1;
        }
    }
    let mut seasonal_indices: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();
    let center = seasonal_indices.iter().sum::<f64>() / period as f64;
    for index in &mut seasonal_indices {
        *index -= center;
    }

    let seasonal: Vec<f64> = (0..n).map(|i| seasonal_indices[i % period]).collect();
    let residual = values
        .iter()
        .zip(&trend)
        .zip(&seasonal)
        .map(|((&v, t), &s)| t.map(|t| v - t - s))
        .collect();

    Ok(Decomposition {
        period,
        trend,
        seasonal,
        residual,
        seasonal_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn sinusoid(n: usize, period: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 10.0 + 3.0 * (2.0 * PI * i as f64 / period as f64).sin())
            .collect()
    }

    #[test]
    fn test_pure_seasonal_series() {
        let values = sinusoid(36, 12);
        let d = decompose_additive(&values, 12).unwrap();

        assert_eq!(d.trend.len(), 36);
        assert!(d.trend[..6].iter().all(Option::is_none));
        assert!(d.trend[30..].iter().all(Option::is_none));
        for t in d.trend.iter().flatten() {
            assert_relative_eq!(*t, 10.0, epsilon = 1e-9);
        }
        for (i, s) in d.seasonal.iter().enumerate() {
            assert_relative_eq!(*s, values[i] - 10.0, epsilon = 1e-9);
        }
        for r in d.defined_residuals() {
            assert_relative_eq!(r, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_seasonal_indices_sum_to_zero() {
        let values: Vec<f64> = sinusoid(48, 12)
            .iter()
            .enumerate()
            .map(|(i, v)| v + 0.4 * i as f64)
            .collect();
        let d = decompose_additive(&values, 12).unwrap();
        assert_relative_eq!(d.seasonal_indices.iter().sum::<f64>(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_linear_series_has_no_seasonality() {
        let values: Vec<f64> = (0..30).map(|i| 2.0 * i as f64 + 1.0).collect();
        let d = decompose_additive(&values, 12).unwrap();
        for (i, t) in d.trend.iter().enumerate() {
            if let Some(t) = t {
                assert_relative_eq!(*t, values[i], epsilon = 1e-9);
            }
        }
        for s in &d.seasonal {
            assert_relative_eq!(*s, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_odd_period() {
        let values: Vec<f64> = (0..14).map(|i| [1.0, 5.0, 3.0][i % 3] + i as f64).collect();
        let d = decompose_additive(&values, 3).unwrap();
        assert!(d.trend[0].is_none());
        assert!(d.trend[13].is_none());
        assert_relative_eq!(d.trend[1].unwrap(), (values[0] + values[1] + values[2]) / 3.0);
        assert_eq!(d.defined_residuals().len(), 12);
    }

    #[test]
    fn test_insufficient_data() {
        let err = decompose_additive(&[1.0; 23], 12).unwrap_err();
        assert!(err.is_insufficient_data());
        assert!(decompose_additive(&[1.0; 10], 1).is_err());
    }
}
