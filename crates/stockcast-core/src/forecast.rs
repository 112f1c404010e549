//! Multi-model demand forecasting with hold-out selection.
//!
//! Four candidates are fitted on all but the last `holdout` months of a SKU's
//! consumption and scored by MAE on the held-out months. The best candidate
//! is refitted on the full history to forecast the next `horizon` months.

use crate::config::PipelineConfig;
use crate::error::{Result, StockcastError};
use crate::metrics::mae;
use crate::stats::{describe, DemandStats};
use crate::types::{
    ConsumptionRecord, ForecastPoint, ModelEvaluation, ModelKind, ModelSelection, MonthlySeries,
    YearMonth,
};
use anofox_forecast::core::{TimeSeries, TimeSeriesBuilder};
use anofox_forecast::models::arima::{ARIMA, SARIMA};
use anofox_forecast::models::exponential::{ETSSpec, ETS as ETSModel};
use anofox_forecast::prelude::Forecaster;
use anofox_regression::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Selected model and history-plus-forecast series of one SKU.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkuForecast {
    pub selection: ModelSelection,
    pub points: Vec<ForecastPoint>,
}

impl SkuForecast {
    /// Forecast values after the last historical month.
    pub fn future(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter().filter(|p| p.is_forecast)
    }
}

/// Number of SKUs of a warehouse whose forecast uses `model`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelCount {
    pub warehouse: String,
    pub model: String,
    pub count: usize,
}

/// Shortest training window each candidate accepts.
fn minimum_training_len(kind: ModelKind, seasonal_period: usize) -> usize {
    match kind {
        ModelKind::SeasonalArima => 2 * seasonal_period + 2,
        ModelKind::ExponentialSmoothing => 2 * seasonal_period,
        ModelKind::Arima => 5,
        ModelKind::LinearRegression => 2,
    }
}

fn model_fit_error(kind: ModelKind, reason: impl Display) -> StockcastError {
    StockcastError::ModelFit {
        model: kind.name().to_string(),
        reason: reason.to_string(),
    }
}

fn build_time_series(periods: &[YearMonth], values: &[f64]) -> Result<TimeSeries> {
    let timestamps = periods
        .iter()
        .map(YearMonth::to_utc)
        .collect::<Result<Vec<_>>>()?;

    TimeSeriesBuilder::new()
        .timestamps(timestamps)
        .values(values.to_vec())
        .build()
        .map_err(|e| StockcastError::ComputationError(format!("Failed to build TimeSeries: {}", e)))
}

fn predict_with<F: Forecaster>(
    kind: ModelKind,
    mut forecaster: F,
    series: &TimeSeries,
    horizon: usize,
) -> Result<Vec<f64>> {
    forecaster
        .fit(series)
        .map_err(|e| model_fit_error(kind, e))?;
    let forecast = forecaster
        .predict(horizon)
        .map_err(|e| model_fit_error(kind, e))?;
    Ok(forecast.point().first().cloned().unwrap_or_default())
}

/// OLS of the values on their month index, extrapolated `horizon` steps.
fn linear_trend_forecast(values: &[f64], horizon: usize) -> Result<Vec<f64>> {
    let n = values.len();
    let x = faer::Mat::from_fn(n, 1, |i, _| i as f64);
    let y = faer::Col::from_fn(n, |i| values[i]);

    let fitted = OlsRegressor::builder()
        .with_intercept(true)
        .build()
        .fit(&x, &y)
        .map_err(|e| model_fit_error(ModelKind::LinearRegression, e))?;

    let future_x = faer::Mat::from_fn(horizon, 1, |i, _| (n + i) as f64);
    let predictions = fitted.predict(&future_x);
    Ok((0..horizon).map(|i| predictions[i]).collect())
}

/// Fit one candidate on `values` and forecast `horizon` steps ahead.
///
/// Fails when the window is shorter than the candidate's minimum, when the
/// model library reports an error, or when a prediction is not finite.
pub fn fit_candidate(
    kind: ModelKind,
    periods: &[YearMonth],
    values: &[f64],
    horizon: usize,
    seasonal_period: usize,
) -> Result<Vec<f64>> {
    if periods.len() != values.len() {
        return Err(StockcastError::InvalidInput(format!(
            "periods and values must have the same length: {} vs {}",
            periods.len(),
            values.len()
        )));
    }
    let needed = minimum_training_len(kind, seasonal_period);
    if values.len() < needed {
        return Err(StockcastError::InsufficientData {
            needed,
            got: values.len(),
        });
    }

    let predictions = match kind {
        ModelKind::LinearRegression => linear_trend_forecast(values, horizon)?,
        ModelKind::SeasonalArima => {
            let series = build_time_series(periods, values)?;
            let model = SARIMA::new(1, 1, 1, 1, 1, 1, seasonal_period);
            predict_with(kind, model, &series, horizon)?
        }
        ModelKind::ExponentialSmoothing => {
            let series = build_time_series(periods, values)?;
            // Additive error and seasonality, no trend
            let spec = ETSSpec::from_notation("ANA").map_err(|e| model_fit_error(kind, e))?;
            predict_with(kind, ETSModel::new(spec, seasonal_period), &series, horizon)?
        }
        ModelKind::Arima => {
            let series = build_time_series(periods, values)?;
            predict_with(kind, ARIMA::new(1, 1, 1), &series, horizon)?
        }
    };

    if predictions.len() != horizon {
        return Err(model_fit_error(
            kind,
            format!("expected {} predictions, got {}", horizon, predictions.len()),
        ));
    }
    if predictions.iter().any(|p| !p.is_finite()) {
        return Err(model_fit_error(kind, "non-finite prediction"));
    }
    Ok(predictions)
}

/// Order evaluations by MAE, ties broken by model precedence.
pub fn rank_evaluations(evaluations: &[ModelEvaluation]) -> Vec<ModelEvaluation> {
    let mut ranked = evaluations.to_vec();
    ranked.sort_by(|a, b| {
        a.mean_absolute_error
            .total_cmp(&b.mean_absolute_error)
            .then(a.model.cmp(&b.model))
    });
    ranked
}

/// Candidate with the strictly lowest MAE, or the first in precedence order
/// among equal scores.
pub fn select_best(evaluations: &[ModelEvaluation]) -> Option<ModelEvaluation> {
    rank_evaluations(evaluations).into_iter().next()
}

/// Score every candidate on the trailing hold-out window.
fn evaluate_candidates(
    sku: &str,
    series: &MonthlySeries,
    config: &PipelineConfig,
) -> Vec<ModelEvaluation> {
    let holdout = config.forecast.holdout;
    if series.len() <= holdout {
        tracing::debug!(
            sku,
            n = series.len(),
            holdout,
            "series too short to evaluate candidates"
        );
        return Vec::new();
    }

    let split = series.len() - holdout;
    let (train_periods, _) = series.periods.split_at(split);
    let (train, test) = series.values.split_at(split);

    ModelKind::ALL
        .iter()
        .filter_map(|&kind| {
            let scored = fit_candidate(kind, train_periods, train, holdout, config.seasonal_period)
                .and_then(|predicted| mae(test, &predicted));
            match scored {
                Ok(error) => Some(ModelEvaluation {
                    model: kind,
                    mean_absolute_error: error,
                }),
                Err(e) => {
                    tracing::debug!(sku, model = kind.name(), error = %e, "candidate excluded");
                    None
                }
            }
        })
        .collect()
}

/// Months following `last`, one per forecast step.
pub fn future_periods(last: YearMonth, horizon: usize) -> Vec<YearMonth> {
    (1..=horizon as u32).map(|i| last.add_months(i)).collect()
}

/// Build the history-plus-forecast series.
///
/// The last historical point also carries its value as a forecast so both
/// chart series join.
pub fn forecast_points(
    sku: &str,
    warehouse: &str,
    history: &MonthlySeries,
    forecast: &[Option<f64>],
) -> Vec<ForecastPoint> {
    let mut points = Vec::with_capacity(history.len() + forecast.len());
    let last_index = history.len().checked_sub(1);

    for (i, (&period, &value)) in history.periods.iter().zip(&history.values).enumerate() {
        points.push(ForecastPoint {
            sku: sku.to_string(),
            warehouse: warehouse.to_string(),
            period,
            actual_quantity: Some(value),
            forecast_quantity: (Some(i) == last_index).then_some(value),
            is_forecast: false,
        });
    }

    if let Some(last) = history.last_period() {
        for (period, &value) in future_periods(last, forecast.len()).into_iter().zip(forecast) {
            points.push(ForecastPoint {
                sku: sku.to_string(),
                warehouse: warehouse.to_string(),
                period,
                actual_quantity: None,
                forecast_quantity: value,
                is_forecast: true,
            });
        }
    }
    points
}

/// Select a model for one SKU and forecast its next months.
///
/// Never fails: when no candidate fits, the model is `None` and every
/// future value is missing.
pub fn select_and_forecast(
    sku: &str,
    warehouse: &str,
    series: &MonthlySeries,
    config: &PipelineConfig,
) -> SkuForecast {
    let horizon = config.forecast.horizon;
    let evaluations = evaluate_candidates(sku, series, config);

    let mut chosen = None;
    for (rank, candidate) in rank_evaluations(&evaluations).into_iter().enumerate() {
        match fit_candidate(
            candidate.model,
            &series.periods,
            &series.values,
            horizon,
            config.seasonal_period,
        ) {
            Ok(predictions) => {
                if rank > 0 {
                    tracing::warn!(
                        sku,
                        model = candidate.model.name(),
                        rank,
                        "using fallback model after refit failure"
                    );
                }
                chosen = Some((candidate, predictions));
                break;
            }
            Err(e) => {
                tracing::warn!(
                    sku,
                    model = candidate.model.name(),
                    error = %e,
                    "refit on full history failed"
                );
            }
        }
    }

    let (selection, forecast) = match chosen {
        Some((best, predictions)) => {
            tracing::debug!(
                sku,
                model = best.model.name(),
                mae = best.mean_absolute_error,
                "selected forecast model"
            );
            let forecast = predictions.into_iter().map(|p| Some(p.max(0.0))).collect();
            (
                ModelSelection {
                    sku: sku.to_string(),
                    warehouse: warehouse.to_string(),
                    model: Some(best.model),
                    mean_absolute_error: Some(best.mean_absolute_error),
                    evaluations,
                },
                forecast,
            )
        }
        None => {
            tracing::debug!(sku, "no forecast model could be fitted");
            (
                ModelSelection {
                    sku: sku.to_string(),
                    warehouse: warehouse.to_string(),
                    model: None,
                    mean_absolute_error: None,
                    evaluations,
                },
                vec![None; horizon],
            )
        }
    };

    SkuForecast {
        points: forecast_points(sku, warehouse, series, &forecast),
        selection,
    }
}

/// Warehouse of each SKU's earliest record.
fn home_warehouses(records: &[ConsumptionRecord]) -> BTreeMap<&str, &str> {
    let mut earliest: BTreeMap<&str, (YearMonth, &str)> = BTreeMap::new();
    for record in records {
        earliest
            .entry(record.sku.as_str())
            .and_modify(|(period, warehouse)| {
                if record.period < *period {
                    *period = record.period;
                    *warehouse = record.warehouse.as_str();
                }
            })
            .or_insert((record.period, record.warehouse.as_str()));
    }
    earliest
        .into_iter()
        .map(|(sku, (_, warehouse))| (sku, warehouse))
        .collect()
}

/// Forecast every SKU from raw consumption summed across warehouses.
pub fn forecast_all(
    records: &[ConsumptionRecord],
    config: &PipelineConfig,
) -> BTreeMap<String, SkuForecast> {
    let warehouses = home_warehouses(records);
    let series = MonthlySeries::collect_by_sku(
        records
            .iter()
            .map(|r| (r.sku.as_str(), r.period, r.quantity)),
    );

    let run = |(sku, s): (String, MonthlySeries)| {
        let warehouse = warehouses.get(sku.as_str()).copied().unwrap_or_default();
        let forecast = select_and_forecast(&sku, warehouse, &s, config);
        (sku, forecast)
    };

    #[cfg(feature = "parallel")]
    let forecasts: BTreeMap<String, SkuForecast> = series.into_par_iter().map(run).collect();

    #[cfg(not(feature = "parallel"))]
    let forecasts: BTreeMap<String, SkuForecast> = series.into_iter().map(run).collect();

    let n_without_model = forecasts
        .values()
        .filter(|f| f.selection.model.is_none())
        .count();
    tracing::info!(n_skus = forecasts.len(), n_without_model, "forecast SKU demand");
    forecasts
}

/// Count selected models per warehouse, `"none"` included.
pub fn model_counts<'a>(
    selections: impl IntoIterator<Item = &'a ModelSelection>,
) -> Vec<ModelCount> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for selection in selections {
        *counts
            .entry((selection.warehouse.as_str(), selection.model_name()))
            .or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|((warehouse, model), count)| ModelCount {
            warehouse: warehouse.to_string(),
            model: model.to_string(),
            count,
        })
        .collect()
}

/// Mean and sample deviation of the last `window` points of the
/// history-plus-forecast series. Missing forecasts are skipped.
pub fn recent_demand(points: &[ForecastPoint], window: usize) -> DemandStats {
    let start = points.len().saturating_sub(window);
    let values: Vec<f64> = points[start..].iter().filter_map(|p| p.quantity()).collect();
    describe(&values)
}
