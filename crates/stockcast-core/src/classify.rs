//! Variability, trend and seasonality classification of SKU demand.

use crate::config::PipelineConfig;
use crate::decomposition::{decompose_additive, Decomposition};
use crate::stats::{coefficient_of_variation, linear_fit, population_variance};
use crate::types::{
    AdjustedConsumptionRecord, ClassificationSummary, MonthlySeries, Seasonality, Trend,
    Variability, YearMonth,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Slopes within this distance of zero are read as flat.
const FLAT_SLOPE_TOLERANCE: f64 = 1e-12;

/// Everything computed for one SKU during classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkuAnalysis {
    pub summary: ClassificationSummary,
    /// Adjusted monthly totals the labels were computed from
    pub series: MonthlySeries,
    /// Trailing moving average of `series`, for reporting
    pub moving_average: Vec<Option<f64>>,
    /// `None` when the series is shorter than two seasonal cycles
    pub decomposition: Option<Decomposition>,
}

/// Trailing moving average; the first `window - 1` points are undefined.
pub fn moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            (i + 1 >= window).then(|| {
                values[i + 1 - window..=i].iter().sum::<f64>() / window as f64
            })
        })
        .collect()
}

fn classify_trend(values: &[f64]) -> Trend {
    match linear_fit(values) {
        Ok(fit) if fit.slope > FLAT_SLOPE_TOLERANCE => Trend::Ascending,
        Ok(fit) if fit.slope < -FLAT_SLOPE_TOLERANCE => Trend::Descending,
        Ok(_) => Trend::Flat,
        Err(_) => Trend::InsufficientData,
    }
}

/// Calendar months whose average seasonal value exceeds the mean of the
/// monthly averages.
fn high_season_months(periods: &[YearMonth], seasonal: &[f64]) -> BTreeSet<u32> {
    let mut by_month: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for (period, &s) in periods.iter().zip(seasonal) {
        let entry = by_month.entry(period.month()).or_insert((0.0, 0));
        entry.0 += s;
        entry.1 += 1;
    }
    if by_month.is_empty() {
        return BTreeSet::new();
    }

    let averages: Vec<(u32, f64)> = by_month
        .into_iter()
        .map(|(month, (sum, count))| (month, sum / count as f64))
        .collect();
    let overall = averages.iter().map(|(_, avg)| avg).sum::<f64>() / averages.len() as f64;

    averages
        .into_iter()
        .filter(|&(_, avg)| avg > overall)
        .map(|(month, _)| month)
        .collect()
}

/// Classify one SKU from its monthly series.
pub fn classify_sku(sku: &str, series: MonthlySeries, config: &PipelineConfig) -> SkuAnalysis {
    let values = &series.values;

    let cv = coefficient_of_variation(values);
    let variability = if cv > config.variability_threshold {
        Variability::Variable
    } else {
        Variability::NotVariable
    };

    let trend = classify_trend(values);

    let decomposition = decompose_additive(values, config.seasonal_period).ok();
    let (seasonality, seasonal_months) = match &decomposition {
        None => (Seasonality::InsufficientData, BTreeSet::new()),
        Some(d) => {
            let seasonal_var = population_variance(&d.seasonal);
            let residual_var = population_variance(&d.defined_residuals());
            if seasonal_var > residual_var {
                (
                    Seasonality::Seasonal,
                    high_season_months(&series.periods, &d.seasonal),
                )
            } else {
                (Seasonality::NotSeasonal, BTreeSet::new())
            }
        }
    };

    SkuAnalysis {
        summary: ClassificationSummary {
            sku: sku.to_string(),
            coefficient_of_variation: cv,
            variability,
            trend,
            seasonality,
            seasonal_months,
        },
        moving_average: moving_average(values, config.moving_average_window),
        series,
        decomposition,
    }
}

/// Classify every SKU of the adjusted consumption, keyed by SKU.
///
/// Quantities are summed across warehouses per period; a missing adjusted
/// value counts as zero.
pub fn classify_all(
    adjusted: &[AdjustedConsumptionRecord],
    config: &PipelineConfig,
) -> BTreeMap<String, SkuAnalysis> {
    let series = MonthlySeries::collect_by_sku(
        adjusted
            .iter()
            .map(|r| (r.sku.as_str(), r.period, r.adjusted_or_zero())),
    );

    #[cfg(feature = "parallel")]
    let analyses: BTreeMap<String, SkuAnalysis> = series
        .into_par_iter()
        .map(|(sku, s)| {
            let analysis = classify_sku(&sku, s, config);
            (sku, analysis)
        })
        .collect();

    #[cfg(not(feature = "parallel"))]
    let analyses: BTreeMap<String, SkuAnalysis> = series
        .into_iter()
        .map(|(sku, s)| {
            let analysis = classify_sku(&sku, s, config);
            (sku, analysis)
        })
        .collect();

    tracing::info!(n_skus = analyses.len(), "classified SKU demand");
    analyses
}
