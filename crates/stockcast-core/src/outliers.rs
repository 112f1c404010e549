//! Low-outlier detection and consumption adjustment.
//!
//! Consumption far below the usual level of a SKU (stockouts, partial
//! deliveries) distorts every downstream statistic. Records below
//! `Q1 - k * IQR` of their SKU group are replaced by the mean of the
//! remaining records. High values are left untouched.

use crate::stats::{mean, quartiles};
use crate::types::{AdjustedConsumptionRecord, ConsumptionRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// IQR fences of one SKU group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlierBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_bound: f64,
    /// Mean of the records at or above `lower_bound`; `None` if there are none
    pub non_outlier_mean: Option<f64>,
    pub n_outliers: usize,
}

impl OutlierBounds {
    pub fn is_outlier(&self, quantity: f64) -> bool {
        quantity < self.lower_bound
    }
}

/// Compute the fences of a group of quantities. `None` for an empty group.
pub fn group_bounds(quantities: &[f64], iqr_multiplier: f64) -> Option<OutlierBounds> {
    let (q1, q3) = quartiles(quantities)?;
    let iqr = q3 - q1;
    let lower_bound = q1 - iqr_multiplier * iqr;

    let kept: Vec<f64> = quantities
        .iter()
        .copied()
        .filter(|&q| q >= lower_bound)
        .collect();

    Some(OutlierBounds {
        q1,
        q3,
        iqr,
        lower_bound,
        non_outlier_mean: mean(&kept),
        n_outliers: quantities.len() - kept.len(),
    })
}

fn group_by_sku(records: &[ConsumptionRecord]) -> BTreeMap<&str, Vec<&ConsumptionRecord>> {
    let mut groups: BTreeMap<&str, Vec<&ConsumptionRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.sku.as_str()).or_default().push(record);
    }
    groups
}

/// Fences of every SKU group, keyed by SKU.
pub fn bounds_by_sku(
    records: &[ConsumptionRecord],
    iqr_multiplier: f64,
) -> BTreeMap<String, OutlierBounds> {
    group_by_sku(records)
        .into_iter()
        .filter_map(|(sku, group)| {
            let quantities: Vec<f64> = group.iter().map(|r| r.quantity).collect();
            group_bounds(&quantities, iqr_multiplier).map(|b| (sku.to_string(), b))
        })
        .collect()
}

/// Flag low outliers per SKU (warehouses pooled) and compute adjusted
/// quantities.
///
/// Output is ordered by SKU, warehouse and period.
pub fn adjust_outliers(
    records: &[ConsumptionRecord],
    iqr_multiplier: f64,
) -> Vec<AdjustedConsumptionRecord> {
    let mut adjusted = Vec::with_capacity(records.len());

    for (sku, group) in group_by_sku(records) {
        let quantities: Vec<f64> = group.iter().map(|r| r.quantity).collect();
        let Some(bounds) = group_bounds(&quantities, iqr_multiplier) else {
            continue;
        };

        if bounds.n_outliers > 0 {
            tracing::debug!(
                sku,
                n_outliers = bounds.n_outliers,
                lower_bound = bounds.lower_bound,
                "adjusted low outliers"
            );
        }
        if bounds.non_outlier_mean.is_none() {
            tracing::warn!(sku, "every record of the group is an outlier");
        }

        for record in group {
            let is_outlier = bounds.is_outlier(record.quantity);
            adjusted.push(AdjustedConsumptionRecord {
                sku: record.sku.clone(),
                warehouse: record.warehouse.clone(),
                period: record.period,
                quantity: record.quantity,
                is_outlier,
                adjusted_quantity: if is_outlier {
                    bounds.non_outlier_mean
                } else {
                    Some(record.quantity)
                },
            });
        }
    }

    adjusted.sort_by(|a, b| {
        (a.sku.as_str(), a.warehouse.as_str(), a.period).cmp(&(
            b.sku.as_str(),
            b.warehouse.as_str(),
            b.period,
        ))
    });
    adjusted
}
