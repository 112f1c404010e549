//! End-to-end pipeline: input normalisation and stage orchestration.

use crate::abc::classify_abc;
use crate::classify::classify_all;
use crate::config::PipelineConfig;
use crate::error::{Result, StockcastError};
use crate::forecast::{forecast_all, model_counts};
use crate::outliers::{adjust_outliers, bounds_by_sku};
use crate::policy::{compute_policies, policy_counts, ReferenceData};
use crate::snapshot::Snapshot;
use crate::types::{ConsumptionRecord, YearMonth};
use std::collections::{BTreeMap, BTreeSet};

fn validate_record(index: usize, record: &ConsumptionRecord) -> Result<()> {
    if record.sku.trim().is_empty() {
        return Err(StockcastError::InvalidInput(format!(
            "record {} has an empty SKU",
            index
        )));
    }
    if record.warehouse.trim().is_empty() {
        return Err(StockcastError::InvalidInput(format!(
            "record {} ({}) has an empty warehouse",
            index, record.sku
        )));
    }
    if !record.quantity.is_finite() || record.quantity < 0.0 {
        return Err(StockcastError::InvalidInput(format!(
            "record {} ({} {} {}) has invalid quantity {}",
            index, record.sku, record.warehouse, record.period, record.quantity
        )));
    }
    Ok(())
}

/// Validate raw records and bring them into pipeline shape.
///
/// Quantities of the same SKU, warehouse and month are summed. When the
/// configuration names warehouses, only those are kept; with an
/// `active_year`, only SKUs whose last consumption falls in that year are
/// kept. The result is ordered by SKU, warehouse and period.
pub fn normalize_records(
    records: &[ConsumptionRecord],
    config: &PipelineConfig,
) -> Result<Vec<ConsumptionRecord>> {
    let mut totals: BTreeMap<(&str, &str, YearMonth), f64> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        validate_record(index, record)?;
        *totals
            .entry((record.sku.as_str(), record.warehouse.as_str(), record.period))
            .or_insert(0.0) += record.quantity;
    }
    let n_unique = totals.len();

    let warehouses: BTreeSet<&str> = config.warehouses.iter().map(String::as_str).collect();
    let mut normalized: Vec<ConsumptionRecord> = totals
        .into_iter()
        .filter(|((_, warehouse, _), _)| warehouses.is_empty() || warehouses.contains(warehouse))
        .map(|((sku, warehouse, period), quantity)| {
            ConsumptionRecord::new(sku, warehouse, period, quantity)
        })
        .collect();

    if let Some(year) = config.active_year {
        let mut last_seen: BTreeMap<&str, YearMonth> = BTreeMap::new();
        for record in &normalized {
            let last = last_seen.entry(record.sku.as_str()).or_insert(record.period);
            if record.period > *last {
                *last = record.period;
            }
        }
        let active: BTreeSet<String> = last_seen
            .into_iter()
            .filter(|(_, last)| last.year() == year)
            .map(|(sku, _)| sku.to_string())
            .collect();
        normalized.retain(|r| active.contains(&r.sku));
    }

    let n_dropped = n_unique - normalized.len();
    if n_dropped > 0 {
        tracing::warn!(n_dropped, "records removed by warehouse or activity filter");
    }
    tracing::info!(
        n_input = records.len(),
        n_normalized = normalized.len(),
        "normalized consumption records"
    );
    Ok(normalized)
}

/// Run every stage and assemble an immutable snapshot.
///
/// Only configuration and input validation errors are returned; per-SKU
/// problems are recorded in the snapshot.
pub fn run_pipeline(
    records: &[ConsumptionRecord],
    reference: &ReferenceData,
    config: &PipelineConfig,
) -> Result<Snapshot> {
    config.validate()?;

    let span = tracing::info_span!("pipeline", n_records = records.len());
    let _enter = span.enter();

    let normalized = normalize_records(records, config)?;

    let adjusted = adjust_outliers(&normalized, config.iqr_multiplier);
    let outlier_bounds = bounds_by_sku(&normalized, config.iqr_multiplier);
    let n_outliers = adjusted.iter().filter(|r| r.is_outlier).count();
    tracing::info!(n_records = adjusted.len(), n_outliers, "adjusted outliers");

    let analyses = classify_all(&adjusted, config);
    let forecasts = forecast_all(&normalized, config);
    let abc = classify_abc(&adjusted);
    let policies = compute_policies(&abc, &analyses, &forecasts, reference, config);

    let model_counts = model_counts(forecasts.values().map(|f| &f.selection));
    let policy_counts = policy_counts(&policies);

    Ok(Snapshot {
        generated_at: chrono::Utc::now(),
        adjusted,
        outlier_bounds,
        analyses,
        forecasts,
        abc,
        policies,
        model_counts,
        policy_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    #[test]
    fn test_duplicates_are_summed() {
        let records = vec![
            ConsumptionRecord::new("A", "W", month(2024, 1), 2.0),
            ConsumptionRecord::new("A", "W", month(2024, 1), 3.0),
            ConsumptionRecord::new("A", "W", month(2024, 2), 1.0),
        ];
        let normalized = normalize_records(&records, &PipelineConfig::default()).unwrap();
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].quantity, 5.0);
    }

    #[test]
    fn test_invalid_records_are_rejected() {
        let config = PipelineConfig::default();
        for bad in [
            ConsumptionRecord::new("", "W", month(2024, 1), 1.0),
            ConsumptionRecord::new("A", " ", month(2024, 1), 1.0),
            ConsumptionRecord::new("A", "W", month(2024, 1), -1.0),
            ConsumptionRecord::new("A", "W", month(2024, 1), f64::NAN),
        ] {
            let err = normalize_records(&[bad], &config).unwrap_err();
            assert!(matches!(err, StockcastError::InvalidInput(_)));
        }
    }

    #[test]
    fn test_warehouse_filter() {
        let records = vec![
            ConsumptionRecord::new("A", "MACROS", month(2024, 1), 1.0),
            ConsumptionRecord::new("A", "OTHER", month(2024, 1), 1.0),
        ];
        let config = PipelineConfig {
            warehouses: vec!["MACROS".into()],
            ..PipelineConfig::default()
        };
        let normalized = normalize_records(&records, &config).unwrap();
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].warehouse, "MACROS");
    }

    #[test]
    fn test_active_year_filter() {
        let records = vec![
            ConsumptionRecord::new("OLD", "W", month(2022, 5), 1.0),
            ConsumptionRecord::new("NEW", "W", month(2022, 5), 1.0),
            ConsumptionRecord::new("NEW", "W", month(2024, 3), 1.0),
        ];
        let config = PipelineConfig {
            active_year: Some(2024),
            ..PipelineConfig::default()
        };
        let normalized = normalize_records(&records, &config).unwrap();
        assert!(normalized.iter().all(|r| r.sku == "NEW"));
        assert_eq!(normalized.len(), 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            recent_window: 0,
            ..PipelineConfig::default()
        };
        let err = run_pipeline(&[], &ReferenceData::default(), &config).unwrap_err();
        assert!(matches!(err, StockcastError::InvalidParameter { .. }));
    }

    #[test]
    fn test_empty_input_gives_empty_snapshot() {
        let snapshot =
            run_pipeline(&[], &ReferenceData::default(), &PipelineConfig::default()).unwrap();
        assert!(snapshot.policies.is_empty());
        assert!(snapshot.abc.records.is_empty());
        assert!(snapshot.model_counts.is_empty());
    }
}
