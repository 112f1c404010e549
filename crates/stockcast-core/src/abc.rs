//! Pareto (ABC) classification of SKUs per warehouse.

use crate::types::{AbcClass, AbcClassCount, AbcClassRecord, AdjustedConsumptionRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// Cumulative share (percent) up to which SKUs are class A.
pub const CLASS_A_LIMIT: f64 = 80.0;
/// Cumulative share (percent) up to which SKUs are class B.
pub const CLASS_B_LIMIT: f64 = 95.0;

/// ABC records of every warehouse plus per-warehouse class counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AbcClassification {
    /// Ordered by warehouse, then by descending consumption
    pub records: Vec<AbcClassRecord>,
    pub counts: Vec<AbcClassCount>,
}

impl AbcClassification {
    /// Class of a SKU in a warehouse.
    pub fn class_of(&self, sku: &str, warehouse: &str) -> Option<AbcClass> {
        self.records
            .iter()
            .find(|r| r.sku == sku && r.warehouse == warehouse)
            .map(|r| r.abc_class)
    }
}

fn class_for_cumulative(cumulative_pct: f64) -> AbcClass {
    if cumulative_pct <= CLASS_A_LIMIT {
        AbcClass::A
    } else if cumulative_pct <= CLASS_B_LIMIT {
        AbcClass::B
    } else {
        AbcClass::C
    }
}

/// Rank one warehouse's SKU totals and assign classes.
fn classify_warehouse(warehouse: &str, totals: BTreeMap<&str, f64>) -> Vec<AbcClassRecord> {
    let mut ranked: Vec<(&str, f64)> = totals.into_iter().collect();
    // Stable: equal totals keep SKU order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let grand_total: f64 = ranked.iter().map(|(_, v)| v).sum();
    if grand_total <= 0.0 {
        tracing::warn!(warehouse, "warehouse has no consumption, every SKU is class C");
    }

    let mut cumulative = 0.0;
    ranked
        .into_iter()
        .map(|(sku, total)| {
            let (share_pct, cumulative_share_pct) = if grand_total > 0.0 {
                let share = 100.0 * total / grand_total;
                cumulative += share;
                (share, cumulative)
            } else {
                (0.0, 100.0)
            };
            AbcClassRecord {
                sku: sku.to_string(),
                warehouse: warehouse.to_string(),
                total_consumption: total,
                share_pct,
                cumulative_share_pct,
                abc_class: class_for_cumulative(cumulative_share_pct),
            }
        })
        .collect()
}

/// Classify SKUs by their share of adjusted consumption within each
/// warehouse.
pub fn classify_abc(adjusted: &[AdjustedConsumptionRecord]) -> AbcClassification {
    let mut by_warehouse: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
    for record in adjusted {
        *by_warehouse
            .entry(record.warehouse.as_str())
            .or_default()
            .entry(record.sku.as_str())
            .or_insert(0.0) += record.adjusted_or_zero();
    }

    let mut classification = AbcClassification::default();
    for (warehouse, totals) in by_warehouse {
        let records = classify_warehouse(warehouse, totals);

        let mut count = AbcClassCount::new(warehouse);
        for record in &records {
            *count.counts.entry(record.abc_class).or_insert(0) += 1;
        }
        tracing::debug!(
            warehouse,
            a = count.get(AbcClass::A),
            b = count.get(AbcClass::B),
            c = count.get(AbcClass::C),
            "ABC classes"
        );

        classification.records.extend(records);
        classification.counts.push(count);
    }

    tracing::info!(
        n_records = classification.records.len(),
        n_warehouses = classification.counts.len(),
        "classified ABC"
    );
    classification
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::YearMonth;
    use approx::assert_relative_eq;

    fn adjusted(sku: &str, warehouse: &str, quantity: f64) -> AdjustedConsumptionRecord {
        AdjustedConsumptionRecord {
            sku: sku.into(),
            warehouse: warehouse.into(),
            period: YearMonth::new(2024, 1).unwrap(),
            quantity,
            is_outlier: false,
            adjusted_quantity: Some(quantity),
        }
    }

    #[test]
    fn test_pareto_classes() {
        let input = vec![
            adjusted("S1", "W", 70.0),
            adjusted("S2", "W", 10.0),
            adjusted("S3", "W", 12.0),
            adjusted("S4", "W", 5.0),
            adjusted("S5", "W", 3.0),
        ];
        let result = classify_abc(&input);

        let order: Vec<_> = result.records.iter().map(|r| r.sku.as_str()).collect();
        assert_eq!(order, vec!["S1", "S3", "S2", "S4", "S5"]);

        let classes: Vec<_> = result.records.iter().map(|r| r.abc_class).collect();
        // cumulative: 70, 82, 92, 97, 100
        assert_eq!(
            classes,
            vec![AbcClass::A, AbcClass::B, AbcClass::B, AbcClass::C, AbcClass::C]
        );
        assert_relative_eq!(result.records[1].share_pct, 12.0, epsilon = 1e-9);
        assert_eq!(result.class_of("S4", "W"), Some(AbcClass::C));
    }

    #[test]
    fn test_cumulative_is_monotone_and_ends_at_100() {
        let input: Vec<_> = (1..=20)
            .map(|i| adjusted(&format!("S{:02}", i), "W", (i * i) as f64))
            .collect();
        let result = classify_abc(&input);

        let cumulative: Vec<f64> = result
            .records
            .iter()
            .map(|r| r.cumulative_share_pct)
            .collect();
        assert!(cumulative.windows(2).all(|w| w[0] <= w[1]));
        assert_relative_eq!(*cumulative.last().unwrap(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_counts_partition_each_warehouse() {
        let mut input = vec![
            adjusted("S1", "MACROS", 50.0),
            adjusted("S2", "MACROS", 30.0),
            adjusted("S3", "MACROS", 20.0),
            adjusted("S1", "MICROS", 5.0),
        ];
        input.push(adjusted("S1", "MACROS", 10.0));
        let result = classify_abc(&input);

        assert_eq!(result.counts.len(), 2);
        let macros = &result.counts[0];
        assert_eq!(macros.warehouse, "MACROS");
        assert_eq!(macros.total(), 3);

        let micros = &result.counts[1];
        assert_eq!(micros.total(), 1);
        // All three classes are reported, even when empty
        assert_eq!(micros.counts.len(), 3);
        assert_eq!(micros.get(AbcClass::C), 1);
        assert_eq!(micros.get(AbcClass::A), 0);
    }

    #[test]
    fn test_zero_total_warehouse_is_all_c() {
        let input = vec![adjusted("S1", "W", 0.0), adjusted("S2", "W", 0.0)];
        let result = classify_abc(&input);
        for record in &result.records {
            assert_eq!(record.abc_class, AbcClass::C);
            assert_eq!(record.share_pct, 0.0);
            assert_eq!(record.cumulative_share_pct, 100.0);
        }
        assert_eq!(result.counts[0].get(AbcClass::C), 2);
    }

    #[test]
    fn test_missing_adjusted_value_counts_as_zero() {
        let mut record = adjusted("S2", "W", 4.0);
        record.adjusted_quantity = None;
        let result = classify_abc(&[adjusted("S1", "W", 10.0), record]);
        assert_eq!(result.records[1].sku, "S2");
        assert_eq!(result.records[1].total_consumption, 0.0);
    }
}
