//! Safety stock, replenishment policy and order recommendations.
//!
//! SKUs with steady demand follow an EOQ / reorder-point policy; variable
//! SKUs follow a periodic-review order-up-to policy. Demand statistics are
//! monthly, lead times and review periods are in days.

use crate::abc::AbcClassification;
use crate::classify::SkuAnalysis;
use crate::config::{PipelineConfig, PolicyParameters};
use crate::forecast::{recent_demand, SkuForecast};
use crate::stats::DemandStats;
use crate::types::{AbcClass, PolicyKind, PolicyRecord, Variability};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Average unit cost per SKU.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitCostTable {
    costs: BTreeMap<String, f64>,
}

impl UnitCostTable {
    /// Average every cost observation of a SKU.
    pub fn from_observations<S, I>(observations: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, f64)>,
    {
        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for (sku, cost) in observations {
            let entry = sums.entry(sku.into()).or_insert((0.0, 0));
            entry.0 += cost;
            entry.1 += 1;
        }
        Self {
            costs: sums
                .into_iter()
                .map(|(sku, (sum, n))| (sku, sum / n as f64))
                .collect(),
        }
    }

    pub fn get(&self, sku: &str) -> Option<f64> {
        self.costs.get(sku).copied()
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }
}

/// Replenishment lead time per SKU, in days.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadTimeTable {
    days: BTreeMap<String, f64>,
}

impl LeadTimeTable {
    /// Later entries for the same SKU replace earlier ones.
    pub fn from_entries<S, I>(entries: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, f64)>,
    {
        Self {
            days: entries.into_iter().map(|(s, d)| (s.into(), d)).collect(),
        }
    }

    pub fn get(&self, sku: &str) -> Option<f64> {
        self.days.get(sku).copied()
    }
}

/// Stock position of a SKU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryPosition {
    pub on_hand: f64,
    pub open_orders: f64,
    pub last_week_consumption: f64,
    pub last_month_consumption: f64,
}

impl InventoryPosition {
    /// Stock on hand plus stock on order.
    pub fn total(&self) -> f64 {
        self.on_hand + self.open_orders
    }
}

/// Inventory position per SKU.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryTable {
    positions: BTreeMap<String, InventoryPosition>,
}

impl InventoryTable {
    /// Sum rows of the same SKU (one row per location, say).
    pub fn from_rows<S, I>(rows: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, InventoryPosition)>,
    {
        let mut positions: BTreeMap<String, InventoryPosition> = BTreeMap::new();
        for (sku, row) in rows {
            let p = positions.entry(sku.into()).or_default();
            p.on_hand += row.on_hand;
            p.open_orders += row.open_orders;
            p.last_week_consumption += row.last_week_consumption;
            p.last_month_consumption += row.last_month_consumption;
        }
        Self { positions }
    }

    /// Position of a SKU; all zeros when unknown.
    pub fn get(&self, sku: &str) -> InventoryPosition {
        self.positions.get(sku).copied().unwrap_or_default()
    }
}

/// Externally supplied cost, lead-time and stock data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub unit_costs: UnitCostTable,
    pub lead_times: LeadTimeTable,
    pub inventory: InventoryTable,
}

/// Demand and classification of one SKU in one warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyInput<'a> {
    pub sku: &'a str,
    pub warehouse: &'a str,
    pub abc_class: AbcClass,
    pub variability: Variability,
    pub demand: DemandStats,
}

/// `sqrt(2·D·K/h)`; zero when the holding cost or the demand is not
/// positive.
pub fn economic_order_quantity(
    annual_demand: f64,
    ordering_cost: f64,
    holding_cost: f64,
) -> f64 {
    if holding_cost <= 0.0 || annual_demand <= 0.0 {
        return 0.0;
    }
    (2.0 * annual_demand * ordering_cost / holding_cost).sqrt()
}

/// A reference value that is missing, negative or not finite falls back to
/// the default.
fn usable_or_default(sku: &str, field: &'static str, value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        Some(v) => {
            tracing::warn!(
                sku,
                field,
                value = v,
                default,
                "unusable reference value, using default"
            );
            default
        }
        None => default,
    }
}

/// Non-finite stock figures count as zero.
fn finite_position(sku: &str, position: InventoryPosition) -> InventoryPosition {
    let clean = |field: &'static str, v: f64| {
        if v.is_finite() {
            v
        } else {
            tracing::warn!(sku, field, value = v, "non-finite inventory figure, using 0");
            0.0
        }
    };
    InventoryPosition {
        on_hand: clean("on_hand", position.on_hand),
        open_orders: clean("open_orders", position.open_orders),
        last_week_consumption: clean("last_week_consumption", position.last_week_consumption),
        last_month_consumption: clean("last_month_consumption", position.last_month_consumption),
    }
}

struct ReplenishmentPlan {
    policy: PolicyKind,
    safety_stock: f64,
    review_period_days: Option<f64>,
    target_level: Option<f64>,
    reorder_point: Option<f64>,
    order_quantity: Option<f64>,
    recommended: f64,
}

/// Compute the policy and order recommendation of one SKU-warehouse.
pub fn compute_policy(
    input: &PolicyInput<'_>,
    reference: &ReferenceData,
    params: &PolicyParameters,
) -> PolicyRecord {
    let unit_cost = usable_or_default(
        input.sku,
        "unit_cost",
        reference.unit_costs.get(input.sku),
        params.default_unit_cost,
    );
    let lead_time_days = usable_or_default(
        input.sku,
        "lead_time_days",
        reference.lead_times.get(input.sku),
        params.default_lead_time_days,
    );
    let position = finite_position(input.sku, reference.inventory.get(input.sku));

    let mean = input.demand.mean;
    let std = input.demand.std_dev;
    let holding_cost_rate =
        params.carrying_rate * (unit_cost + params.holding_add_on + params.receiving_add_on);
    let annual_demand = mean * params.months_per_year;
    let level = params.service_levels.for_class(input.abc_class);
    let daily_mean = mean / params.days_per_month;
    let inventory_total = position.total();

    let plan = match input.variability {
        Variability::NotVariable => {
            let ss = level.safety_factor * std * (lead_time_days / params.days_per_month).sqrt();
            let reorder = daily_mean * lead_time_days + ss;
            let eoq =
                economic_order_quantity(annual_demand, params.ordering_cost, holding_cost_rate);
            ReplenishmentPlan {
                policy: PolicyKind::Eoq,
                safety_stock: ss,
                review_period_days: None,
                target_level: None,
                reorder_point: Some(reorder),
                order_quantity: Some(eoq),
                recommended: if inventory_total < reorder { eoq } else { 0.0 },
            }
        }
        Variability::Variable => {
            let horizon_days = lead_time_days + params.review_period_days;
            let ss = level.safety_factor * std * (horizon_days / params.days_per_month).sqrt();
            let target = daily_mean * horizon_days + ss;
            ReplenishmentPlan {
                policy: PolicyKind::PeriodicReview,
                safety_stock: ss,
                review_period_days: Some(params.review_period_days),
                target_level: Some(target),
                reorder_point: None,
                order_quantity: None,
                recommended: (target - inventory_total).max(0.0),
            }
        }
    };

    let daily_average_demand = annual_demand / params.days_per_year;
    let coverage_days = (daily_average_demand > 0.0)
        .then(|| (inventory_total / daily_average_demand).round_ties_even());

    PolicyRecord {
        sku: input.sku.to_string(),
        warehouse: input.warehouse.to_string(),
        abc_class: input.abc_class,
        variability: input.variability,
        mean_demand: mean,
        std_demand: std,
        unit_cost,
        lead_time_days,
        holding_cost_rate,
        annual_demand,
        service_level: level.service_level,
        safety_factor: level.safety_factor,
        safety_stock: plan.safety_stock,
        policy: plan.policy,
        review_period_days: plan.review_period_days,
        target_level: plan.target_level,
        reorder_point: plan.reorder_point,
        order_quantity: plan.order_quantity,
        inventory_on_hand: position.on_hand,
        open_orders: position.open_orders,
        last_week_consumption: position.last_week_consumption,
        last_month_consumption: position.last_month_consumption,
        inventory_total,
        recommended_order_qty: plan.recommended,
        daily_average_demand,
        coverage_days,
        coverage_months: coverage_days.map(|d| d / params.days_per_month),
    }
}

/// One policy record per ABC record, using the SKU's variability and the
/// recent window of its forecast-extended demand.
pub fn compute_policies(
    abc: &AbcClassification,
    analyses: &BTreeMap<String, SkuAnalysis>,
    forecasts: &BTreeMap<String, SkuForecast>,
    reference: &ReferenceData,
    config: &PipelineConfig,
) -> Vec<PolicyRecord> {
    let records: Vec<PolicyRecord> = abc
        .records
        .iter()
        .map(|class_record| {
            let sku = class_record.sku.as_str();
            let variability = match analyses.get(sku) {
                Some(analysis) => analysis.summary.variability,
                None => {
                    tracing::warn!(sku, "no classification for SKU, assuming steady demand");
                    Variability::NotVariable
                }
            };
            let demand = forecasts
                .get(sku)
                .map(|f| recent_demand(&f.points, config.recent_window))
                .unwrap_or_default();

            let input = PolicyInput {
                sku,
                warehouse: &class_record.warehouse,
                abc_class: class_record.abc_class,
                variability,
                demand,
            };
            compute_policy(&input, reference, &config.policy)
        })
        .collect();

    tracing::info!(n_policies = records.len(), "computed inventory policies");
    records
}

/// Number of SKUs of a warehouse under a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyCount {
    pub warehouse: String,
    pub policy: PolicyKind,
    pub count: usize,
}

/// Count policies per warehouse. Both policies are reported for every
/// warehouse.
pub fn policy_counts(records: &[PolicyRecord]) -> Vec<PolicyCount> {
    let mut counts: BTreeMap<&str, [usize; 2]> = BTreeMap::new();
    for record in records {
        let slot = match record.policy {
            PolicyKind::Eoq => 0,
            PolicyKind::PeriodicReview => 1,
        };
        counts.entry(record.warehouse.as_str()).or_default()[slot] += 1;
    }
    counts
        .into_iter()
        .flat_map(|(warehouse, [eoq, periodic])| {
            [
                (PolicyKind::Eoq, eoq),
                (PolicyKind::PeriodicReview, periodic),
            ]
            .into_iter()
            .map(move |(policy, count)| PolicyCount {
                warehouse: warehouse.to_string(),
                policy,
                count,
            })
        })
        .collect()
}

/// `None` coverage (no demand) sorts after every finite coverage.
fn compare_coverage(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Read-only views over the policy records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyViews<'a> {
    pub eoq: Vec<&'a PolicyRecord>,
    pub periodic_review: Vec<&'a PolicyRecord>,
    /// SKUs consumed last month that need an order, lowest coverage first
    pub action_items: Vec<&'a PolicyRecord>,
    pub counts: Vec<PolicyCount>,
}

impl<'a> PolicyViews<'a> {
    pub fn from_records(records: &'a [PolicyRecord]) -> Self {
        let by_policy = |kind: PolicyKind| -> Vec<&'a PolicyRecord> {
            records.iter().filter(|r| r.policy == kind).collect()
        };

        let mut action_items: Vec<&PolicyRecord> = records
            .iter()
            .filter(|r| r.last_month_consumption > 0.0 && r.recommended_order_qty > 0.0)
            .collect();
        action_items.sort_by(|a, b| {
            compare_coverage(a.coverage_days, b.coverage_days)
                .then_with(|| a.sku.cmp(&b.sku))
                .then_with(|| a.warehouse.cmp(&b.warehouse))
        });

        Self {
            eoq: by_policy(PolicyKind::Eoq),
            periodic_review: by_policy(PolicyKind::PeriodicReview),
            action_items,
            counts: policy_counts(records),
        }
    }
}
