//! Data model shared by every pipeline stage.

use crate::error::{Result, StockcastError};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Create a month, validating that `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(StockcastError::invalid_parameter(
                "month",
                month,
                "must be between 1 and 12",
            ));
        }
        Ok(Self { year, month })
    }

    /// Month containing the given date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Month `n` months after this one.
    pub fn add_months(&self, n: u32) -> Self {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) + n as i64;
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// The following month.
    pub fn succ(&self) -> Self {
        self.add_months(1)
    }

    /// First instant of the month in UTC.
    pub fn to_utc(&self) -> Result<DateTime<Utc>> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| {
                StockcastError::InvalidInput(format!("Month {} is out of range", self))
            })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = StockcastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| StockcastError::InvalidInput(format!("Expected YYYY-MM, got '{}'", s)))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| StockcastError::InvalidInput(format!("Invalid year in '{}'", s)))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| StockcastError::InvalidInput(format!("Invalid month in '{}'", s)))?;
        YearMonth::new(year, month)
    }
}

impl From<YearMonth> for String {
    fn from(ym: YearMonth) -> Self {
        ym.to_string()
    }
}

impl TryFrom<String> for YearMonth {
    type Error = StockcastError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// One month of consumption of a SKU in a warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub sku: String,
    pub warehouse: String,
    pub period: YearMonth,
    pub quantity: f64,
}

impl ConsumptionRecord {
    pub fn new(
        sku: impl Into<String>,
        warehouse: impl Into<String>,
        period: YearMonth,
        quantity: f64,
    ) -> Self {
        Self {
            sku: sku.into(),
            warehouse: warehouse.into(),
            period,
            quantity,
        }
    }
}

/// A consumption record after low-outlier adjustment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustedConsumptionRecord {
    pub sku: String,
    pub warehouse: String,
    pub period: YearMonth,
    pub quantity: f64,
    pub is_outlier: bool,
    /// `None` only when every record of the SKU group is an outlier.
    pub adjusted_quantity: Option<f64>,
}

impl AdjustedConsumptionRecord {
    /// Adjusted quantity with a missing value read as zero consumption.
    pub fn adjusted_or_zero(&self) -> f64 {
        self.adjusted_quantity.unwrap_or(0.0)
    }
}

/// Monthly totals of one SKU summed across warehouses, in period order.
///
/// Only months with at least one record appear; gaps are not filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlySeries {
    pub periods: Vec<YearMonth>,
    pub values: Vec<f64>,
}

impl MonthlySeries {
    /// Sum `(sku, period, quantity)` entries into one series per SKU.
    pub fn collect_by_sku<'a, I>(entries: I) -> BTreeMap<String, MonthlySeries>
    where
        I: IntoIterator<Item = (&'a str, YearMonth, f64)>,
    {
        let mut totals: BTreeMap<&'a str, BTreeMap<YearMonth, f64>> = BTreeMap::new();
        for (sku, period, quantity) in entries {
            *totals.entry(sku).or_default().entry(period).or_insert(0.0) += quantity;
        }
        totals
            .into_iter()
            .map(|(sku, months)| {
                let (periods, values): (Vec<YearMonth>, Vec<f64>) = months.into_iter().unzip();
                (sku.to_string(), MonthlySeries { periods, values })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last_period(&self) -> Option<YearMonth> {
        self.periods.last().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variability {
    Variable,
    NotVariable,
}

impl Variability {
    pub fn label(&self) -> &'static str {
        match self {
            Variability::Variable => "Variable",
            Variability::NotVariable => "Not Variable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    Ascending,
    Descending,
    Flat,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seasonality {
    Seasonal,
    NotSeasonal,
    InsufficientData,
}

/// Variability, trend and seasonality labels of one SKU.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationSummary {
    pub sku: String,
    pub coefficient_of_variation: f64,
    pub variability: Variability,
    pub trend: Trend,
    pub seasonality: Seasonality,
    /// High-season calendar months (1-12); empty unless `Seasonal`.
    pub seasonal_months: BTreeSet<u32>,
}

/// Candidate forecasting models, in tie-break precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    SeasonalArima,
    ExponentialSmoothing,
    Arima,
    LinearRegression,
}

impl ModelKind {
    /// All candidates in evaluation order.
    pub const ALL: [ModelKind; 4] = [
        ModelKind::SeasonalArima,
        ModelKind::ExponentialSmoothing,
        ModelKind::Arima,
        ModelKind::LinearRegression,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::SeasonalArima => "SARIMA",
            ModelKind::ExponentialSmoothing => "Holt-Winters",
            ModelKind::Arima => "ARIMA",
            ModelKind::LinearRegression => "Linear Regression",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name reported for SKUs where no candidate model could be fitted.
pub const NO_MODEL: &str = "none";

/// Hold-out score of one candidate model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelEvaluation {
    pub model: ModelKind,
    pub mean_absolute_error: f64,
}

/// Outcome of forecast model selection for one SKU.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSelection {
    pub sku: String,
    pub warehouse: String,
    pub model: Option<ModelKind>,
    pub mean_absolute_error: Option<f64>,
    /// Scores of every candidate that fitted, in evaluation order.
    pub evaluations: Vec<ModelEvaluation>,
}

impl ModelSelection {
    pub fn model_name(&self) -> &'static str {
        self.model.map(|m| m.name()).unwrap_or(NO_MODEL)
    }
}

/// A point of the history-plus-forecast series of a SKU.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub sku: String,
    pub warehouse: String,
    pub period: YearMonth,
    pub actual_quantity: Option<f64>,
    pub forecast_quantity: Option<f64>,
    pub is_forecast: bool,
}

impl ForecastPoint {
    /// Quantity of the point regardless of which series carries it.
    pub fn quantity(&self) -> Option<f64> {
        if self.is_forecast {
            self.forecast_quantity
        } else {
            self.actual_quantity
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AbcClass {
    A,
    B,
    C,
}

impl AbcClass {
    pub const ALL: [AbcClass; 3] = [AbcClass::A, AbcClass::B, AbcClass::C];
}

impl fmt::Display for AbcClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbcClass::A => "A",
            AbcClass::B => "B",
            AbcClass::C => "C",
        };
        f.write_str(s)
    }
}

/// Pareto class of a SKU within a warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbcClassRecord {
    pub sku: String,
    pub warehouse: String,
    pub total_consumption: f64,
    pub share_pct: f64,
    pub cumulative_share_pct: f64,
    pub abc_class: AbcClass,
}

/// Number of SKUs per ABC class in one warehouse. Every class is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbcClassCount {
    pub warehouse: String,
    pub counts: BTreeMap<AbcClass, usize>,
}

impl AbcClassCount {
    pub fn new(warehouse: impl Into<String>) -> Self {
        Self {
            warehouse: warehouse.into(),
            counts: AbcClass::ALL.iter().map(|&c| (c, 0)).collect(),
        }
    }

    pub fn get(&self, class: AbcClass) -> usize {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
    Eoq,
    PeriodicReview,
}

impl PolicyKind {
    pub fn name(&self) -> &'static str {
        match self {
            PolicyKind::Eoq => "EOQ",
            PolicyKind::PeriodicReview => "Periodic Review",
        }
    }
}

/// Replenishment policy and order recommendation for a SKU in a warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyRecord {
    pub sku: String,
    pub warehouse: String,
    pub abc_class: AbcClass,
    pub variability: Variability,
    pub mean_demand: f64,
    pub std_demand: f64,
    pub unit_cost: f64,
    pub lead_time_days: f64,
    pub holding_cost_rate: f64,
    pub annual_demand: f64,
    pub service_level: f64,
    pub safety_factor: f64,
    pub safety_stock: f64,
    pub policy: PolicyKind,
    pub review_period_days: Option<f64>,
    pub target_level: Option<f64>,
    pub reorder_point: Option<f64>,
    pub order_quantity: Option<f64>,
    pub inventory_on_hand: f64,
    pub open_orders: f64,
    pub last_week_consumption: f64,
    pub last_month_consumption: f64,
    pub inventory_total: f64,
    pub recommended_order_qty: f64,
    pub daily_average_demand: f64,
    /// `None` means unbounded coverage (no demand).
    pub coverage_days: Option<f64>,
    pub coverage_months: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_month_ordering_and_arithmetic() {
        let nov = YearMonth::new(2023, 11).unwrap();
        let jan = YearMonth::new(2024, 1).unwrap();
        assert!(nov < jan);
        assert_eq!(nov.add_months(2), jan);
        assert_eq!(YearMonth::new(2023, 12).unwrap().succ(), jan);
        assert_eq!(nov.add_months(0), nov);
    }

    #[test]
    fn test_year_month_parse_and_display() {
        let ym: YearMonth = "2024-03".parse().unwrap();
        assert_eq!(ym.year(), 2024);
        assert_eq!(ym.month(), 3);
        assert_eq!(ym.to_string(), "2024-03");
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("2024".parse::<YearMonth>().is_err());
        assert!(YearMonth::new(2024, 0).is_err());
    }

    #[test]
    fn test_year_month_serde_as_string() {
        let ym = YearMonth::new(2024, 7).unwrap();
        let json = serde_json::to_string(&ym).unwrap();
        assert_eq!(json, "\"2024-07\"");
        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ym);
    }

    #[test]
    fn test_year_month_to_utc() {
        let ts = YearMonth::new(2024, 2).unwrap().to_utc().unwrap();
        assert_eq!(ts.date_naive(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn test_monthly_series_sums_across_warehouses() {
        let jan = YearMonth::new(2024, 1).unwrap();
        let feb = jan.succ();
        let entries = vec![
            ("B", feb, 1.0),
            ("A", feb, 2.0),
            ("A", jan, 3.0),
            ("A", feb, 4.0),
        ];
        let series = MonthlySeries::collect_by_sku(entries);
        assert_eq!(series.len(), 2);
        assert_eq!(series["A"].periods, vec![jan, feb]);
        assert_eq!(series["A"].values, vec![3.0, 6.0]);
        assert_eq!(series["B"].last_period(), Some(feb));
    }

    #[test]
    fn test_model_precedence_order() {
        let mut kinds = ModelKind::ALL.to_vec();
        kinds.reverse();
        kinds.sort();
        assert_eq!(kinds, ModelKind::ALL.to_vec());
        assert_eq!(ModelKind::SeasonalArima.name(), "SARIMA");
    }

    #[test]
    fn test_forecast_point_quantity() {
        let period = YearMonth::new(2024, 1).unwrap();
        let point = ForecastPoint {
            sku: "X".into(),
            warehouse: "W".into(),
            period,
            actual_quantity: None,
            forecast_quantity: Some(4.0),
            is_forecast: true,
        };
        assert_eq!(point.quantity(), Some(4.0));
    }
}
