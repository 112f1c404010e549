//! Pipeline configuration.
//!
//! Every tunable constant of the pipeline lives here with its domain default.
//! Configurations can be deserialized from JSON; missing fields fall back to
//! the defaults.

use crate::error::{Result, StockcastError};
use crate::types::AbcClass;
use serde::{Deserialize, Serialize};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Multiplier of the IQR below Q1 that marks a low outlier
    pub iqr_multiplier: f64,
    /// Coefficient of variation above which a SKU is `Variable`
    pub variability_threshold: f64,
    /// Window of the reporting moving average
    pub moving_average_window: usize,
    /// Seasonal period in months, shared by decomposition and seasonal models
    pub seasonal_period: usize,
    /// Number of trailing points of the extended series summarised for policy
    pub recent_window: usize,
    /// Forecast selection settings
    pub forecast: ForecastConfig,
    /// Cost and service parameters of the policy calculator
    pub policy: PolicyParameters,
    /// Warehouses to keep; empty keeps every warehouse
    pub warehouses: Vec<String>,
    /// Keep only SKUs whose last consumption falls in this year
    pub active_year: Option<i32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: 1.5,
            variability_threshold: 0.5,
            moving_average_window: 3,
            seasonal_period: 12,
            recent_window: 6,
            forecast: ForecastConfig::default(),
            policy: PolicyParameters::default(),
            warehouses: Vec::new(),
            active_year: None,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON, filling gaps with defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every parameter is usable.
    pub fn validate(&self) -> Result<()> {
        require_non_negative("iqr_multiplier", self.iqr_multiplier)?;
        require_non_negative("variability_threshold", self.variability_threshold)?;
        require_positive_count("moving_average_window", self.moving_average_window)?;
        require_positive_count("recent_window", self.recent_window)?;
        if self.seasonal_period < 2 {
            return Err(StockcastError::invalid_parameter(
                "seasonal_period",
                self.seasonal_period,
                "must be at least 2",
            ));
        }
        self.forecast.validate()?;
        self.policy.validate()
    }
}

/// Hold-out and horizon of the forecast selector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Trailing periods held out to score candidates
    pub holdout: usize,
    /// Periods forecast beyond the last historical period
    pub horizon: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            holdout: 3,
            horizon: 3,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<()> {
        require_positive_count("forecast.holdout", self.holdout)?;
        require_positive_count("forecast.horizon", self.horizon)
    }
}

/// Target service level and matching safety factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceLevel {
    pub service_level: f64,
    pub safety_factor: f64,
}

/// Service level per ABC class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceLevelTable {
    pub a: ServiceLevel,
    pub b: ServiceLevel,
    pub c: ServiceLevel,
}

impl Default for ServiceLevelTable {
    fn default() -> Self {
        Self {
            a: ServiceLevel {
                service_level: 0.95,
                safety_factor: 1.645,
            },
            b: ServiceLevel {
                service_level: 0.75,
                safety_factor: 0.675,
            },
            c: ServiceLevel {
                service_level: 0.70,
                safety_factor: 0.524,
            },
        }
    }
}

impl ServiceLevelTable {
    pub fn for_class(&self, class: AbcClass) -> ServiceLevel {
        match class {
            AbcClass::A => self.a,
            AbcClass::B => self.b,
            AbcClass::C => self.c,
        }
    }
}

/// Cost and timing constants of the replenishment policies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyParameters {
    /// Annual carrying rate applied to the loaded unit cost
    pub carrying_rate: f64,
    /// Holding cost per unit added to the unit cost
    pub holding_add_on: f64,
    /// Receiving cost per unit added to the unit cost
    pub receiving_add_on: f64,
    /// Fixed cost of placing one order
    pub ordering_cost: f64,
    /// Review interval of the periodic-review policy, in days
    pub review_period_days: f64,
    /// Unit cost used when a SKU has no cost data
    pub default_unit_cost: f64,
    /// Lead time used when a SKU has no lead-time data
    pub default_lead_time_days: f64,
    pub days_per_month: f64,
    pub days_per_year: f64,
    pub months_per_year: f64,
    pub service_levels: ServiceLevelTable,
}

impl Default for PolicyParameters {
    fn default() -> Self {
        Self {
            carrying_rate: 0.12,
            holding_add_on: 1.84,
            receiving_add_on: 0.36,
            ordering_cost: 7.50,
            review_period_days: 5.0,
            default_unit_cost: 100.0,
            default_lead_time_days: 30.0,
            days_per_month: 30.0,
            days_per_year: 365.0,
            months_per_year: 12.0,
            service_levels: ServiceLevelTable::default(),
        }
    }
}

impl PolicyParameters {
    pub fn validate(&self) -> Result<()> {
        require_non_negative("policy.carrying_rate", self.carrying_rate)?;
        require_non_negative("policy.holding_add_on", self.holding_add_on)?;
        require_non_negative("policy.receiving_add_on", self.receiving_add_on)?;
        require_non_negative("policy.ordering_cost", self.ordering_cost)?;
        require_non_negative("policy.review_period_days", self.review_period_days)?;
        require_non_negative("policy.default_unit_cost", self.default_unit_cost)?;
        require_non_negative("policy.default_lead_time_days", self.default_lead_time_days)?;
        require_positive("policy.days_per_month", self.days_per_month)?;
        require_positive("policy.days_per_year", self.days_per_year)?;
        require_positive("policy.months_per_year", self.months_per_year)?;
        for class in AbcClass::ALL {
            let level = self.service_levels.for_class(class);
            if !(0.0..=1.0).contains(&level.service_level) {
                return Err(StockcastError::invalid_parameter(
                    format!("policy.service_levels.{}", class),
                    level.service_level,
                    "service level must be between 0 and 1",
                ));
            }
            require_non_negative("policy.service_levels.safety_factor", level.safety_factor)?;
        }
        Ok(())
    }
}

fn require_non_negative(param: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(StockcastError::invalid_parameter(
            param,
            value,
            "must be a finite non-negative number",
        ));
    }
    Ok(())
}

fn require_positive(param: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(StockcastError::invalid_parameter(
            param,
            value,
            "must be a finite positive number",
        ));
    }
    Ok(())
}

fn require_positive_count(param: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(StockcastError::invalid_parameter(param, value, "must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.forecast.holdout, 3);
        assert_eq!(config.forecast.horizon, 3);
        assert_eq!(config.recent_window, 6);
        assert_eq!(config.policy.ordering_cost, 7.50);
    }

    #[test]
    fn test_service_level_lookup() {
        let table = ServiceLevelTable::default();
        assert_eq!(table.for_class(AbcClass::A).safety_factor, 1.645);
        assert_eq!(table.for_class(AbcClass::B).service_level, 0.75);
        assert_eq!(table.for_class(AbcClass::C).safety_factor, 0.524);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{"forecast": {"horizon": 6}, "policy": {"ordering_cost": 9.0}, "warehouses": ["MACROS"]}"#,
        )
        .unwrap();
        assert_eq!(config.forecast.horizon, 6);
        assert_eq!(config.forecast.holdout, 3);
        assert_eq!(config.policy.ordering_cost, 9.0);
        assert_eq!(config.policy.default_unit_cost, 100.0);
        assert_eq!(config.warehouses, vec!["MACROS".to_string()]);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = PipelineConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, StockcastError::Config(_)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.forecast.holdout = 0;
        assert!(matches!(
            config.validate(),
            Err(StockcastError::InvalidParameter { .. })
        ));

        let mut config = PipelineConfig::default();
        config.seasonal_period = 1;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.policy.days_per_year = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.policy.service_levels.a.service_level = 1.5;
        assert!(config.validate().is_err());
    }
}
