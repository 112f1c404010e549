//! Demand analytics and inventory-policy pipeline.
//!
//! From monthly consumption records this crate derives outlier-adjusted
//! demand, variability/trend/seasonality labels, a model-selected short-term
//! forecast, per-warehouse ABC classes and the replenishment policy of each
//! SKU. [`run_pipeline`] runs every stage and returns a [`Snapshot`];
//! [`SnapshotHandle`] shares the latest one between readers.

pub mod abc;
pub mod classify;
pub mod config;
pub mod decomposition;
pub mod error;
pub mod forecast;
pub mod logging;
pub mod metrics;
pub mod outliers;
pub mod pipeline;
pub mod policy;
pub mod snapshot;
pub mod stats;
pub mod types;

// Re-exports for convenience
pub use abc::{classify_abc, AbcClassification};
pub use classify::{classify_all, classify_sku, moving_average, SkuAnalysis};
pub use config::{ForecastConfig, PipelineConfig, PolicyParameters, ServiceLevel, ServiceLevelTable};
pub use decomposition::{decompose_additive, Decomposition};
pub use error::{Result, StockcastError};
pub use forecast::{
    fit_candidate, forecast_all, forecast_points, model_counts, recent_demand, select_and_forecast,
    select_best, ModelCount, SkuForecast,
};
pub use metrics::mae;
pub use outliers::{adjust_outliers, bounds_by_sku, group_bounds, OutlierBounds};
pub use pipeline::{normalize_records, run_pipeline};
pub use policy::{
    compute_policies, compute_policy, economic_order_quantity, policy_counts, InventoryPosition,
    InventoryTable, LeadTimeTable, PolicyCount, PolicyInput, PolicyViews, ReferenceData,
    UnitCostTable,
};
pub use snapshot::{Snapshot, SnapshotHandle};
pub use stats::DemandStats;
pub use types::*;
