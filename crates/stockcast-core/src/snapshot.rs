//! Immutable pipeline results and the shared handle that serves them.

use crate::abc::AbcClassification;
use crate::classify::SkuAnalysis;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::forecast::{ModelCount, SkuForecast};
use crate::outliers::OutlierBounds;
use crate::pipeline::run_pipeline;
use crate::policy::{PolicyCount, PolicyViews, ReferenceData};
use crate::types::{
    AbcClassCount, AbcClassRecord, AdjustedConsumptionRecord, ClassificationSummary,
    ConsumptionRecord, ForecastPoint, ModelSelection, PolicyRecord,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Every table produced by one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub adjusted: Vec<AdjustedConsumptionRecord>,
    pub outlier_bounds: BTreeMap<String, OutlierBounds>,
    pub analyses: BTreeMap<String, SkuAnalysis>,
    pub forecasts: BTreeMap<String, SkuForecast>,
    pub abc: AbcClassification,
    pub policies: Vec<PolicyRecord>,
    pub model_counts: Vec<ModelCount>,
    pub policy_counts: Vec<PolicyCount>,
}

impl Snapshot {
    pub fn classifications(&self) -> impl Iterator<Item = &ClassificationSummary> {
        self.analyses.values().map(|a| &a.summary)
    }

    pub fn model_selections(&self) -> impl Iterator<Item = &ModelSelection> {
        self.forecasts.values().map(|f| &f.selection)
    }

    pub fn forecast_points(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.forecasts.values().flat_map(|f| f.points.iter())
    }

    /// The last `n` points of a SKU's history-plus-forecast series.
    pub fn forecast_window(&self, sku: &str, n: usize) -> Option<&[ForecastPoint]> {
        self.forecasts.get(sku).map(|f| {
            let start = f.points.len().saturating_sub(n);
            &f.points[start..]
        })
    }

    pub fn abc_records(&self) -> &[AbcClassRecord] {
        &self.abc.records
    }

    pub fn abc_counts(&self) -> &[AbcClassCount] {
        &self.abc.counts
    }

    pub fn policy_views(&self) -> PolicyViews<'_> {
        PolicyViews::from_records(&self.policies)
    }

    pub fn policy(&self, sku: &str, warehouse: &str) -> Option<&PolicyRecord> {
        self.policies
            .iter()
            .find(|p| p.sku == sku && p.warehouse == warehouse)
    }
}

/// Shared slot holding the latest published snapshot.
///
/// Clones share the slot. Readers get an `Arc` to a complete snapshot and
/// keep it alive after a newer one is published.
#[derive(Debug, Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Option<Arc<Snapshot>>>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest published snapshot, if any.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.inner.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Replace the published snapshot, returning the previous one.
    pub fn publish(&self, snapshot: Snapshot) -> Option<Arc<Snapshot>> {
        self.inner.write().replace(Arc::new(snapshot))
    }

    /// Run the pipeline and publish its result. On error the previous
    /// snapshot stays in place.
    pub fn regenerate(
        &self,
        records: &[ConsumptionRecord],
        reference: &ReferenceData,
        config: &PipelineConfig,
    ) -> Result<Arc<Snapshot>> {
        let snapshot = Arc::new(run_pipeline(records, reference, config)?);
        *self.inner.write() = Some(Arc::clone(&snapshot));
        tracing::info!(n_policies = snapshot.policies.len(), "published new snapshot");
        Ok(snapshot)
    }
}
