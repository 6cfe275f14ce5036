//! Pipeline driver for the subscription dashboard.
//!
//! Chains Loader → Normalizer → Classifier once per upload
//! ([`prepare_sources`]) and Aggregator once per filter change
//! ([`run_pipeline`]), returning a [`DashboardReport`] for the presentation
//! layer.

use std::time::Instant;

use chrono::Utc;
use dashboard_core::config::{PipelineConfig, View};
use dashboard_core::models::{ClassifiedDataset, ClassifiedRecord, Coordinates, GroupDimension};
use dashboard_core::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregator::{GroupCount, MonthlySeries, SubscriptionAggregator, TypeSeries};
use crate::classifier::classify_dataset;
use crate::normalizer::{normalize, NormalizeReport};
use crate::reader::{load_sources, InputSource};

// ── Public types ──────────────────────────────────────────────────────────────

/// A city count with its coordinates, when they could be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityLocation {
    pub city: String,
    pub count: u64,
    pub coordinates: Option<Coordinates>,
}

/// A classified dataset together with how it was produced.
///
/// This is what a session holds between filter changes; aggregation reruns
/// against it without touching the sources again.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub dataset: ClassifiedDataset,
    /// Source names in load order.
    pub sources: Vec<String>,
    /// Rows across all sources before normalisation.
    pub rows_loaded: usize,
    pub normalize: NormalizeReport,
    /// Wall-clock seconds spent reading and concatenating sources.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent normalising and classifying.
    pub transform_time_seconds: f64,
}

/// Metadata produced alongside every report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// RFC 3339 timestamp when this report was generated.
    pub generated_at: String,
    pub sources: Vec<String>,
    pub rows_loaded: usize,
    /// Records that survived normalisation.
    pub records_analyzed: usize,
    /// Records matching the status filter.
    pub filtered_records: usize,
    pub load_time_seconds: f64,
    /// Normalise, classify and aggregate, in seconds.
    pub transform_time_seconds: f64,
}

/// Every enabled view of one pipeline run. Disabled views are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_state: Option<Vec<GroupCount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_city: Option<Vec<GroupCount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<MonthlySeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_type: Option<TypeSeries>,
    /// City counts awaiting coordinates; filled in by the geocoding layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_map: Option<Vec<CityLocation>>,
    pub metadata: ReportMetadata,
}

impl DashboardReport {
    /// Pretty-printed JSON for machine consumers.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Load, normalise and classify `sources`.
///
/// Fails only on dataset-level problems (unparseable source, required column
/// absent everywhere); row and field problems are recovered and counted in
/// the [`NormalizeReport`].
pub fn prepare_sources(sources: &[InputSource]) -> Result<PreparedDataset> {
    // ── Step 1: Load ──────────────────────────────────────────────────────────
    let load_start = Instant::now();
    let raw = load_sources(sources)?;
    let load_time = load_start.elapsed().as_secs_f64();

    // ── Step 2: Normalise + classify ──────────────────────────────────────────
    let transform_start = Instant::now();
    let (dataset, report) = normalize(&raw);
    let classified = classify_dataset(&dataset);
    let transform_time = transform_start.elapsed().as_secs_f64();

    debug!(
        "Prepared {} records in {:.3}s load / {:.3}s transform",
        classified.len(),
        load_time,
        transform_time
    );

    Ok(PreparedDataset {
        dataset: classified,
        sources: raw.sources,
        rows_loaded: raw.rows.len(),
        normalize: report,
        load_time_seconds: load_time,
        transform_time_seconds: transform_time,
    })
}

/// Compute every view enabled in `config` over a prepared dataset.
///
/// Geography views always honour the status filter. Time series cover every
/// record unless `config.filter_time_series` is set.
pub fn run_pipeline(prepared: &PreparedDataset, config: &PipelineConfig) -> DashboardReport {
    let start = Instant::now();
    let records = &prepared.dataset.records;

    let filtered: Vec<&ClassifiedRecord> = records
        .iter()
        .filter(|r| config.statuses.matches(&r.record))
        .collect();
    let series_input: Vec<&ClassifiedRecord> = if config.filter_time_series {
        filtered.clone()
    } else {
        records.iter().collect()
    };

    let geography = |dimension: GroupDimension| {
        SubscriptionAggregator::geography_counts(
            filtered.iter().map(|r| &r.record),
            dimension,
            Some(config.top_n),
        )
    };

    let by_state = config.includes(View::State).then(|| geography(GroupDimension::State));
    let by_city = config.includes(View::City).then(|| geography(GroupDimension::City));
    let city_map = config.includes(View::CityMap).then(|| {
        geography(GroupDimension::City)
            .into_iter()
            .map(|g| CityLocation {
                city: g.key,
                count: g.count,
                coordinates: None,
            })
            .collect()
    });

    let overall = config.includes(View::Overall).then(|| {
        SubscriptionAggregator::monthly_unique(
            series_input.iter().map(|r| &r.record),
            config.start_month,
            config.smoothing_window,
        )
    });
    let by_type = config.includes(View::ByType).then(|| {
        SubscriptionAggregator::monthly_unique_by_type(
            series_input.iter().copied(),
            config.start_month,
            config.smoothing_window,
        )
    });

    let aggregate_time = start.elapsed().as_secs_f64();
    info!(
        "Aggregated {} of {} records across {} views",
        filtered.len(),
        records.len(),
        config.views.len()
    );

    DashboardReport {
        by_state,
        by_city,
        overall,
        by_type,
        city_map,
        metadata: ReportMetadata {
            generated_at: Utc::now().to_rfc3339(),
            sources: prepared.sources.clone(),
            rows_loaded: prepared.rows_loaded,
            records_analyzed: records.len(),
            filtered_records: filtered.len(),
            load_time_seconds: prepared.load_time_seconds,
            transform_time_seconds: prepared.transform_time_seconds + aggregate_time,
        },
    }
}

/// [`prepare_sources`] followed by [`run_pipeline`].
pub fn analyze_sources(sources: &[InputSource], config: &PipelineConfig) -> Result<DashboardReport> {
    config.validate()?;
    let prepared = prepare_sources(sources)?;
    Ok(run_pipeline(&prepared, config))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
