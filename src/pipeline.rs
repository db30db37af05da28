//! Dashboard pipeline: load -> date filter -> resample.
//!
//! One parameterized pass replaces the separate dashboard variants. Every
//! control change re-invokes [`run`] with the new parameters; the only state
//! carried between runs is the loader cache.

use crate::data::{
    CachedLoader, DataLoadError, DataProcessor, DateRange, DemandTable, Period, ResampledBucket,
    Schema,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Inputs of a single pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineParams {
    pub csv_path: PathBuf,
    pub schema: Schema,
    /// `None` keeps every row.
    pub date_range: Option<DateRange>,
    pub period: Period,
}

/// Everything the presentation layer needs from one run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub params: PipelineParams,
    /// Table as loaded, before filtering (drives the date picker defaults).
    pub loaded: Arc<DemandTable>,
    /// Rows inside the selected date range (line chart).
    pub filtered: DemandTable,
    /// Calendar buckets of `filtered` (bar chart).
    pub buckets: Vec<ResampledBucket>,
    pub error: Option<Arc<DataLoadError>>,
}

impl PipelineOutput {
    pub fn has_data(&self) -> bool {
        !self.filtered.is_empty()
    }
}

/// Run the full pipeline, reading through `loader`'s cache.
pub fn run(loader: &mut CachedLoader, params: &PipelineParams) -> PipelineOutput {
    let loaded = loader.load(&params.csv_path, params.schema);
    let (filtered, buckets) = transform(&loaded.table, params.date_range, params.period);

    tracing::debug!(
        path = %params.csv_path.display(),
        rows = loaded.table.len(),
        filtered = filtered.len(),
        buckets = buckets.len(),
        empty_buckets = buckets.iter().filter(|b| b.count == 0).count(),
        file_reads = loader.reads(),
        period = ?params.period,
        "pipeline run"
    );

    PipelineOutput {
        params: params.clone(),
        loaded: loaded.table,
        filtered,
        buckets,
        error: loaded.error,
    }
}

/// The pure part of the pipeline: optional date filter, then resample.
pub fn transform(
    table: &DemandTable,
    date_range: Option<DateRange>,
    period: Period,
) -> (DemandTable, Vec<ResampledBucket>) {
    let filtered = match date_range {
        Some(range) => DataProcessor::filter_by_date(table, range.start, range.end),
        None => table.clone(),
    };
    let buckets = DataProcessor::resample_calendar(&filtered, period);
    (filtered, buckets)
}
