//! Data module - CSV loading, filtering and resampling

mod loader;
mod processor;
mod table;

pub use loader::{CachedLoader, DataLoadError};
pub use processor::{DataProcessor, DateRange, Period, ResampledBucket};
pub use table::{DemandRecord, DemandTable, DsrDelta, Schema};
