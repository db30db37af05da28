//! CSV Data Loader Module
//! Reads the demand CSV with Polars and converts it into a typed `DemandTable`.

use super::table::{
    DemandRecord, DemandTable, DsrDelta, Schema, SchemaMismatch, DATETIME_COL, DEMAND_SOURCE_COL,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataLoadError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to load CSV: {0}")]
    Csv(#[from] PolarsError),
    #[error("Missing required column: `{0}`")]
    MissingColumn(String),
    #[error("Invalid timestamp '{value}' on data row {row}")]
    InvalidTimestamp { row: usize, value: String },
    #[error("Invalid number '{value}' in column `{column}` on data row {row}")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },
    #[error(transparent)]
    Schema(#[from] SchemaMismatch),
}

/// Load `path` as a table of the given schema.
///
/// Never fails outright: on error the table is empty (but still carries the
/// requested schema) and the error is handed back alongside it.
pub fn load(path: &Path, schema: Schema) -> (DemandTable, Option<DataLoadError>) {
    match read_table(path, schema) {
        Ok(table) => {
            tracing::info!(
                path = %path.display(),
                columns = ?table.columns(),
                rows = table.len(),
                "loaded demand CSV"
            );
            (table, None)
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), ?schema, error = %err, "failed to load demand CSV");
            (DemandTable::empty(schema), Some(err))
        }
    }
}

fn read_table(path: &Path, schema: Schema) -> Result<DemandTable, DataLoadError> {
    std::fs::metadata(path).map_err(|source| DataLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    // Every column comes in as a string; numbers and dates are parsed below
    // so a bad cell fails the load instead of turning into a null.
    let mut lazy = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?;

    let available = lazy.collect_schema()?;
    for &name in schema.source_columns() {
        if !available.contains(name) {
            return Err(DataLoadError::MissingColumn(name.to_string()));
        }
    }

    let df = lazy
        .select(
            schema
                .source_columns()
                .iter()
                .map(|&name| col(name))
                .collect::<Vec<_>>(),
        )
        .collect()?;

    let timestamps = string_cells(&df, DATETIME_COL)?
        .into_iter()
        .enumerate()
        .map(|(row, cell)| {
            cell.and_then(parse_timestamp)
                .ok_or_else(|| DataLoadError::InvalidTimestamp {
                    row: row + 1,
                    value: cell.unwrap_or_default().to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let demand = numeric_column(&df, DEMAND_SOURCE_COL)?;
    let deltas = schema
        .delta_columns()
        .iter()
        .map(|&name| numeric_column(&df, name))
        .collect::<Result<Vec<_>, _>>()?;

    let records = (0..df.height())
        .map(|i| DemandRecord {
            timestamp: timestamps[i],
            demand: demand[i],
            dsr: match schema {
                Schema::SingleDelta => DsrDelta::Single {
                    dsr_ev: deltas[0][i],
                },
                Schema::Banded => DsrDelta::Banded {
                    lower: deltas[0][i],
                    mid: deltas[1][i],
                    upper: deltas[2][i],
                },
            },
        })
        .collect();

    Ok(DemandTable::new(schema, records)?)
}

fn string_cells<'a>(df: &'a DataFrame, name: &str) -> Result<Vec<Option<&'a str>>, DataLoadError> {
    let series = df.column(name)?.as_materialized_series();
    Ok(series.str()?.into_iter().collect())
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>, DataLoadError> {
    string_cells(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, cell)| {
            cell.map(str::trim)
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .ok_or_else(|| DataLoadError::InvalidNumber {
                    column: name.to_string(),
                    row: row + 1,
                    value: cell.unwrap_or_default().to_string(),
                })
        })
        .collect()
}

/// Parse the `datetime` column. Accepts ISO-style date-times (space or `T`
/// separated, optional seconds/fractions), RFC 3339 with an offset (kept as
/// its UTC instant), and bare dates (midnight).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const FMTS: [&str; 6] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in FMTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Key a cached load is valid for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    path: PathBuf,
    schema: Schema,
    modified: Option<SystemTime>,
}

/// Result of a cached load, cheap to clone.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Arc<DemandTable>,
    pub error: Option<Arc<DataLoadError>>,
}

/// Memoizes the last load by (path, schema, modification time), so the
/// dashboard can re-run the whole pipeline on every control change.
#[derive(Default)]
pub struct CachedLoader {
    entry: Option<(CacheKey, LoadedTable)>,
    reads: usize,
}

impl CachedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path, schema: Schema) -> LoadedTable {
        let key = CacheKey {
            path: path.to_path_buf(),
            schema,
            modified: std::fs::metadata(path).and_then(|m| m.modified()).ok(),
        };

        if let Some((cached_key, loaded)) = &self.entry {
            if *cached_key == key {
                tracing::debug!(path = %path.display(), "demand CSV cache hit");
                return loaded.clone();
            }
        }

        let (table, error) = load(path, schema);
        self.reads += 1;
        let loaded = LoadedTable {
            table: Arc::new(table),
            error: error.map(Arc::new),
        };
        self.entry = Some((key, loaded.clone()));
        loaded
    }

    /// Number of times the file was actually read.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_single_delta_and_ignores_extra_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "single.csv",
            "settlement,datetime,TSD,DSR_EV,notes\n\
             1,2024-01-01 00:00:00,100.5,10,a\n\
             2,2024-01-01 00:30:00,200,20,b\n",
        );

        let (table, err) = load(&path, Schema::SingleDelta);
        assert!(err.is_none(), "{err:?}");
        assert_eq!(table.columns(), vec!["datetime", "demand", "DSR_EV"]);
        assert_eq!(table.len(), 2);
        let first = table.records()[0];
        assert!((first.demand - 100.5).abs() < 1e-12);
        assert_eq!(first.dsr, DsrDelta::Single { dsr_ev: 10.0 });
        assert_eq!(table.records()[1].timestamp.format("%H:%M").to_string(), "00:30");
    }

    #[test]
    fn loads_banded() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "banded.csv",
            "datetime,TSD,DSR_EV_LOWER,DSR_EV_MID,DSR_EV_UPPER\n\
             2024-02-01T12:00:00,300,1,2,3\n",
        );

        let (table, err) = load(&path, Schema::Banded);
        assert!(err.is_none(), "{err:?}");
        assert_eq!(table.schema(), Schema::Banded);
        assert_eq!(
            table.records()[0].dsr,
            DsrDelta::Banded {
                lower: 1.0,
                mid: 2.0,
                upper: 3.0
            }
        );
    }

    #[test]
    fn missing_file_yields_empty_table_and_error() {
        let dir = TempDir::new().unwrap();
        let (table, err) = load(&dir.path().join("nope.csv"), Schema::Banded);
        assert!(table.is_empty());
        assert_eq!(table.schema(), Schema::Banded);
        assert_eq!(table.columns().len(), 5);
        assert!(matches!(err, Some(DataLoadError::Io { .. })));
    }

    #[test]
    fn missing_column_fails_whole_load() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "single.csv",
            "datetime,TSD,DSR_EV\n2024-01-01 00:00:00,1,2\n",
        );
        let (table, err) = load(&path, Schema::Banded);
        assert!(table.is_empty());
        assert!(matches!(err, Some(DataLoadError::MissingColumn(c)) if c == "DSR_EV_LOWER"));
    }

    #[test]
    fn one_bad_timestamp_fails_whole_load() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "bad.csv",
            "datetime,TSD,DSR_EV\n\
             2024-01-01 00:00:00,1,2\n\
             not-a-date,1,2\n",
        );
        let (table, err) = load(&path, Schema::SingleDelta);
        assert!(table.is_empty());
        assert!(matches!(err, Some(DataLoadError::InvalidTimestamp { row: 2, .. })));
    }

    #[test]
    fn bad_number_fails_whole_load() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "bad.csv",
            "datetime,TSD,DSR_EV\n2024-01-01 00:00:00,lots,2\n",
        );
        let (table, err) = load(&path, Schema::SingleDelta);
        assert!(table.is_empty());
        assert!(matches!(
            err,
            Some(DataLoadError::InvalidNumber { ref column, row: 1, .. }) if column == "TSD"
        ));
    }

    #[test]
    fn non_finite_number_fails_whole_load() {
        let dir = TempDir::new().unwrap();
        for cell in ["NaN", "inf", "-inf"] {
            let path = write_csv(
                &dir,
                "nan.csv",
                &format!("datetime,TSD,DSR_EV\n2024-01-01 00:00:00,100,2\n2024-01-01 01:00:00,{cell},2\n"),
            );
            let (table, err) = load(&path, Schema::SingleDelta);
            assert!(table.is_empty(), "{cell} was accepted");
            assert!(matches!(
                err,
                Some(DataLoadError::InvalidNumber { ref column, row: 2, ref value })
                    if column == "TSD" && value == cell
            ));
        }
    }

    #[test]
    fn header_only_file_is_empty_without_error() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "empty.csv", "datetime,TSD,DSR_EV\n");
        let (table, err) = load(&path, Schema::SingleDelta);
        assert!(err.is_none(), "{err:?}");
        assert!(table.is_empty());
    }

    #[test]
    fn bundled_samples_load_in_both_schemas() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("csv");
        let (single, err) = load(&dir.join("forecasted_demand.csv"), Schema::SingleDelta);
        assert!(err.is_none(), "{err:?}");
        let (banded, err) = load(&dir.join("forecasted_demand_banded.csv"), Schema::Banded);
        assert!(err.is_none(), "{err:?}");
        assert_eq!(single.len(), banded.len());
        assert!(!single.is_empty());

        // The single-delta file has no band columns.
        let (wrong, err) = load(&dir.join("forecasted_demand.csv"), Schema::Banded);
        assert!(wrong.is_empty());
        assert!(err.is_some());
    }

    #[test]
    fn timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-01-02 03:04:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T03:04"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T05:04:00+02:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-02"),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("02/01/2024"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn cache_skips_reread_until_file_changes() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "data.csv",
            "datetime,TSD,DSR_EV\n2024-01-01 00:00:00,1,2\n",
        );

        let mut loader = CachedLoader::new();
        let first = loader.load(&path, Schema::SingleDelta);
        let second = loader.load(&path, Schema::SingleDelta);
        assert_eq!(loader.reads(), 1);
        assert!(Arc::ptr_eq(&first.table, &second.table));

        let mut f = File::options().append(true).open(&path).unwrap();
        f.write_all(b"2024-01-02 00:00:00,3,4\n").unwrap();
        f.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
        drop(f);

        let third = loader.load(&path, Schema::SingleDelta);
        assert_eq!(loader.reads(), 2);
        assert_eq!(third.table.len(), 2);
    }

    #[test]
    fn cache_is_keyed_by_schema() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "data.csv",
            "datetime,TSD,DSR_EV\n2024-01-01 00:00:00,1,2\n",
        );

        let mut loader = CachedLoader::new();
        assert!(loader.load(&path, Schema::SingleDelta).error.is_none());
        let banded = loader.load(&path, Schema::Banded);
        assert_eq!(loader.reads(), 2);
        assert!(banded.error.is_some());
        assert_eq!(banded.table.schema(), Schema::Banded);
    }
}
