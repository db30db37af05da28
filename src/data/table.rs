//! Demand Table Module
//! Typed rows of the demand CSV and the column schema they follow.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Which DSR column set a CSV file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Schema {
    /// `datetime, TSD, DSR_EV`
    #[default]
    SingleDelta,
    /// `datetime, TSD, DSR_EV_LOWER, DSR_EV_MID, DSR_EV_UPPER`
    Banded,
}

pub const DATETIME_COL: &str = "datetime";
pub const DEMAND_SOURCE_COL: &str = "TSD";
pub const DEMAND_COL: &str = "demand";

impl Schema {
    /// Columns read from the CSV, in output order.
    pub fn source_columns(self) -> &'static [&'static str] {
        match self {
            Schema::SingleDelta => &[DATETIME_COL, DEMAND_SOURCE_COL, "DSR_EV"],
            Schema::Banded => &[
                DATETIME_COL,
                DEMAND_SOURCE_COL,
                "DSR_EV_LOWER",
                "DSR_EV_MID",
                "DSR_EV_UPPER",
            ],
        }
    }

    /// Columns of a loaded table (`TSD` renamed to `demand`).
    pub fn columns(self) -> Vec<&'static str> {
        self.source_columns()
            .iter()
            .map(|&c| if c == DEMAND_SOURCE_COL { DEMAND_COL } else { c })
            .collect()
    }

    /// Source names of the DSR delta columns only.
    pub fn delta_columns(self) -> &'static [&'static str] {
        &self.source_columns()[2..]
    }

    pub fn label(self) -> &'static str {
        match self {
            Schema::SingleDelta => "Single delta",
            Schema::Banded => "Uncertainty band",
        }
    }
}

/// DSR delta values of one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DsrDelta {
    Single { dsr_ev: f64 },
    Banded { lower: f64, mid: f64, upper: f64 },
}

impl DsrDelta {
    pub fn schema(&self) -> Schema {
        match self {
            DsrDelta::Single { .. } => Schema::SingleDelta,
            DsrDelta::Banded { .. } => Schema::Banded,
        }
    }

    /// Central delta: `DSR_EV`, or `DSR_EV_MID` for banded rows.
    pub fn central(&self) -> f64 {
        match *self {
            DsrDelta::Single { dsr_ev } => dsr_ev,
            DsrDelta::Banded { mid, .. } => mid,
        }
    }
}

/// One row of the source table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandRecord {
    pub timestamp: NaiveDateTime,
    pub demand: f64,
    pub dsr: DsrDelta,
}

impl DemandRecord {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Demand with the central EV delta removed.
    pub fn underlying_demand(&self) -> f64 {
        self.demand - self.dsr.central()
    }
}

/// Returned when a record's delta shape disagrees with the table schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("row {row} has {found:?} deltas but the table schema is {expected:?}")]
pub struct SchemaMismatch {
    pub row: usize,
    pub expected: Schema,
    pub found: Schema,
}

/// Ordered demand rows, all sharing one schema. Source order is kept as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandTable {
    schema: Schema,
    records: Vec<DemandRecord>,
}

impl DemandTable {
    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    pub fn new(schema: Schema, records: Vec<DemandRecord>) -> Result<Self, SchemaMismatch> {
        if let Some((row, rec)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.dsr.schema() != schema)
        {
            return Err(SchemaMismatch {
                row,
                expected: schema,
                found: rec.dsr.schema(),
            });
        }
        Ok(Self { schema, records })
    }

    /// Build a table from rows already known to match `self.schema`.
    pub(crate) fn derive(&self, records: Vec<DemandRecord>) -> Self {
        debug_assert!(records.iter().all(|r| r.dsr.schema() == self.schema));
        Self {
            schema: self.schema,
            records,
        }
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn columns(&self) -> Vec<&'static str> {
        self.schema.columns()
    }

    pub fn records(&self) -> &[DemandRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest calendar date present.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.records.first()?.date();
        Some(self.records.iter().fold((first, first), |(lo, hi), r| {
            let d = r.date();
            (lo.min(d), hi.max(d))
        }))
    }
}
