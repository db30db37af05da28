//! Data Processor Module
//! Date-range filtering and calendar resampling of demand tables.

use super::table::DemandTable;
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Share of the bucket mean shown as the first (bottom) bar component.
pub const COMPONENT1_SHARE: f64 = 0.6;
/// Share of the bucket mean shown as the second (stacked) bar component.
pub const COMPONENT2_SHARE: f64 = 0.4;

/// Resampling period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Period {
    #[default]
    Daily,
    Monthly,
}

impl Period {
    /// Start of the bucket containing `date`.
    pub fn bucket_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Daily => date,
            Period::Monthly => date.with_day(1).unwrap_or(date),
        }
    }

    fn next_bucket(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Period::Daily => start.checked_add_signed(Duration::days(1)),
            Period::Monthly => start.checked_add_months(Months::new(1)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Period::Daily => "Daily",
            Period::Monthly => "Monthly",
        }
    }
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// One row of the resampled table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResampledBucket {
    pub bucket_start: NaiveDate,
    /// `None` when no rows fell in the bucket.
    pub mean_demand: Option<f64>,
    pub component1: Option<f64>,
    pub component2: Option<f64>,
    pub count: usize,
}

impl ResampledBucket {
    fn from_sum(bucket_start: NaiveDate, sum: f64, count: usize) -> Self {
        let mean_demand = (count > 0).then(|| sum / count as f64);
        Self {
            bucket_start,
            mean_demand,
            component1: mean_demand.map(|m| m * COMPONENT1_SHARE),
            component2: mean_demand.map(|m| m * COMPONENT2_SHARE),
            count,
        }
    }
}

/// Handles filtering and resampling of demand tables.
pub struct DataProcessor;

impl DataProcessor {
    /// Rows whose calendar date lies in `[start, end]`, in input order.
    /// `start > end` gives an empty table.
    pub fn filter_by_date(table: &DemandTable, start: NaiveDate, end: NaiveDate) -> DemandTable {
        let range = DateRange::new(start, end);
        let records = table
            .records()
            .iter()
            .filter(|r| range.contains(r.date()))
            .copied()
            .collect();
        table.derive(records)
    }

    /// Mean demand per bucket, one row per bucket present in the input,
    /// ascending by bucket start.
    pub fn resample(table: &DemandTable, period: Period) -> Vec<ResampledBucket> {
        Self::bucket_sums(table, period)
            .into_iter()
            .map(|(start, (sum, count))| ResampledBucket::from_sum(start, sum, count))
            .collect()
    }

    /// Like [`resample`](Self::resample), but also emits an empty bucket
    /// (`mean_demand == None`) for every calendar day/month between the first
    /// and last bucket that has no rows.
    pub fn resample_calendar(table: &DemandTable, period: Period) -> Vec<ResampledBucket> {
        let dense = Self::resample(table, period);
        let (Some(first), Some(last)) = (dense.first(), dense.last()) else {
            return Vec::new();
        };
        let (first, last) = (first.bucket_start, last.bucket_start);

        let mut present = dense.into_iter().peekable();
        let mut buckets = Vec::new();
        let mut cursor = Some(first);
        while let Some(start) = cursor.filter(|s| *s <= last) {
            match present.next_if(|b| b.bucket_start == start) {
                Some(bucket) => buckets.push(bucket),
                None => buckets.push(ResampledBucket::from_sum(start, 0.0, 0)),
            }
            cursor = period.next_bucket(start);
        }
        buckets
    }

    fn bucket_sums(table: &DemandTable, period: Period) -> BTreeMap<NaiveDate, (f64, usize)> {
        let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for rec in table.records() {
            let entry = sums.entry(period.bucket_start(rec.date())).or_default();
            entry.0 += rec.demand;
            entry.1 += 1;
        }
        sums
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::tests::single;
    use crate::data::table::{DemandRecord, Schema};

    const EPS: f64 = 1e-9;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table(records: Vec<DemandRecord>) -> DemandTable {
        DemandTable::new(Schema::SingleDelta, records).unwrap()
    }

    fn sample() -> DemandTable {
        table(vec![
            single("2024-01-03T08:00", 300.0, 3.0),
            single("2024-01-01T00:00", 100.0, 1.0),
            single("2024-01-02T23:59", 250.0, 2.5),
            single("2024-02-15T12:00", 400.0, 4.0),
            single("2024-01-01T12:00", 200.0, 2.0),
        ])
    }

    #[test]
    fn filter_is_inclusive_and_keeps_order() {
        let t = sample();
        let out = DataProcessor::filter_by_date(&t, date(2024, 1, 1), date(2024, 1, 2));
        let demands: Vec<f64> = out.records().iter().map(|r| r.demand).collect();
        assert_eq!(demands, vec![100.0, 250.0, 200.0]);
        assert_eq!(out.schema(), Schema::SingleDelta);
    }

    #[test]
    fn filter_matches_predicate_exactly() {
        let t = sample();
        let (s, e) = (date(2024, 1, 2), date(2024, 2, 15));
        let out = DataProcessor::filter_by_date(&t, s, e);
        let expected: Vec<_> = t
            .records()
            .iter()
            .filter(|r| r.date() >= s && r.date() <= e)
            .copied()
            .collect();
        assert_eq!(out.records(), expected.as_slice());
        assert!(out.records().iter().all(|r| r.date() >= s && r.date() <= e));
    }

    #[test]
    fn filter_with_reversed_range_is_empty() {
        let out = DataProcessor::filter_by_date(&sample(), date(2024, 1, 2), date(2024, 1, 1));
        assert!(out.is_empty());
        assert_eq!(out.schema(), Schema::SingleDelta);
    }

    #[test]
    fn daily_scenario_two_rows_one_bucket() {
        let t = table(vec![
            single("2024-01-01T00:00", 100.0, 10.0),
            single("2024-01-01T12:00", 200.0, 20.0),
        ]);
        let buckets = DataProcessor::resample(&t, Period::Daily);
        assert_eq!(buckets.len(), 1);
        let b = buckets[0];
        assert_eq!(b.bucket_start, date(2024, 1, 1));
        assert!((b.mean_demand.unwrap() - 150.0).abs() < EPS);
        assert!((b.component1.unwrap() - 90.0).abs() < EPS);
        assert!((b.component2.unwrap() - 60.0).abs() < EPS);
        assert_eq!(b.count, 2);
    }

    #[test]
    fn daily_buckets_are_sorted_and_weighted_mean_matches() {
        let t = sample();
        let buckets = DataProcessor::resample(&t, Period::Daily);
        let starts: Vec<NaiveDate> = buckets.iter().map(|b| b.bucket_start).collect();
        assert_eq!(
            starts,
            vec![date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3), date(2024, 2, 15)]
        );

        let total: usize = buckets.iter().map(|b| b.count).sum();
        let weighted: f64 = buckets
            .iter()
            .map(|b| b.mean_demand.unwrap() * b.count as f64)
            .sum::<f64>()
            / total as f64;
        let overall = t.records().iter().map(|r| r.demand).sum::<f64>() / t.len() as f64;
        assert!((weighted - overall).abs() < EPS);
    }

    #[test]
    fn components_split_sixty_forty() {
        for b in DataProcessor::resample(&sample(), Period::Monthly) {
            let (m, c1, c2) = (
                b.mean_demand.unwrap(),
                b.component1.unwrap(),
                b.component2.unwrap(),
            );
            assert!((c1 + c2 - m).abs() < EPS);
            assert!((c1 / c2 - 1.5).abs() < EPS);
        }
    }

    #[test]
    fn monthly_buckets_start_on_first() {
        let buckets = DataProcessor::resample(&sample(), Period::Monthly);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].bucket_start, date(2024, 1, 1));
        assert!((buckets[0].mean_demand.unwrap() - 212.5).abs() < EPS);
        assert_eq!(buckets[1].bucket_start, date(2024, 2, 1));
    }

    #[test]
    fn empty_table_resamples_to_nothing() {
        let t = DemandTable::empty(Schema::Banded);
        assert!(DataProcessor::resample(&t, Period::Daily).is_empty());
        assert!(DataProcessor::resample_calendar(&t, Period::Monthly).is_empty());
    }

    #[test]
    fn calendar_resample_fills_gaps_with_none() {
        let t = table(vec![
            single("2024-01-30T00:00", 10.0, 0.0),
            single("2024-02-02T00:00", 20.0, 0.0),
        ]);
        let buckets = DataProcessor::resample_calendar(&t, Period::Daily);
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[1].bucket_start, date(2024, 1, 31));
        assert_eq!(buckets[1].mean_demand, None);
        assert_eq!(buckets[1].component1, None);
        assert_eq!(buckets[2].count, 0);

        let dense: Vec<_> = buckets.iter().filter(|b| b.count > 0).copied().collect();
        assert_eq!(dense, DataProcessor::resample(&t, Period::Daily));
    }

    #[test]
    fn calendar_resample_steps_months() {
        let t = table(vec![
            single("2023-11-15T00:00", 10.0, 0.0),
            single("2024-02-02T00:00", 20.0, 0.0),
        ]);
        let starts: Vec<NaiveDate> = DataProcessor::resample_calendar(&t, Period::Monthly)
            .iter()
            .map(|b| b.bucket_start)
            .collect();
        assert_eq!(
            starts,
            vec![date(2023, 11, 1), date(2023, 12, 1), date(2024, 1, 1), date(2024, 2, 1)]
        );
    }
}
