//! Chart Plotter Module
//! Interactive line and stacked bar charts using egui_plot.

use crate::data::{DemandRecord, DemandTable, DsrDelta, Period, ResampledBucket};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use egui::Color32;
use egui_plot::{Bar, BarChart, Legend, Line, LineStyle, Plot, PlotPoints};

/// Demand series colour (#005EA5).
pub const DEMAND_COLOR: Color32 = Color32::from_rgb(0, 94, 165);
/// EV underlying demand colour (#007F3B).
pub const UNDERLYING_COLOR: Color32 = Color32::from_rgb(0, 127, 59);
pub const BAND_COLOR: Color32 = Color32::from_rgb(120, 180, 140);

pub const COMPONENT1_COLOR: Color32 = UNDERLYING_COLOR;
pub const COMPONENT2_COLOR: Color32 = DEMAND_COLOR;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Plot coordinates for the timeseries chart. X values are days since the
/// Unix epoch, so whole numbers fall on midnight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineSeries {
    pub demand: Vec<[f64; 2]>,
    pub underlying: Vec<[f64; 2]>,
    /// Lower/upper edges of the underlying demand (banded tables only).
    pub band: Option<(Vec<[f64; 2]>, Vec<[f64; 2]>)>,
}

/// One stacked bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackedBar {
    /// Position of the bucket in the resampled sequence.
    pub index: usize,
    pub mean: f64,
    pub component1: f64,
    pub component2: f64,
}

/// Stacked bars, one per bucket that has a value; labels for every bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarSeries {
    pub bars: Vec<StackedBar>,
    pub labels: Vec<String>,
}

pub fn to_plot_x(ts: NaiveDateTime) -> f64 {
    ts.and_utc().timestamp() as f64 / SECONDS_PER_DAY
}

pub fn from_plot_x(x: f64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp((x * SECONDS_PER_DAY).round() as i64, 0).map(|dt| dt.naive_utc())
}

pub fn bucket_label(start: NaiveDate, period: Period) -> String {
    match period {
        Period::Daily => start.format("%Y-%m-%d").to_string(),
        Period::Monthly => start.format("%b %Y").to_string(),
    }
}

/// Creates the dashboard charts.
pub struct ChartPlotter;

impl ChartPlotter {
    pub fn line_series(table: &DemandTable) -> LineSeries {
        let mut series = LineSeries::default();
        let mut lower = Vec::new();
        let mut upper = Vec::new();

        for rec in table.records() {
            let x = to_plot_x(rec.timestamp);
            series.demand.push([x, rec.demand]);
            series.underlying.push([x, rec.underlying_demand()]);
            if let Some((lo, hi)) = Self::band_edges(rec) {
                lower.push([x, lo]);
                upper.push([x, hi]);
            }
        }

        if !lower.is_empty() {
            series.band = Some((lower, upper));
        }
        series
    }

    /// Underlying demand under the upper and lower EV deltas. The larger
    /// delta removes more demand, so it gives the lower edge.
    fn band_edges(rec: &DemandRecord) -> Option<(f64, f64)> {
        match rec.dsr {
            DsrDelta::Banded { lower, upper, .. } => {
                Some((rec.demand - upper, rec.demand - lower))
            }
            DsrDelta::Single { .. } => None,
        }
    }

    pub fn bar_series(buckets: &[ResampledBucket], period: Period) -> BarSeries {
        BarSeries {
            bars: buckets
                .iter()
                .enumerate()
                .filter_map(|(index, b)| {
                    Some(StackedBar {
                        index,
                        mean: b.mean_demand?,
                        component1: b.component1?,
                        component2: b.component2?,
                    })
                })
                .collect(),
            labels: buckets
                .iter()
                .map(|b| bucket_label(b.bucket_start, period))
                .collect(),
        }
    }

    /// Timeseries chart: demand and EV underlying demand.
    pub fn draw_line_chart(ui: &mut egui::Ui, table: &DemandTable, height: f32) {
        let series = Self::line_series(table);

        Plot::new("timeseries")
            .height(height)
            .legend(Legend::default())
            .x_axis_label("Datetime")
            .y_axis_label("Demand (MW)")
            .x_axis_formatter(|mark, _range| {
                from_plot_x(mark.value)
                    .map(|ts| ts.format("%Y-%m-%d").to_string())
                    .unwrap_or_default()
            })
            .label_formatter(|name, value| {
                let when = from_plot_x(value.x)
                    .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                if name.is_empty() {
                    format!("{when}\n{:.1} MW", value.y)
                } else {
                    format!("{name}\n{when}\n{:.1} MW", value.y)
                }
            })
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(PlotPoints::from(series.demand))
                        .name("Demand (MW)")
                        .color(DEMAND_COLOR),
                );
                plot_ui.line(
                    Line::new(PlotPoints::from(series.underlying))
                        .name("EV Underlying Demand")
                        .color(UNDERLYING_COLOR)
                        .width(2.0),
                );
                if let Some((lower, upper)) = series.band {
                    for edge in [lower, upper] {
                        plot_ui.line(
                            Line::new(PlotPoints::from(edge))
                                .name("EV Uncertainty Band")
                                .color(BAND_COLOR)
                                .style(LineStyle::dashed_dense()),
                        );
                    }
                }
            });
    }

    /// Stacked bar chart of the two fixed demand components per bucket.
    pub fn draw_bar_chart(
        ui: &mut egui::Ui,
        buckets: &[ResampledBucket],
        period: Period,
        height: f32,
    ) {
        let series = Self::bar_series(buckets, period);
        let labels = series.labels.clone();

        let bottom: Vec<Bar> = series
            .bars
            .iter()
            .map(|b| Bar::new(b.index as f64, b.component1).width(0.8))
            .collect();
        let top: Vec<Bar> = series
            .bars
            .iter()
            .map(|b| Bar::new(b.index as f64, b.component2).width(0.8))
            .collect();

        let component1 = BarChart::new(bottom)
            .name("Component 1")
            .color(COMPONENT1_COLOR);
        let component2 = BarChart::new(top)
            .name("Component 2")
            .color(COMPONENT2_COLOR)
            .stack_on(&[&component1]);

        Plot::new(format!("bars_{}", period.label()))
            .height(height)
            .legend(Legend::default())
            .allow_scroll(false)
            .x_axis_label("Date")
            .y_axis_label("Average Demand (MW)")
            .x_axis_formatter(move |mark, _range| {
                let idx = mark.value.round();
                if (mark.value - idx).abs() > f64::EPSILON || idx < 0.0 {
                    return String::new();
                }
                labels.get(idx as usize).cloned().unwrap_or_default()
            })
            .show(ui, |plot_ui| {
                plot_ui.bar_chart(component1);
                plot_ui.bar_chart(component2);
            });
    }
}
