//! Static Chart Renderer
//! Writes the dashboard charts to a PNG with plotters.
//!
//! Layout (top to bottom):
//! 1. Timeseries: demand + EV underlying demand (+ band when banded)
//! 2. Stacked bars: Component 1 / Component 2 per bucket

use crate::charts::plotter::{bucket_label, from_plot_x, ChartPlotter};
use crate::gui::Flexibility;
use crate::pipeline::PipelineOutput;
use plotters::prelude::*;
use std::path::Path;
use thiserror::Error;

const DEMAND: RGBColor = RGBColor(0, 94, 165);
const UNDERLYING: RGBColor = RGBColor(0, 127, 59);
const BAND: RGBColor = RGBColor(120, 180, 140);
const FONT: &str = "sans-serif";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No data to export")]
    NothingToExport,
    #[error("Failed to draw chart: {0}")]
    Draw(String),
}

fn draw_err<E: std::fmt::Display>(err: E) -> ExportError {
    ExportError::Draw(err.to_string())
}

/// Pad a value range so flat series still get a visible axis.
fn padded_range(values: impl Iterator<Item = f64>, include_zero: bool) -> Option<(f64, f64)> {
    let (mut lo, mut hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return None;
    }
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    let pad = ((hi - lo) * 0.05).max(1.0);
    Some((lo - pad, hi + pad))
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    pub fn render_png(
        output: &PipelineOutput,
        flexibility: Flexibility,
        path: &Path,
        width: u32,
        height: u32,
    ) -> Result<(), ExportError> {
        if !output.has_data() {
            return Err(ExportError::NothingToExport);
        }

        let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        let (top, bottom) = root.split_vertically((height / 2) as i32);

        Self::draw_timeseries(&top, output, flexibility)?;
        Self::draw_bars(&bottom, output)?;

        root.present().map_err(draw_err)?;
        tracing::info!(path = %path.display(), width, height, "exported dashboard PNG");
        Ok(())
    }

    fn draw_timeseries<DB: DrawingBackend>(
        area: &DrawingArea<DB, plotters::coord::Shift>,
        output: &PipelineOutput,
        flexibility: Flexibility,
    ) -> Result<(), ExportError> {
        let series = ChartPlotter::line_series(&output.filtered);

        let xs = series.demand.iter().map(|p| p[0]);
        let (x_min, x_max) = (
            xs.clone().fold(f64::INFINITY, f64::min),
            xs.fold(f64::NEG_INFINITY, f64::max),
        );
        let x_max = if x_max > x_min { x_max } else { x_min + 1.0 };

        let band_values = series
            .band
            .iter()
            .flat_map(|(lo, hi)| lo.iter().chain(hi.iter()).map(|p| p[1]));
        let (y_min, y_max) = padded_range(
            series
                .demand
                .iter()
                .chain(series.underlying.iter())
                .map(|p| p[1])
                .chain(band_values),
            false,
        )
        .ok_or(ExportError::NothingToExport)?;

        let mut chart = ChartBuilder::on(area)
            .caption(
                format!("Timeseries Data Visualization ({})", flexibility.label()),
                (FONT, 22),
            )
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .x_desc("Datetime")
            .y_desc("Demand (MW)")
            .x_labels(8)
            .x_label_formatter(&|x| {
                from_plot_x(*x)
                    .map(|ts| ts.format("%Y-%m-%d").to_string())
                    .unwrap_or_default()
            })
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(LineSeries::new(
                series.demand.iter().map(|p| (p[0], p[1])),
                DEMAND.stroke_width(1),
            ))
            .map_err(draw_err)?
            .label("Demand (MW)")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], DEMAND.stroke_width(2)));

        if let Some((lower, upper)) = &series.band {
            for edge in [lower, upper] {
                chart
                    .draw_series(LineSeries::new(
                        edge.iter().map(|p| (p[0], p[1])),
                        BAND.stroke_width(1),
                    ))
                    .map_err(draw_err)?;
            }
        }

        chart
            .draw_series(LineSeries::new(
                series.underlying.iter().map(|p| (p[0], p[1])),
                UNDERLYING.stroke_width(2),
            ))
            .map_err(draw_err)?
            .label("EV Underlying Demand")
            .legend(|(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], UNDERLYING.stroke_width(2))
            });

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(draw_err)?;

        Ok(())
    }

    fn draw_bars<DB: DrawingBackend>(
        area: &DrawingArea<DB, plotters::coord::Shift>,
        output: &PipelineOutput,
    ) -> Result<(), ExportError> {
        let period = output.params.period;
        let series = ChartPlotter::bar_series(&output.buckets, period);
        let n = series.labels.len().max(1);

        let (_, y_max) = padded_range(series.bars.iter().map(|b| b.mean), true)
            .ok_or(ExportError::NothingToExport)?;
        let y_min = series
            .bars
            .iter()
            .map(|b| b.component1.min(b.mean))
            .fold(0.0, f64::min);

        let mut chart = ChartBuilder::on(area)
            .caption(format!("{} Average Demand", period.label()), (FONT, 22))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(-0.5..(n as f64 - 0.5), y_min..y_max)
            .map_err(draw_err)?;

        let buckets = &output.buckets;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc("Date")
            .y_desc("Average Demand (MW)")
            .x_labels(n.min(12))
            .x_label_formatter(&|x| {
                let idx = x.round();
                if idx < 0.0 || (x - idx).abs() > 1e-6 {
                    return String::new();
                }
                buckets
                    .get(idx as usize)
                    .map(|b| bucket_label(b.bucket_start, period))
                    .unwrap_or_default()
            })
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(series.bars.iter().map(|b| {
                let x = b.index as f64;
                Rectangle::new([(x - 0.4, 0.0), (x + 0.4, b.component1)], UNDERLYING.filled())
            }))
            .map_err(draw_err)?
            .label("Component 1")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], UNDERLYING.filled()));

        chart
            .draw_series(series.bars.iter().map(|b| {
                let x = b.index as f64;
                Rectangle::new([(x - 0.4, b.component1), (x + 0.4, b.mean)], DEMAND.filled())
            }))
            .map_err(draw_err)?
            .label("Component 2")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], DEMAND.filled()));

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(draw_err)?;

        Ok(())
    }
}
