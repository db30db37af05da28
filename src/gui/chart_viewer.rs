//! Chart Viewer Widget
//! Central scrollable panel with the timeseries and average-demand charts.

use crate::charts::ChartPlotter;
use crate::gui::Flexibility;
use crate::pipeline::PipelineOutput;
use egui::{Color32, RichText, ScrollArea};

const LINE_CHART_HEIGHT: f32 = 380.0;
const BAR_CHART_HEIGHT: f32 = 320.0;
const CARD_SPACING: f32 = 15.0;

/// Displays the most recent pipeline output.
#[derive(Default)]
pub struct ChartViewer {
    pub output: Option<PipelineOutput>,
}

impl ChartViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_output(&mut self, output: PipelineOutput) {
        self.output = Some(output);
    }

    pub fn clear(&mut self) {
        self.output = None;
    }

    pub fn show(&self, ui: &mut egui::Ui, flexibility: Flexibility) {
        ui.heading("Dashboard");
        ui.add_space(8.0);

        let Some(output) = self.output.as_ref().filter(|o| o.has_data()) else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No data available in the CSV file.").size(18.0));
            });
            return;
        };

        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                Self::card(ui, "Timeseries Graph", flexibility, |ui| {
                    ChartPlotter::draw_line_chart(ui, &output.filtered, LINE_CHART_HEIGHT);
                });
                ui.add_space(CARD_SPACING);

                let title = format!("{} Average Demand", output.params.period.label());
                Self::card(ui, &title, flexibility, |ui| {
                    ChartPlotter::draw_bar_chart(
                        ui,
                        &output.buckets,
                        output.params.period,
                        BAR_CHART_HEIGHT,
                    );
                });
            });
    }

    fn card(
        ui: &mut egui::Ui,
        title: &str,
        flexibility: Flexibility,
        add_contents: impl FnOnce(&mut egui::Ui),
    ) {
        egui::Frame::none()
            .rounding(10.0)
            .stroke(egui::Stroke::new(1.0, Color32::from_gray(200)))
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new(title).size(18.0).strong());
                    ui.label(
                        RichText::new(flexibility.label())
                            .size(12.0)
                            .color(Color32::GRAY),
                    );
                });
                ui.add_space(8.0);
                add_contents(ui);
            });
    }
}
