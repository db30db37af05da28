//! Control Panel Widget
//! Left side panel with data source, date range and display controls.

use crate::data::{DateRange, Period, Schema};
use crate::pipeline::PipelineParams;
use chrono::NaiveDate;
use egui::{Color32, RichText};
use egui_extras::DatePickerButton;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Flexibility tag shown next to the charts. Display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flexibility {
    #[default]
    NonFlex,
    Flex,
}

impl Flexibility {
    pub fn label(self) -> &'static str {
        match self {
            Flexibility::NonFlex => "Non-Flex",
            Flexibility::Flex => "Flex",
        }
    }
}

/// Sidebar technology toggles.
///
/// Only `ev` has data behind it; the others are reserved toggles and do not
/// change what is loaded or drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Technologies {
    pub ev: bool,
    pub solar: bool,
    pub wind: bool,
    pub heat_pumps: bool,
}

impl Default for Technologies {
    fn default() -> Self {
        Self {
            ev: true,
            solar: false,
            wind: false,
            heat_pumps: false,
        }
    }
}

impl Technologies {
    pub fn selected(&self) -> Vec<&'static str> {
        [
            (self.ev, "EV"),
            (self.solar, "Solar"),
            (self.wind, "Wind"),
            (self.heat_pumps, "Heat Pumps"),
        ]
        .into_iter()
        .filter_map(|(on, label)| on.then_some(label))
        .collect()
    }
}

/// User settings for one dashboard session
#[derive(Debug, Clone, Default)]
pub struct DashboardSettings {
    pub csv_path: PathBuf,
    pub schema: Schema,
    pub period: Period,
    pub flexibility: Flexibility,
    pub technologies: Technologies,
    /// `None` until the first load reports the table's date bounds.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DashboardSettings {
    pub fn date_range(&self) -> Option<DateRange> {
        Some(DateRange::new(self.start_date?, self.end_date?))
    }

    /// Forget the selected range so the next load resets it to the data bounds.
    pub fn reset_dates(&mut self) {
        self.start_date = None;
        self.end_date = None;
    }

    /// Whether a finished run still describes the selected file and schema.
    /// Runs started before a new file or schema was picked are stale.
    pub fn accepts(&self, params: &PipelineParams) -> bool {
        params.csv_path == self.csv_path && params.schema == self.schema
    }

    /// Default the pickers to the loaded table's first/last date.
    /// Returns true if anything changed.
    pub fn apply_bounds(&mut self, bounds: Option<(NaiveDate, NaiveDate)>) -> bool {
        let Some((lo, hi)) = bounds else {
            return false;
        };
        let mut changed = false;
        if self.start_date.is_none() {
            self.start_date = Some(lo);
            changed = true;
        }
        if self.end_date.is_none() {
            self.end_date = Some(hi);
            changed = true;
        }
        changed
    }
}

/// Left side control panel.
pub struct ControlPanel {
    pub settings: DashboardSettings,
    pub status: String,
    pub busy: bool,
    pub export_enabled: bool,
}

impl ControlPanel {
    pub fn new(settings: DashboardSettings) -> Self {
        Self {
            settings,
            status: "Ready".to_string(),
            busy: false,
            export_enabled: false,
        }
    }

    /// Draw the control panel
    pub fn show(&mut self, ui: &mut egui::Ui) -> ControlPanelAction {
        let mut action = ControlPanelAction::None;

        ui.vertical_centered(|ui| {
            ui.add_space(5.0);
            ui.label(
                RichText::new("⚡ EV Dashboard")
                    .size(22.0)
                    .color(Color32::from_rgb(0, 94, 165)),
            );
        });
        ui.add_space(10.0);
        ui.separator();

        // ===== Options =====
        ui.label(RichText::new("Options").size(14.0).strong());
        ui.add_space(5.0);
        let techs = &mut self.settings.technologies;
        let mut toggled = false;
        toggled |= ui.checkbox(&mut techs.ev, "EV").changed();
        toggled |= ui.checkbox(&mut techs.solar, "Solar").changed();
        toggled |= ui.checkbox(&mut techs.wind, "Wind").changed();
        toggled |= ui.checkbox(&mut techs.heat_pumps, "Heat Pumps").changed();
        if toggled {
            action = ControlPanelAction::DisplayChanged;
        }

        ui.add_space(10.0);
        ui.separator();

        // ===== Data Source =====
        ui.label(RichText::new("📁 Data Source").size(14.0).strong());
        ui.add_space(5.0);

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    let path_text = self
                        .settings
                        .csv_path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| "No file selected".to_string());
                    ui.label(RichText::new(path_text).size(12.0));

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("📂 Browse").clicked() {
                            action = ControlPanelAction::BrowseCsv;
                        }
                    });
                });
            });

        ui.add_space(5.0);
        ui.horizontal(|ui| {
            let mut changed = false;
            for schema in [Schema::SingleDelta, Schema::Banded] {
                changed |= ui
                    .radio_value(&mut self.settings.schema, schema, schema.label())
                    .changed();
            }
            if changed {
                self.settings.reset_dates();
                action = ControlPanelAction::ParametersChanged;
            }
        });

        ui.add_space(10.0);
        ui.separator();

        // ===== Date Range =====
        ui.label(RichText::new("📅 Date Range").size(14.0).strong());
        ui.add_space(5.0);

        if let (Some(mut start), Some(mut end)) = (self.settings.start_date, self.settings.end_date)
        {
            let mut changed = false;
            ui.horizontal(|ui| {
                ui.add_sized([70.0, 20.0], egui::Label::new("Start date"));
                changed |= ui
                    .add(DatePickerButton::new(&mut start).id_salt("start_date"))
                    .changed();
            });
            ui.horizontal(|ui| {
                ui.add_sized([70.0, 20.0], egui::Label::new("End date"));
                changed |= ui
                    .add(DatePickerButton::new(&mut end).id_salt("end_date"))
                    .changed();
            });
            if start > end {
                ui.label(
                    RichText::new("Start date is after end date")
                        .size(11.0)
                        .color(Color32::from_rgb(220, 53, 69)),
                );
            }
            if changed {
                self.settings.start_date = Some(start);
                self.settings.end_date = Some(end);
                action = ControlPanelAction::ParametersChanged;
            }
        } else {
            ui.label(RichText::new("Available once data is loaded").color(Color32::GRAY));
        }

        ui.add_space(10.0);
        ui.separator();

        // ===== Display =====
        ui.label(RichText::new("Select Time Period").size(14.0).strong());
        ui.horizontal(|ui| {
            let mut changed = false;
            for period in [Period::Daily, Period::Monthly] {
                changed |= ui
                    .radio_value(&mut self.settings.period, period, period.label())
                    .changed();
            }
            if changed {
                action = ControlPanelAction::ParametersChanged;
            }
        });

        ui.add_space(5.0);
        ui.label(RichText::new("Flexibility").size(14.0).strong());
        ui.horizontal(|ui| {
            let mut changed = false;
            for flex in [Flexibility::NonFlex, Flexibility::Flex] {
                changed |= ui
                    .radio_value(&mut self.settings.flexibility, flex, flex.label())
                    .changed();
            }
            if changed {
                action = ControlPanelAction::DisplayChanged;
            }
        });

        ui.add_space(15.0);
        ui.separator();

        // ===== Export =====
        ui.vertical_centered(|ui| {
            ui.add_enabled_ui(self.export_enabled, |ui| {
                let button = egui::Button::new(RichText::new("🖼 Export PNG").size(14.0))
                    .min_size(egui::vec2(150.0, 30.0));
                if ui.add(button).clicked() {
                    action = ControlPanelAction::ExportPng;
                }
            });
        });

        ui.add_space(10.0);
        if self.busy {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(RichText::new("Loading...").size(11.0));
            });
        }
        let status_color = if self.status.starts_with("Error") {
            Color32::from_rgb(220, 53, 69)
        } else {
            Color32::GRAY
        };
        ui.label(RichText::new(&self.status).size(11.0).color(status_color));

        action
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }
}

/// Actions triggered by control panel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPanelAction {
    None,
    BrowseCsv,
    /// Something the pipeline depends on changed; re-run it.
    ParametersChanged,
    /// A display-only control changed; nothing to recompute.
    DisplayChanged,
    ExportPng,
}
