//! EV Dashboard Main Application
//! Main window with control panel and chart viewer.

use crate::charts::StaticChartRenderer;
use crate::config::DashboardConfig;
use crate::data::CachedLoader;
use crate::gui::{ChartViewer, ControlPanel, ControlPanelAction, DashboardSettings};
use crate::pipeline::{self, PipelineOutput, PipelineParams};
use egui::SidePanel;
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

const EXPORT_WIDTH: u32 = 1400;
const EXPORT_HEIGHT: u32 = 1000;

/// Main application window.
pub struct DashboardApp {
    control_panel: ControlPanel,
    chart_viewer: ChartViewer,
    loader: Arc<Mutex<CachedLoader>>,

    // Background pipeline run
    run_rx: Option<Receiver<PipelineOutput>>,
    is_running: bool,
    rerun_requested: bool,
}

impl DashboardApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: DashboardConfig) -> Self {
        let settings = DashboardSettings {
            csv_path: config.csv_path,
            schema: config.schema,
            period: config.period,
            flexibility: config.flexibility,
            ..Default::default()
        };

        let mut app = Self {
            control_panel: ControlPanel::new(settings),
            chart_viewer: ChartViewer::new(),
            loader: Arc::new(Mutex::new(CachedLoader::new())),
            run_rx: None,
            is_running: false,
            rerun_requested: false,
        };
        app.start_run();
        app
    }

    fn params(&self) -> PipelineParams {
        let settings = &self.control_panel.settings;
        PipelineParams {
            csv_path: settings.csv_path.clone(),
            schema: settings.schema,
            date_range: settings.date_range(),
            period: settings.period,
        }
    }

    /// Re-run the pipeline on a worker thread with the current settings.
    fn start_run(&mut self) {
        if self.is_running {
            self.rerun_requested = true;
            return;
        }

        let params = self.params();
        let loader = Arc::clone(&self.loader);
        let (tx, rx) = channel();
        self.run_rx = Some(rx);
        self.is_running = true;
        self.control_panel.busy = true;

        thread::spawn(move || {
            let mut loader = loader.lock().unwrap_or_else(PoisonError::into_inner);
            let output = pipeline::run(&mut loader, &params);
            let _ = tx.send(output);
        });
    }

    /// Check for pipeline results
    fn check_run_results(&mut self) {
        let Some(rx) = self.run_rx.take() else {
            return;
        };

        match rx.try_recv() {
            Ok(output) => {
                self.is_running = false;
                self.control_panel.busy = false;
                self.apply_output(output);
            }
            Err(std::sync::mpsc::TryRecvError::Empty) => {
                self.run_rx = Some(rx);
            }
            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                self.is_running = false;
                self.control_panel.busy = false;
                self.control_panel
                    .set_status("Error: data worker stopped unexpectedly");
            }
        }

        if !self.is_running && self.rerun_requested {
            self.rerun_requested = false;
            self.start_run();
        }
    }

    fn apply_output(&mut self, output: PipelineOutput) {
        if !self.control_panel.settings.accepts(&output.params) {
            // The queued re-run will load the current selection.
            tracing::debug!(
                path = %output.params.csv_path.display(),
                schema = output.params.schema.label(),
                "discarding stale pipeline output"
            );
            return;
        }

        let status = match &output.error {
            Some(err) => format!("Error loading CSV data: {err}"),
            None => format!(
                "Loaded {} rows ({} in range, {} buckets)",
                output.loaded.len(),
                output.filtered.len(),
                output.buckets.len()
            ),
        };
        self.control_panel.set_status(status);
        self.control_panel.export_enabled = output.has_data();

        let bounds = output.loaded.date_bounds();
        let ran_with_range = output.params.date_range.is_some();
        self.chart_viewer.set_output(output);

        // The first load of a file fills in the date pickers; re-run so the
        // charts follow the now explicit range.
        if self.control_panel.settings.apply_bounds(bounds) && !ran_with_range {
            self.rerun_requested = true;
        }
    }

    fn handle_browse_csv(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV Files", &["csv"])
            .pick_file()
        {
            tracing::info!(path = %path.display(), "selected CSV");
            self.control_panel.settings.csv_path = path;
            self.control_panel.settings.reset_dates();
            self.chart_viewer.clear();
            self.start_run();
        }
    }

    fn handle_display_changed(&self) {
        let settings = &self.control_panel.settings;
        // Reserved toggles: logged, never fed to the pipeline.
        tracing::debug!(
            technologies = ?settings.technologies.selected(),
            flexibility = settings.flexibility.label(),
            "display-only controls changed"
        );
    }

    fn handle_export_png(&mut self) {
        let Some(output) = self.chart_viewer.output.as_ref() else {
            self.control_panel.set_status("No charts to export");
            return;
        };

        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG Image", &["png"])
            .set_file_name("ev_dashboard.png")
            .save_file()
        else {
            return;
        };

        let flexibility = self.control_panel.settings.flexibility;
        match StaticChartRenderer::render_png(output, flexibility, &path, EXPORT_WIDTH, EXPORT_HEIGHT)
        {
            Ok(()) => self
                .control_panel
                .set_status(format!("Exported {}", path.display())),
            Err(e) => {
                tracing::warn!(error = %e, "PNG export failed");
                self.control_panel.set_status(format!("Error: {e}"));
            }
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_run_results();

        if self.is_running {
            ctx.request_repaint();
        }

        SidePanel::left("control_panel")
            .min_width(280.0)
            .max_width(330.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    match self.control_panel.show(ui) {
                        ControlPanelAction::BrowseCsv => self.handle_browse_csv(),
                        ControlPanelAction::ParametersChanged => self.start_run(),
                        ControlPanelAction::DisplayChanged => self.handle_display_changed(),
                        ControlPanelAction::ExportPng => self.handle_export_png(),
                        ControlPanelAction::None => {}
                    }
                });
            });

        let flexibility = self.control_panel.settings.flexibility;
        egui::CentralPanel::default().show(ctx, |ui| {
            self.chart_viewer.show(ui, flexibility);
        });
    }
}
