//! EV Dashboard - electricity demand & EV demand-side-response viewer
//!
//! Loads a demand CSV, filters it to a date range, resamples it to daily or
//! monthly averages and shows both as interactive charts.

mod charts;
mod config;
mod data;
mod gui;
mod pipeline;

use anyhow::Context;
use config::DashboardConfig;
use eframe::egui;
use gui::DashboardApp;
use std::path::PathBuf;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = DashboardConfig::resolve(config_path.as_deref())
        .context("failed to load dashboard configuration")?;

    tracing::info!(
        csv = %config.csv_path.display(),
        schema = ?config.schema,
        period = ?config.period,
        "starting EV dashboard"
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_min_inner_size([1000.0, 650.0])
            .with_title("EV Dashboard"),
        ..Default::default()
    };

    eframe::run_native(
        "EV Dashboard",
        options,
        Box::new(|cc| Ok(Box::new(DashboardApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("dashboard window failed: {e}"))
}
