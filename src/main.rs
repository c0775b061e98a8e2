#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use clap::Parser;
use color_eyre::eyre::Result;
use eframe::egui;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod config;
mod form;
mod geometry;
mod map_host;
mod map_view;
mod record;
mod session;
mod storage;
mod store;
mod tooltip;

use app::TreeMapApp;
use config::Config;

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treemap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    let storage = config.storage()?;
    tracing::info!(
        lat = config.center_lat,
        lon = config.center_lon,
        zoom = config.zoom,
        "starting"
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("TreeMap"),
        ..Default::default()
    };
    eframe::run_native(
        "TreeMap",
        options,
        Box::new(move |cc| Ok(Box::new(TreeMapApp::new(cc, &config, storage)))),
    )
    .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
    Ok(())
}
