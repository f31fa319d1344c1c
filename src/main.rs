#![allow(clippy::too_many_arguments)]

mod app;

use app::LayerPaintApp;
use eframe::egui;
use layerpaint::settings::AppSettings;
use layerpaint::{cli, logger};

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let settings = AppSettings::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_title("LayerPaint"),
        ..Default::default()
    };

    eframe::run_native(
        "LayerPaint",
        options,
        Box::new(move |cc| Box::new(LayerPaintApp::new(cc, settings))),
    )
}
