use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use m021_hw::{Camera, CaptureSource};
use tracing_subscriber::EnvFilter;

#[cfg(test)]
mod build_rev;
mod capture_loop;
mod config;
mod display;
mod options;

use config::Config;
use display::Window;
use options::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        list_devices();
        return Ok(());
    }

    let capture = match cli.resolve() {
        Ok(capture) => capture,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };
    options::echo(&capture, cli.correction_supplied(), &mut std::io::stdout().lock())?;

    let settings = Config::from_env();

    let mut camera = Camera::open(&capture)
        .with_context(|| format!("failed to open camera {}", capture.device_path()))?;
    tracing::info!(
        device = %camera.device_path,
        width = camera.width,
        height = camera.height,
        format = ?camera.pixel_format(),
        "camera ready"
    );

    let mut window = Window::open(
        &settings.window_title,
        capture.width(),
        capture.height(),
        settings.scale,
    )
    .context("failed to open display window")?;

    let summary = capture_loop::run(&mut camera, &mut window);
    camera.close();

    let summary = summary.context("capture loop aborted")?;
    println!("{summary}");

    Ok(())
}

fn list_devices() {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
        return;
    }
    for dev in devices {
        println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
    }
}
