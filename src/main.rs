use std::convert::Infallible;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use overgrid::session::{declared_type_for_path, Session};
use overgrid::{
    clamp_int, clamp_opacity, RenderParams, Rgb, MAX_COLS, MAX_ROWS, MAX_THICKNESS, MIN_COLS,
    MIN_ROWS, MIN_THICKNESS,
};

// Numeric control flags are sanitized like the on-screen controls: clamped
// to their range, with non-numeric input falling back to the minimum.
fn rows_flag(value: &str) -> Result<u32, Infallible> {
    Ok(clamp_int(value.parse().ok(), MIN_ROWS, MAX_ROWS))
}

fn cols_flag(value: &str) -> Result<u32, Infallible> {
    Ok(clamp_int(value.parse().ok(), MIN_COLS, MAX_COLS))
}

fn thickness_flag(value: &str) -> Result<u32, Infallible> {
    Ok(clamp_int(value.parse().ok(), MIN_THICKNESS, MAX_THICKNESS))
}

fn opacity_flag(value: &str) -> Result<f32, Infallible> {
    Ok(clamp_opacity(value.parse().ok()))
}

/// Overlay a configurable grid on an image and export it as a PNG.
#[derive(Parser, Debug)]
#[command(name = "overgrid", version)]
struct Cli {
    /// Input image file
    input: PathBuf,

    /// Number of grid rows
    #[arg(long, default_value_t = 3, value_parser = rows_flag)]
    rows: u32,

    /// Number of grid columns
    #[arg(long, default_value_t = 3, value_parser = cols_flag)]
    cols: u32,

    /// Line thickness in pixels
    #[arg(long, default_value_t = 2, value_parser = thickness_flag)]
    thickness: u32,

    /// Grid color as a #RRGGBB hex string
    #[arg(long, default_value = "#ffffff")]
    color: Rgb,

    /// Grid line opacity
    #[arg(long, default_value_t = 0.7, value_parser = opacity_flag)]
    opacity: f32,

    /// Number the cells in row-major order
    #[arg(long)]
    numbers: bool,

    /// Output path (defaults to "{base}-grid.png" in the current directory)
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    // Flag values arrive pre-clamped by the value parsers above.
    let params = RenderParams {
        rows: cli.rows,
        cols: cli.cols,
        thickness: cli.thickness,
        color: cli.color,
        opacity: cli.opacity,
        show_numbers: cli.numbers,
    };

    let bytes = fs::read(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let file_name = cli
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image")
        .to_string();

    let mut session = Session::new();
    session.set_params(params);
    session.load(&file_name, declared_type_for_path(&cli.input), &bytes);

    match session.export()? {
        Some(export) => {
            let path = cli
                .output
                .unwrap_or_else(|| PathBuf::from(&export.file_name));
            fs::write(&path, &export.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if let Some(size) = session.dimensions_label() {
                info!(
                    file = %file_name,
                    size = %size,
                    opacity = %session.params().opacity_label(),
                    output = %path.display(),
                    "exported grid overlay"
                );
            }
        }
        None => warn!(file = %file_name, "no image loaded, nothing to export"),
    }

    Ok(())
}
