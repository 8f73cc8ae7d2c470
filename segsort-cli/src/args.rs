//! Command-line argument definitions for segsort.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use segsort_utils::config::ResizeQuality;

/// Segment each image in a directory and sort it into valid/invalid by operator decision.
///
/// Files are shown one at a time in name order. Type `v` to accept or `i` to reject the
/// current file; `retry`, `skip`, `help` and `quit` are also understood.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct TriageArgs {
    /// Directory holding the images to triage (defaults to settings file).
    #[arg(short, long)]
    pub input_dir: Option<PathBuf>,

    /// Directory receiving the valid/, invalid/ and original/ folders (defaults to settings file).
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Path to the segmentation ONNX model (defaults to settings file).
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Optional settings JSON. Defaults to `config/segsort.json` when present, otherwise built-in parameters.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the foreground probability threshold (strictly greater is kept).
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Override inference input width (pixels).
    #[arg(long)]
    pub width: Option<u32>,

    /// Override inference input height (pixels).
    #[arg(long)]
    pub height: Option<u32>,

    /// Override the display mask size, as `WIDTHxHEIGHT` or a single value for a square.
    #[arg(long, value_name = "SIZE")]
    pub display_size: Option<String>,

    /// Resize filter used before inference (`quality` or `speed`).
    #[arg(long)]
    pub resize_quality: Option<ResizeQuality>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,

    /// Write `mask.png` and `thumbnail.png` for the current file into this directory.
    #[arg(long)]
    pub preview_dir: Option<PathBuf>,
}
