//! Common helpers shared across segsort crates.

/// Application configuration and settings management.
pub mod config;
/// Image loading, resizing, and tensor layout conversion.
pub mod image_utils;
/// In-memory image encoding for write-back.
pub mod output;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::LevelFilter;

pub use image_utils::{area_resize, load_image, resize_image, rgb_to_nhwc, thumbnail};
pub use output::{ImageFormatHint, encode_image};
pub use telemetry::{
    TimingGuard, configure as configure_telemetry, telemetry_allows, telemetry_enabled,
    telemetry_level, timing_guard, timing_guard_if,
};

/// Initialize logging once for the CLI and tests.
///
/// `RUST_LOG` takes precedence when set; otherwise `default_filter` applies.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(telemetry::TELEMETRY_TARGET, LevelFilter::Trace);

    // A second initialization (tests, embedding) is harmless.
    let _ = builder.try_init();
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
