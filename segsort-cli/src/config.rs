//! Configuration loading and CLI override logic.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use segsort_utils::{
    config::{AppSettings, default_settings_path},
    normalize_path,
};

use crate::args::TriageArgs;

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Apply command-line arguments to override loaded or default settings.
pub fn apply_cli_overrides(settings: &mut AppSettings, args: &TriageArgs) {
    if let Some(dir) = args.input_dir.as_ref() {
        settings.paths.input_dir = dir.clone();
    }
    if let Some(dir) = args.output_dir.as_ref() {
        settings.paths.output_dir = dir.clone();
    }
    if let Some(model) = args.model.as_ref() {
        settings.model_path = Some(model.clone());
    }

    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim();
        if !normalized.is_empty() {
            let lower = normalized.to_ascii_lowercase();
            settings.telemetry.level = lower.clone();
            if lower == "off" {
                settings.telemetry.enabled = false;
            }
        }
    }

    if let Some(width) = args.width {
        settings.input.width = width;
    }
    if let Some(height) = args.height {
        settings.input.height = height;
    }
    if let Some(mode) = args.resize_quality {
        settings.input.resize_quality = mode;
    }

    if let Some(threshold) = args.threshold {
        settings.mask.threshold = threshold;
    }
    if let Some(ref size) = args.display_size {
        match parse_size(size) {
            Ok((width, height)) => {
                settings.mask.display_width = width;
                settings.mask.display_height = height;
            }
            Err(err) => warn!("ignoring --display-size '{size}': {err}"),
        }
    }

    settings.mask.sanitize();
}

/// Parse `WIDTHxHEIGHT` (or a single number for a square).
pub fn parse_size(value: &str) -> Result<(u32, u32)> {
    let value = value.trim().to_ascii_lowercase();
    let (w, h) = match value.split_once('x') {
        Some((w, h)) => (w.trim(), h.trim()),
        None => (value.as_str(), value.as_str()),
    };
    let width: u32 = w.parse().with_context(|| format!("invalid width '{w}'"))?;
    let height: u32 = h.parse().with_context(|| format!("invalid height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err(anyhow!("dimensions must be greater than zero"));
    }
    Ok((width, height))
}
