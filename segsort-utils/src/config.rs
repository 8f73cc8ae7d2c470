//! Shared configuration types consumed across the segsort workspace.
//!
//! These structures describe the model, the inference input, mask rendering, the on-disk
//! layout, and telemetry. They serialize to JSON so a settings file can be reused between runs.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Resampling preference for the resize to inference resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeQuality {
    /// Smooth bilinear filtering (default).
    #[default]
    Quality,
    /// Box-filter area averaging.
    Speed,
}

impl fmt::Display for ResizeQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResizeQuality::Quality => "quality",
            ResizeQuality::Speed => "speed",
        })
    }
}

impl FromStr for ResizeQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quality" => Ok(ResizeQuality::Quality),
            "speed" => Ok(ResizeQuality::Speed),
            other => Err(format!(
                "invalid resize quality '{other}'; expected 'quality' or 'speed'"
            )),
        }
    }
}

/// Inference input resolution in pixels (width x height).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputDimensions {
    pub width: u32,
    pub height: u32,
    pub resize_quality: ResizeQuality,
}

impl Default for InputDimensions {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
            resize_quality: ResizeQuality::Quality,
        }
    }
}

/// Optional node names to bind when the graph exposes several inputs or outputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelSettings {
    /// Input node fed with the NHWC tensor. `None` uses the graph's first declared input.
    pub input_node: Option<String>,
    /// Output node holding the background/foreground pairs.
    pub output_node: Option<String>,
}

/// Mask thresholding and display geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaskSettings {
    /// Foreground probabilities strictly above this value are kept.
    pub threshold: f32,
    /// Width of the re-binarized display mask.
    pub display_width: u32,
    /// Height of the re-binarized display mask.
    pub display_height: u32,
    /// Width of the reference thumbnail of the original image.
    pub thumbnail_width: u32,
    /// Height of the reference thumbnail of the original image.
    pub thumbnail_height: u32,
    /// JPEG quality used when writing the processed mask back over a `.jpg` source.
    pub jpeg_quality: u8,
}

impl Default for MaskSettings {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            display_width: 400,
            display_height: 400,
            thumbnail_width: 200,
            thumbnail_height: 200,
            jpeg_quality: 90,
        }
    }
}

impl MaskSettings {
    /// Clamp values to usable ranges.
    pub fn sanitize(&mut self) {
        if !self.threshold.is_finite() {
            self.threshold = 0.5;
        }
        self.display_width = self.display_width.max(1);
        self.display_height = self.display_height.max(1);
        self.thumbnail_width = self.thumbnail_width.max(1);
        self.thumbnail_height = self.thumbnail_height.max(1);
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
    }
}

/// Input directory and outcome directories.
///
/// Outcome directories are resolved against `output_dir` unless they are absolute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathSettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub accepted_dir: PathBuf,
    pub rejected_dir: PathBuf,
    pub originals_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("files/input"),
            output_dir: PathBuf::from("files/output"),
            accepted_dir: PathBuf::from("valid"),
            rejected_dir: PathBuf::from("invalid"),
            originals_dir: PathBuf::from("original"),
        }
    }
}

impl PathSettings {
    pub fn accepted(&self) -> PathBuf {
        self.output_dir.join(&self.accepted_dir)
    }

    pub fn rejected(&self) -> PathBuf {
        self.output_dir.join(&self.rejected_dir)
    }

    pub fn originals(&self) -> PathBuf {
        self.output_dir.join(&self.originals_dir)
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// Persistent application settings consumed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Serialized segmentation graph. `None` falls back to the default location.
    pub model_path: Option<PathBuf>,
    pub model: ModelSettings,
    pub input: InputDimensions,
    pub mask: MaskSettings,
    pub paths: PathSettings,
    pub telemetry: TelemetrySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            model_path: Some(PathBuf::from(DEFAULT_MODEL_PATH)),
            model: ModelSettings::default(),
            input: InputDimensions::default(),
            mask: MaskSettings::default(),
            paths: PathSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

/// Where the segmentation graph is looked up when nothing else is configured.
pub const DEFAULT_MODEL_PATH: &str = "models/segmentation.onnx";

impl AppSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;

        if settings.model_path.is_none() {
            settings.model_path = Some(PathBuf::from(DEFAULT_MODEL_PATH));
        }
        settings.mask.sanitize();

        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, replacing any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    /// The configured model path, or the default one.
    pub fn model_path(&self) -> PathBuf {
        self.model_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH))
    }
}

/// Returns the default settings location (`config/segsort.json` under the working directory).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/segsort.json"))
        .unwrap_or_else(|_| PathBuf::from("config/segsort.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_settings_round_trip() {
        let file = NamedTempFile::new().expect("tempfile");
        let settings = AppSettings::default();
        settings.save_to_path(file.path()).expect("save");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.input, settings.input);
        assert_eq!(loaded.mask, settings.mask);
        assert_eq!(loaded.paths, settings.paths);
        assert_eq!(loaded.model_path, settings.model_path);
        assert_eq!(loaded.telemetry.level, settings.telemetry.level);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = NamedTempFile::new().expect("tempfile");
        let json = r#"{
            "mask": { "threshold": 0.7, "jpeg_quality": 0 },
            "paths": { "input_dir": "shots" }
        }"#;
        fs::write(file.path(), json).expect("write custom settings");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.mask.threshold, 0.7);
        assert_eq!(loaded.mask.jpeg_quality, 1);
        assert_eq!(loaded.mask.display_width, 400);
        assert_eq!(loaded.paths.input_dir, PathBuf::from("shots"));
        assert_eq!(loaded.paths.accepted(), PathBuf::from("files/output/valid"));
        assert_eq!(loaded.input.width, 224);
        assert_eq!(loaded.model_path(), PathBuf::from(DEFAULT_MODEL_PATH));
    }

    #[test]
    fn absolute_outcome_dirs_ignore_output_root() {
        let paths = PathSettings {
            originals_dir: PathBuf::from("/srv/originals"),
            ..PathSettings::default()
        };
        assert_eq!(paths.originals(), PathBuf::from("/srv/originals"));
        assert_eq!(paths.rejected(), PathBuf::from("files/output/invalid"));
    }

    #[test]
    fn resize_quality_parses_case_insensitively() {
        assert_eq!("Speed".parse::<ResizeQuality>(), Ok(ResizeQuality::Speed));
        assert_eq!(" quality ".parse::<ResizeQuality>(), Ok(ResizeQuality::Quality));
        assert!("bicubic".parse::<ResizeQuality>().is_err());
    }

    #[test]
    fn telemetry_level_parses_variants() {
        let telemetry = TelemetrySettings {
            level: "WARNING".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Warn);
        assert_eq!(TelemetrySettings::default().level_filter(), LevelFilter::Debug);
    }
}
