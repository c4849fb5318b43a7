//! Daemon configuration.
//!
//! Configuration is assembled once at startup: built-in defaults, then an
//! optional JSON config file named by `SKYWATCH_CONFIG`, then CLI/env
//! overrides. The resulting `WatchConfig` is immutable for the process
//! lifetime.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::error::WatchError;

const DEFAULT_MODEL_PATH: &str = "models/ssd-mobilenet.onnx";
const DEFAULT_LABELS_PATH: &str = "models/labels.txt";
const DEFAULT_CAMERA_URI: &str = "/dev/video0";
const DEFAULT_THRESHOLD: f32 = 0.8;
const DEFAULT_INPUT_BLOB: &str = "input_0";
const DEFAULT_OUTPUT_CVG: &str = "scores";
const DEFAULT_OUTPUT_BBOX: &str = "boxes";
const DEFAULT_MODEL_INPUT_WIDTH: u32 = 300;
const DEFAULT_MODEL_INPUT_HEIGHT: u32 = 300;
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct WatchConfigFile {
    model: Option<ModelConfigFile>,
    camera: Option<CameraConfigFile>,
    threshold: Option<f32>,
    backend: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    labels: Option<PathBuf>,
    input_blob: Option<String>,
    output_cvg: Option<String>,
    output_bbox: Option<String>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    uri: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Detector backend selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// ONNX inference via tract (feature `backend-tract`).
    Tract,
    /// Deterministic stub backend (tests, hardware-free runs).
    Stub,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Tract => "tract",
            BackendKind::Stub => "stub",
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tract" => Ok(BackendKind::Tract),
            "stub" => Ok(BackendKind::Stub),
            other => Err(anyhow!("unknown backend '{}' (expected tract|stub)", other)),
        }
    }
}

/// Model and label table settings.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub path: PathBuf,
    pub labels_path: PathBuf,
    /// Name of the input tensor in the model graph.
    pub input_blob: String,
    /// Name of the coverage/scores output tensor.
    pub output_cvg: String,
    /// Name of the bounding-box output tensor.
    pub output_bbox: String,
    pub input_width: u32,
    pub input_height: u32,
}

/// Camera settings.
#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Device path or stream URI (e.g. "/dev/video0", "stub://camera").
    pub uri: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl CameraSettings {
    /// Per-capture blocking bound: four frame intervals at the target
    /// rate, never below 500ms. A capture that exceeds this yields a
    /// transient timeout instead of blocking the loop indefinitely.
    pub fn frame_timeout(&self) -> Duration {
        let base_ms = if self.target_fps == 0 {
            500
        } else {
            (1000 / self.target_fps).saturating_mul(4)
        };
        Duration::from_millis(u64::from(base_ms.max(500)))
    }
}

/// Immutable daemon configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub model: ModelSettings,
    pub camera: CameraSettings,
    /// Minimum confidence for a detection to be reported.
    pub threshold: f32,
    pub backend: BackendKind,
}

/// CLI/env values that override file and default settings.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub model: Option<PathBuf>,
    pub labels: Option<PathBuf>,
    pub camera: Option<String>,
    pub threshold: Option<f32>,
    pub input_blob: Option<String>,
    pub output_cvg: Option<String>,
    pub output_bbox: Option<String>,
    pub backend: Option<String>,
}

impl WatchConfig {
    /// Load configuration: defaults, then `SKYWATCH_CONFIG` file (if set),
    /// then overrides, then validation.
    pub fn load(overrides: ConfigOverrides) -> Result<Self, WatchError> {
        let config_path = std::env::var("SKYWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => {
                read_config_file(Path::new(path)).map_err(|e| WatchError::Config(e.to_string()))?
            }
            None => WatchConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg).map_err(|e| WatchError::Config(e.to_string()))?;
        cfg.apply_overrides(overrides)
            .map_err(|e| WatchError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatchConfigFile) -> Result<Self> {
        let model_file = file.model.unwrap_or_default();
        let camera_file = file.camera.unwrap_or_default();
        let model = ModelSettings {
            path: model_file
                .path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            labels_path: model_file
                .labels
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_PATH)),
            input_blob: model_file
                .input_blob
                .unwrap_or_else(|| DEFAULT_INPUT_BLOB.to_string()),
            output_cvg: model_file
                .output_cvg
                .unwrap_or_else(|| DEFAULT_OUTPUT_CVG.to_string()),
            output_bbox: model_file
                .output_bbox
                .unwrap_or_else(|| DEFAULT_OUTPUT_BBOX.to_string()),
            input_width: model_file.input_width.unwrap_or(DEFAULT_MODEL_INPUT_WIDTH),
            input_height: model_file
                .input_height
                .unwrap_or(DEFAULT_MODEL_INPUT_HEIGHT),
        };
        let camera = CameraSettings {
            uri: camera_file
                .uri
                .unwrap_or_else(|| DEFAULT_CAMERA_URI.to_string()),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };
        let backend = match file.backend {
            Some(name) => name.parse()?,
            None => BackendKind::Tract,
        };
        Ok(Self {
            model,
            camera,
            threshold: file.threshold.unwrap_or(DEFAULT_THRESHOLD),
            backend,
        })
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(path) = overrides.model {
            self.model.path = path;
        }
        if let Some(path) = overrides.labels {
            self.model.labels_path = path;
        }
        if let Some(uri) = overrides.camera {
            if !uri.trim().is_empty() {
                self.camera.uri = uri;
            }
        }
        if let Some(threshold) = overrides.threshold {
            self.threshold = threshold;
        }
        if let Some(name) = overrides.input_blob {
            self.model.input_blob = name;
        }
        if let Some(name) = overrides.output_cvg {
            self.model.output_cvg = name;
        }
        if let Some(name) = overrides.output_bbox {
            self.model.output_bbox = name;
        }
        if let Some(name) = overrides.backend {
            self.backend = name.parse()?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), WatchError> {
        if !(0.0..=1.0).contains(&self.threshold) || !self.threshold.is_finite() {
            return Err(WatchError::Config(format!(
                "threshold must be in [0.0, 1.0], got {}",
                self.threshold
            )));
        }
        if self.camera.uri.trim().is_empty() {
            return Err(WatchError::Config("camera uri must not be empty".into()));
        }
        if self.camera.target_fps == 0 {
            return Err(WatchError::Config("camera target_fps must be > 0".into()));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(WatchError::Config(
                "camera dimensions must be > 0".into(),
            ));
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(WatchError::Config(
                "model input dimensions must be > 0".into(),
            ));
        }
        if self.model.input_blob.trim().is_empty()
            || self.model.output_cvg.trim().is_empty()
            || self.model.output_bbox.trim().is_empty()
        {
            return Err(WatchError::Config("blob names must not be empty".into()));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<WatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
