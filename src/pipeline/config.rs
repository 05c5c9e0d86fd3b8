//! Configuration for the pick reader.
//!
//! Loads settings from config.json at startup. Every numeric constant of the
//! pipeline lives here; the defaults are starting values, not calibrated truth.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::schedule::Schedule;
use crate::calibration::{CalibrationConfig, RegionSpec, default_regions};
use crate::ocr::PreprocessConfig;
use crate::segment::{BandConfig, SlicerConfig, SlicingMode};

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<PipelineConfig> = OnceLock::new();

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerBackend {
    #[default]
    Tesseract,
    Http,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub backend: RecognizerBackend,
    /// Explicit tesseract executable; searched for when unset
    pub tesseract_path: Option<PathBuf>,
    pub tessdata_dir: Option<PathBuf>,
    pub language: String,
    /// Base URL of the OCR service for the `http` backend
    pub service_url: String,
    /// Directory the OCR service resolves `?img=` paths against.
    /// Defaults to `<exe_dir>/public`
    pub public_dir: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            backend: RecognizerBackend::Tesseract,
            tesseract_path: None,
            tessdata_dir: None,
            language: "eng".to_string(),
            service_url: "http://localhost:3000".to_string(),
            public_dir: None,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherMode {
    /// Local results document with in-process subscribers
    #[default]
    Store,
    /// Results server ingest endpoint
    Http,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub mode: PublisherMode,
    /// Defaults to `<exe_dir>/data/results.json`
    pub results_path: Option<PathBuf>,
    pub ingest_url: String,
    /// Recorded as `source` on every accepted set
    pub source: String,
    pub timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            mode: PublisherMode::Store,
            results_path: None,
            ingest_url: "http://localhost:3000".to_string(),
            source: "auto".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub calibration: CalibrationConfig,
    pub regions: Vec<RegionSpec>,
    pub preprocess: PreprocessConfig,
    pub bands: BandConfig,
    pub slicer: SlicerConfig,
    pub slicing: SlicingMode,
    /// Row grouping tolerance for box ordering, in preprocessed pixels
    pub row_tolerance_px: f32,
    pub recognizer: RecognizerConfig,
    pub publisher: PublisherConfig,
    pub schedule: Schedule,
    /// Whole-cycle budget; an overrunning cycle publishes nothing
    pub cycle_timeout_ms: u64,
    /// Write preprocessed crops and slices under public/debug-crops/
    pub debug_artifacts: bool,
    /// Defaults to `<exe_dir>/public/capture.png`
    pub capture_path: Option<PathBuf>,
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub log_level: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationConfig::default(),
            regions: default_regions(),
            preprocess: PreprocessConfig::default(),
            bands: BandConfig::default(),
            slicer: SlicerConfig::default(),
            slicing: SlicingMode::Peaks,
            row_tolerance_px: 18.0,
            recognizer: RecognizerConfig::default(),
            publisher: PublisherConfig::default(),
            schedule: Schedule::default(),
            cycle_timeout_ms: 120_000,
            debug_artifacts: false,
            capture_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn log_level(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

/// Default config location: config.json next to the executable.
pub fn default_config_path() -> PathBuf {
    crate::paths::get_exe_dir().join("config.json")
}

/// Loads configuration from `path`, or returns defaults if it is missing or invalid.
pub fn load_config(path: &Path) -> PipelineConfig {
    log::info!("Looking for config at: {}", path.display());

    if !path.exists() {
        log::info!("{} not found. Using default config.", path.display());
        return PipelineConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                log::info!("Config loaded from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                PipelineConfig::default()
            }
        },
        Err(e) => {
            log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
            PipelineConfig::default()
        }
    }
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config(path: &Path) -> &'static PipelineConfig {
    CONFIG.get_or_init(|| load_config(path))
}
