pub mod config;
pub mod deadline;
pub mod debug;
mod region;
pub mod runner;
pub mod schedule;

pub use config::{PipelineConfig, PublisherMode, RecognizerBackend, init_config, load_config};
pub use deadline::Deadline;
pub use debug::DebugArtifacts;
pub use runner::{CycleReport, Pipeline, strategy_for};
pub use schedule::Schedule;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::ocr::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::ocr::{HttpRecognizer, Recognizer, TesseractRecognizer};
use crate::publish::{HttpPublisher, Publisher, StateStore, StorePublisher};
use config::{PublisherConfig, RecognizerConfig};

/// Builds the recognition backend named in the config.
pub fn build_recognizer(config: &RecognizerConfig) -> Result<Box<dyn Recognizer>> {
    match config.backend {
        RecognizerBackend::Tesseract => {
            let exe = find_tesseract_executable(config.tesseract_path.as_deref())?;
            let tessdata = find_tessdata_dir(config.tessdata_dir.as_deref());
            log::info!(
                "Using Tesseract at {} (tessdata: {})",
                exe.display(),
                tessdata
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "default".to_string())
            );
            Ok(Box::new(TesseractRecognizer::new(exe, tessdata, &config.language)))
        }
        RecognizerBackend::Http => {
            let public_dir = config
                .public_dir
                .clone()
                .unwrap_or_else(crate::paths::get_public_dir);
            log::info!(
                "Using OCR service at {} (inputs under {})",
                config.service_url,
                public_dir.display()
            );
            let recognizer = HttpRecognizer::new(
                &config.service_url,
                public_dir,
                Duration::from_millis(config.timeout_ms),
            )?;
            Ok(Box::new(recognizer))
        }
    }
}

/// Builds the publisher named in the config. The local store is returned as
/// well when one backs the publisher, so callers can subscribe to it.
pub fn build_publisher(config: &PublisherConfig) -> Result<(Box<dyn Publisher>, Option<Arc<StateStore>>)> {
    match config.mode {
        PublisherMode::Store => {
            let path = config
                .results_path
                .clone()
                .unwrap_or_else(crate::paths::get_results_path);
            let store = Arc::new(
                StateStore::open(&path)
                    .with_context(|| format!("Failed to open results store {}", path.display()))?,
            );
            log::info!("Publishing to {}", path.display());
            let publisher = StorePublisher::new(Arc::clone(&store), &config.source);
            Ok((Box::new(publisher), Some(store)))
        }
        PublisherMode::Http => {
            log::info!("Publishing to {}", config.ingest_url);
            let publisher = HttpPublisher::new(
                &config.ingest_url,
                &config.source,
                Duration::from_millis(config.timeout_ms),
            )?;
            Ok((Box::new(publisher), None))
        }
    }
}
