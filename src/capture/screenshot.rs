//! File-backed capture.
//!
//! The browser capture runs out of process and overwrites a PNG on every
//! cycle; this source decodes whatever is there when asked.

use std::path::{Path, PathBuf};

use super::{CaptureSource, RawImage};
use crate::error::PipelineError;

/// Reads the screenshot the capture collaborator last wrote.
#[derive(Clone, Debug)]
pub struct FileCapture {
    path: PathBuf,
}

impl FileCapture {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureSource for FileCapture {
    fn capture(&self) -> Result<RawImage, PipelineError> {
        if !self.path.exists() {
            return Err(PipelineError::CaptureUnavailable(format!(
                "{} not found",
                self.path.display()
            )));
        }

        let img = image::open(&self.path).map_err(|e| {
            PipelineError::CaptureUnavailable(format!(
                "failed to load {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let raw = RawImage::new(img.to_rgba8())?;
        log::debug!(
            "Loaded capture {} ({}x{})",
            self.path.display(),
            raw.width(),
            raw.height()
        );
        Ok(raw)
    }
}
