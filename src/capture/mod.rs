//! Capture collaborator interface.
//!
//! This module provides:
//! - The per-cycle [`RawImage`]
//! - The [`CaptureSource`] seam the pipeline pulls images from
//! - A file-backed source reading the latest screenshot (`FileCapture`)

pub mod screenshot;

pub use screenshot::FileCapture;

use image::{ImageBuffer, Rgba, RgbaImage};

use crate::calibration::PixelRect;
use crate::error::PipelineError;

/// One capture cycle's screenshot. Immutable once captured.
#[derive(Clone, Debug, PartialEq)]
pub struct RawImage {
    image: RgbaImage,
}

impl RawImage {
    /// Wraps a decoded screenshot. Empty images are not a usable capture.
    pub fn new(image: RgbaImage) -> Result<Self, PipelineError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PipelineError::CaptureUnavailable(
                "captured image is empty".to_string(),
            ));
        }
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Materializes the sub-image under `rect`. The rectangle is expected to
    /// come from a region resolver and therefore to lie within bounds.
    pub fn crop(&self, rect: &PixelRect) -> ImageBuffer<Rgba<u8>, Vec<u8>> {
        image::imageops::crop_imm(&self.image, rect.left, rect.top, rect.width, rect.height)
            .to_image()
    }
}

/// Supplies the latest available screenshot on request.
pub trait CaptureSource: Send + Sync {
    fn capture(&self) -> Result<RawImage, PipelineError>;
}

impl CaptureSource for RawImage {
    fn capture(&self) -> Result<RawImage, PipelineError> {
        Ok(self.clone())
    }
}
