//! Turning a preprocessed region crop into reading-order recognitions.
//!
//! Two interchangeable strategies sit behind [`SlicingStrategy`]:
//! [`PeakSlicer`] finds row bands and column peaks itself, while
//! [`BoxOrderSlicer`] orders the character boxes reported by the recognizer.

pub mod bands;
pub mod boxes;
pub mod columns;

pub use bands::{Band, BandConfig, bands_or_fallback, detect_bands, fallback_band};
pub use boxes::order_digit_boxes;
pub use columns::{Slice, SlicerConfig, allocate_digits, slice_band, slice_region};

use image::GrayImage;
use image::imageops;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::calibration::Label;
use crate::error::PipelineError;
use crate::ocr::{Recognition, Recognizer, read_glyph, recognize_boxes_within};
use crate::pipeline::{Deadline, DebugArtifacts};

/// Which slicing strategy a pipeline uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlicingMode {
    #[default]
    Peaks,
    Boxes,
}

/// Everything a strategy needs to read one region.
pub struct RegionContext<'a> {
    pub label: Label,
    pub expected: usize,
    pub recognizer: &'a Arc<dyn Recognizer>,
    pub deadline: Option<Deadline>,
    pub debug: Option<&'a DebugArtifacts>,
}

impl RegionContext<'_> {
    fn check_deadline(&self) -> Result<(), PipelineError> {
        match &self.deadline {
            Some(deadline) => deadline.check(),
            None => Ok(()),
        }
    }

    /// Time limit for the next recognizer call.
    fn limit(&self) -> Option<Duration> {
        self.deadline.map(|d| d.remaining())
    }
}

pub trait SlicingStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Reads the region's glyphs in reading order. Only an expired cycle
    /// deadline is an error; recognition failures become unknown glyphs or
    /// a short result.
    fn read(&self, img: &GrayImage, ctx: &RegionContext<'_>) -> Result<Vec<Recognition>, PipelineError>;
}

/// Row bands, then windowed column peaks with an equal-split fallback.
#[derive(Clone, Debug, Default)]
pub struct PeakSlicer {
    pub bands: BandConfig,
    pub slicer: SlicerConfig,
}

impl SlicingStrategy for PeakSlicer {
    fn name(&self) -> &str {
        "peaks"
    }

    fn read(&self, img: &GrayImage, ctx: &RegionContext<'_>) -> Result<Vec<Recognition>, PipelineError> {
        let detected = detect_bands(img, &self.bands);
        let bands = if detected.is_empty() {
            let band = fallback_band(img.height(), self.bands.fallback_margin);
            log::warn!(
                "[{}] bands: none found, using fallback rows {}..{}",
                ctx.label,
                band.y0,
                band.y1
            );
            vec![band]
        } else {
            log::debug!("[{}] bands: {:?}", ctx.label, detected);
            detected
        };

        let slices = slice_region(img, &bands, ctx.expected, &self.slicer);
        log::debug!(
            "[{}] slice: {} slices centred at x {:?}",
            ctx.label,
            slices.len(),
            slices.iter().map(Slice::center_x).collect::<Vec<_>>()
        );

        let mut out = Vec::with_capacity(slices.len());
        for slice in &slices {
            ctx.check_deadline()?;
            let sub = imageops::crop_imm(img, slice.x0, slice.y0, slice.width(), slice.height()).to_image();
            if let Some(debug) = ctx.debug {
                debug.save_slice(ctx.label, slice.index, &sub);
            }
            out.push(read_glyph(ctx.recognizer, &sub, ctx.label, slice.index, ctx.limit()));
        }
        ctx.check_deadline()?;
        Ok(out)
    }
}

/// Orders recognizer-reported character boxes by row, then column.
#[derive(Clone, Debug)]
pub struct BoxOrderSlicer {
    pub row_tolerance_px: f32,
}

impl Default for BoxOrderSlicer {
    fn default() -> Self {
        Self {
            row_tolerance_px: 18.0,
        }
    }
}

impl SlicingStrategy for BoxOrderSlicer {
    fn name(&self) -> &str {
        "boxes"
    }

    fn read(&self, img: &GrayImage, ctx: &RegionContext<'_>) -> Result<Vec<Recognition>, PipelineError> {
        ctx.check_deadline()?;
        let boxes = match recognize_boxes_within(ctx.recognizer, img, ctx.limit()) {
            Ok(boxes) => boxes,
            Err(e) => {
                ctx.check_deadline()?;
                log::warn!("[{}] recognize: box request failed: {:#}", ctx.label, e);
                return Ok(Vec::new());
            }
        };

        let digits = order_digit_boxes(&boxes, ctx.expected, self.row_tolerance_px);
        if digits.len() < ctx.expected {
            log::warn!(
                "[{}] slice: {} of {} digits found in {} boxes",
                ctx.label,
                digits.len(),
                ctx.expected,
                boxes.len()
            );
        }
        Ok(digits.into_iter().map(|c| Recognition::digit(c, None)).collect())
    }
}
