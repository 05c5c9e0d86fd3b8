use std::sync::Arc;

use crate::assemble::DigitString;
use crate::calibration::{RegionResolver, RegionSpec};
use crate::capture::RawImage;
use crate::error::PipelineError;
use crate::ocr::{PreprocessConfig, Recognizer, preprocess};
use crate::segment::{RegionContext, SlicingStrategy};

use super::debug::DebugArtifacts;
use super::deadline::Deadline;

/// The stages one region runs through, in order: calibrate, crop,
/// preprocess, slice and recognize, assemble.
pub(crate) struct RegionReader<'a> {
    pub resolver: &'a dyn RegionResolver,
    pub preprocess: &'a PreprocessConfig,
    pub strategy: &'a dyn SlicingStrategy,
    pub recognizer: &'a Arc<dyn Recognizer>,
    pub debug: Option<&'a DebugArtifacts>,
}

impl RegionReader<'_> {
    /// Reads one region. Only an expired deadline is an error; every other
    /// failure shows up as an invalid [`DigitString`].
    pub fn read(
        &self,
        image: &RawImage,
        spec: &RegionSpec,
        deadline: Option<Deadline>,
    ) -> Result<DigitString, PipelineError> {
        let label = spec.label;
        let rect = self.resolver.resolve(spec, image.width(), image.height());
        log::debug!("[{}] calibrate: {:?}", label, rect);

        let crop = image.crop(&rect);
        let prepared = preprocess(&crop, self.preprocess);
        log::debug!(
            "[{}] preprocess: {}x{} -> {}x{}",
            label,
            crop.width(),
            crop.height(),
            prepared.width(),
            prepared.height()
        );
        if let Some(debug) = self.debug {
            debug.save_crop(label, &prepared);
        }

        let ctx = RegionContext {
            label,
            expected: spec.expected_digits(),
            recognizer: self.recognizer,
            deadline,
            debug: self.debug,
        };
        let recognitions = self.strategy.read(&prepared, &ctx)?;

        let digits = DigitString::assemble(label, &recognitions);
        match digits.validate() {
            Ok(value) => log::info!("[{}] validate: {}", label, value),
            Err(e) => log::warn!("[{}] validate: {} (read {:?})", label, e, digits.to_string()),
        }
        Ok(digits)
    }
}
