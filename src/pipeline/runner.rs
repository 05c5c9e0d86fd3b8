//! Capture cycle execution.
//!
//! One cycle: capture, read all configured regions in parallel, then hand
//! the candidate set to the publisher. Cycles are serialized by a run flag;
//! a second caller gets [`PipelineError::AlreadyRunning`] instead of waiting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::assemble::{DigitString, PickSet};
use crate::calibration::{Label, RegionResolver, resolver_for};
use crate::capture::{CaptureSource, RawImage};
use crate::error::{PipelineError, PublishError};
use crate::ocr::Recognizer;
use crate::publish::{PublishedResults, Publisher};
use crate::segment::{BoxOrderSlicer, PeakSlicer, SlicingMode, SlicingStrategy};

use super::config::PipelineConfig;
use super::deadline::Deadline;
use super::debug::DebugArtifacts;
use super::region::RegionReader;

/// What a cycle that reached the publish gate produced.
#[derive(Debug)]
pub struct CycleReport {
    /// One entry per label, always in P2, P3, P4, P5 order.
    pub digits: Vec<DigitString>,
    pub publish: Result<PublishedResults, PublishError>,
}

impl CycleReport {
    pub fn published(&self) -> bool {
        self.publish.is_ok()
    }

    pub fn get(&self, label: Label) -> Option<&DigitString> {
        self.digits.iter().find(|d| d.label == label)
    }

    /// `P2=12 P3=8?5 ...` for logs.
    pub fn summary(&self) -> String {
        self.digits
            .iter()
            .map(|d| format!("{}={}", d.label, d))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Clears the run flag when the cycle ends, however it ends.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, PipelineError> {
        if flag.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::AlreadyRunning);
        }
        Ok(Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Builds the slicing strategy selected by `config.slicing`.
pub fn strategy_for(config: &PipelineConfig) -> Box<dyn SlicingStrategy> {
    match config.slicing {
        SlicingMode::Peaks => Box::new(PeakSlicer {
            bands: config.bands.clone(),
            slicer: config.slicer.clone(),
        }),
        SlicingMode::Boxes => Box::new(BoxOrderSlicer {
            row_tolerance_px: config.row_tolerance_px,
        }),
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    resolver: Box<dyn RegionResolver>,
    strategy: Box<dyn SlicingStrategy>,
    recognizer: Arc<dyn Recognizer>,
    publisher: Box<dyn Publisher>,
    debug: Option<DebugArtifacts>,
    running: AtomicBool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, recognizer: Box<dyn Recognizer>, publisher: Box<dyn Publisher>) -> Self {
        let debug = config
            .debug_artifacts
            .then(|| DebugArtifacts::new(crate::paths::get_debug_dir()));
        Self {
            resolver: resolver_for(&config.calibration),
            strategy: strategy_for(&config),
            recognizer: Arc::from(recognizer),
            publisher,
            debug,
            running: AtomicBool::new(false),
            config,
        }
    }

    /// Writes debug artifacts to `debug` regardless of `config.debug_artifacts`.
    pub fn with_debug(mut self, debug: DebugArtifacts) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Captures an image and runs one cycle on it.
    pub fn run_cycle(&self, capture: &dyn CaptureSource) -> Result<CycleReport, PipelineError> {
        let _guard = RunGuard::acquire(&self.running)?;

        let image = capture.capture().inspect_err(|e| {
            log::warn!("capture: {}", e);
        })?;
        self.cycle(&image)
    }

    /// Runs one cycle on an already captured image.
    pub fn run_image(&self, image: &RawImage) -> Result<CycleReport, PipelineError> {
        let _guard = RunGuard::acquire(&self.running)?;
        self.cycle(image)
    }

    fn cycle(&self, image: &RawImage) -> Result<CycleReport, PipelineError> {
        let started = Instant::now();
        let deadline = (self.config.cycle_timeout_ms > 0)
            .then(|| Deadline::after(Duration::from_millis(self.config.cycle_timeout_ms)));

        log::info!(
            "cycle: {}x{} capture, {} regions via {}/{}",
            image.width(),
            image.height(),
            self.config.regions.len(),
            self.strategy.name(),
            self.recognizer.name()
        );

        let digits = self.read_regions(image, deadline)?;

        if let Some(deadline) = &deadline {
            deadline.check().inspect_err(|e| log::warn!("cycle: {}, nothing published", e))?;
        }

        let candidate = PickSet::from_digits(&digits);
        let publish = self.publisher.publish(&candidate);
        let report = CycleReport { digits, publish };

        match &report.publish {
            Ok(results) => log::info!(
                "publish: accepted by {} at {} ({}) in {}ms",
                self.publisher.name(),
                results.at,
                report.summary(),
                started.elapsed().as_millis()
            ),
            Err(e) => log::warn!(
                "publish: {} via {} ({})",
                e,
                self.publisher.name(),
                report.summary()
            ),
        }
        Ok(report)
    }

    /// Reads every label in parallel. Labels missing from the config, or
    /// whose worker panicked, come back as failed.
    fn read_regions(&self, image: &RawImage, deadline: Option<Deadline>) -> Result<Vec<DigitString>, PipelineError> {
        let reader = RegionReader {
            resolver: self.resolver.as_ref(),
            preprocess: &self.config.preprocess,
            strategy: self.strategy.as_ref(),
            recognizer: &self.recognizer,
            debug: self.debug.as_ref(),
        };

        let results: Vec<(Label, Result<DigitString, PipelineError>)> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .config
                .regions
                .iter()
                .map(|spec| {
                    let reader = &reader;
                    (spec.label, scope.spawn(move || reader.read(image, spec, deadline)))
                })
                .collect();

            handles
                .into_iter()
                .map(|(label, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        log::error!("[{}] region worker panicked", label);
                        Ok(DigitString::failed(label))
                    });
                    (label, result)
                })
                .collect()
        });

        let mut digits: Vec<DigitString> = Label::ALL.iter().map(|&l| DigitString::failed(l)).collect();
        for (label, result) in results {
            let read = result.inspect_err(|e| log::warn!("[{}] cycle: {}", label, e))?;
            if let Some(slot) = digits.iter_mut().find(|d| d.label == label) {
                *slot = read;
            }
        }
        Ok(digits)
    }
}
