//! Pick Reader
//!
//! Reads the 2-, 3-, 4- and 5-digit pick numbers off a periodically captured
//! screenshot of a results display and forwards a validated set downstream.
//!
//! Per capture cycle:
//! RawImage → calibration (per label) → preprocessing → row bands →
//! column slices → per-slice recognition → assembly/validation → publish.
//! The four labels are processed independently; publishing is all-or-nothing.

pub mod assemble;
pub mod calibration;
pub mod capture;
pub mod error;
pub mod logging;
pub mod ocr;
pub mod paths;
pub mod pipeline;
pub mod publish;
pub mod segment;

pub use assemble::{DigitString, PickSet};
pub use calibration::{Label, PixelRect, RegionSpec, RelativeRect};
pub use capture::{CaptureSource, FileCapture, RawImage};
pub use error::{PipelineError, PublishError, ValidationError};
pub use ocr::{Glyph, Recognition, Recognizer};
pub use pipeline::{CycleReport, Pipeline, PipelineConfig};
pub use publish::{PublishedResults, Publisher, StateStore, StorePublisher};
