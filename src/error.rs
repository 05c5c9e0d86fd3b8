//! Error taxonomy for capture cycles, label validation and publishing.
//!
//! Out-of-bounds rectangles and unknown glyphs are not errors here: the first
//! is clamped and logged, the second surfaces as a [`ValidationError`] on the
//! label it belongs to.

use thiserror::Error;

use crate::calibration::Label;

/// Reasons a cycle ends before reaching the publish gate.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no capture available: {0}")]
    CaptureUnavailable(String),
    #[error("a cycle is already running")]
    AlreadyRunning,
    #[error("cycle exceeded its {limit_ms}ms budget")]
    TimedOut { limit_ms: u64 },
}

/// Why an assembled label string is not a valid pick.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("expected {expected} digits, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("no digit recognized at position {position}")]
    Unknown { position: usize },
}

/// Publisher outcomes other than acceptance.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The candidate set is incomplete. Persisted state was not touched.
    #[error("publish rejected, invalid labels: {invalid:?}")]
    Rejected { invalid: Vec<Label> },
    #[error("failed to persist results: {0:#}")]
    Persist(anyhow::Error),
    #[error("publisher transport failed: {0:#}")]
    Transport(anyhow::Error),
}

impl PublishError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, PublishError::Rejected { .. })
    }
}
