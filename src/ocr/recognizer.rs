//! Recognizer seam and the per-slice adapter.

use anyhow::{Context, Result, anyhow};
use image::GrayImage;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use super::extract::first_digit;
use crate::calibration::Label;

/// Text returned by a recognition backend for one image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OcrText {
    pub text: String,
    pub confidence: Option<f32>,
}

impl OcrText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }
}

/// A recognized token with its bounding box in image pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBox {
    pub text: String,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: Option<f32>,
}

/// External character recognition capability. Its output may be noisy or
/// wrong; callers must not trust it beyond "some text came back".
///
/// `limit` is the time left in the cycle. Backends that run external work
/// should stop it once the limit passes; callers stop waiting regardless.
pub trait Recognizer: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Recognizes the text in `img`.
    fn recognize_text(&self, img: &GrayImage, limit: Option<Duration>) -> Result<OcrText>;

    /// Recognizes tokens with bounding boxes. Backends that cannot report
    /// positions keep the default.
    fn recognize_boxes(&self, _img: &GrayImage, _limit: Option<Duration>) -> Result<Vec<TextBox>> {
        Err(anyhow!("{} does not report character boxes", self.name()))
    }
}

/// Runs `call` on its own thread and waits at most `limit` for the answer.
/// A call still running at the limit is abandoned to finish on its own.
fn call_within<T, F>(limit: Option<Duration>, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let Some(limit) = limit else {
        return call();
    };

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("recognize".to_string())
        .spawn(move || {
            let _ = tx.send(call());
        })
        .context("Failed to spawn recognizer thread")?;

    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(anyhow!("no answer within {}ms", limit.as_millis())),
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!("recognizer thread panicked")),
    }
}

/// [`Recognizer::recognize_text`], waiting no longer than `limit`.
pub fn recognize_text_within(
    recognizer: &Arc<dyn Recognizer>,
    img: &GrayImage,
    limit: Option<Duration>,
) -> Result<OcrText> {
    let recognizer = Arc::clone(recognizer);
    let img = img.clone();
    call_within(limit, move || recognizer.recognize_text(&img, limit))
}

/// [`Recognizer::recognize_boxes`], waiting no longer than `limit`.
pub fn recognize_boxes_within(
    recognizer: &Arc<dyn Recognizer>,
    img: &GrayImage,
    limit: Option<Duration>,
) -> Result<Vec<TextBox>> {
    let recognizer = Arc::clone(recognizer);
    let img = img.clone();
    call_within(limit, move || recognizer.recognize_boxes(&img, limit))
}

/// A single-slice classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Glyph {
    Digit(char),
    Unknown,
}

impl Glyph {
    pub fn digit(&self) -> Option<char> {
        match self {
            Glyph::Digit(c) if c.is_ascii_digit() => Some(*c),
            _ => None,
        }
    }
}

impl fmt::Display for Glyph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Glyph::Digit(c) => write!(f, "{}", c),
            Glyph::Unknown => f.write_str("?"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Recognition {
    pub glyph: Glyph,
    pub confidence: Option<f32>,
}

impl Recognition {
    pub fn digit(c: char, confidence: Option<f32>) -> Self {
        Self {
            glyph: Glyph::Digit(c),
            confidence,
        }
    }

    pub fn unknown() -> Self {
        Self {
            glyph: Glyph::Unknown,
            confidence: None,
        }
    }
}

/// Reads one slice. Every failure mode (backend error, timeout, empty or
/// non-digit response) becomes [`Glyph::Unknown`] so one bad slice never
/// aborts the cycle.
pub fn read_glyph(
    recognizer: &Arc<dyn Recognizer>,
    slice: &GrayImage,
    label: Label,
    index: usize,
    limit: Option<Duration>,
) -> Recognition {
    match recognize_text_within(recognizer, slice, limit) {
        Ok(ocr) => match first_digit(&ocr.text) {
            Some(c) => Recognition::digit(c, ocr.confidence),
            None => {
                log::warn!(
                    "[{}] recognize: slice {} returned no digit ({:?})",
                    label,
                    index + 1,
                    ocr.text.trim()
                );
                Recognition::unknown()
            }
        },
        Err(e) => {
            log::warn!(
                "[{}] recognize: slice {} failed via {}: {:#}",
                label,
                index + 1,
                recognizer.name(),
                e
            );
            Recognition::unknown()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<&'static str, &'static str>);

    impl Recognizer for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize_text(&self, _img: &GrayImage, _limit: Option<Duration>) -> Result<OcrText> {
            match self.0 {
                Ok(text) => Ok(OcrText {
                    text: text.to_string(),
                    confidence: Some(91.0),
                }),
                Err(msg) => Err(anyhow!(msg)),
            }
        }
    }

    fn read(response: Result<&'static str, &'static str>) -> Recognition {
        let recognizer: Arc<dyn Recognizer> = Arc::new(Fixed(response));
        read_glyph(&recognizer, &GrayImage::new(4, 4), Label::P3, 0, None)
    }

    /// Answers only after `delay`.
    struct Sleepy(Duration);

    impl Recognizer for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn recognize_text(&self, _img: &GrayImage, _limit: Option<Duration>) -> Result<OcrText> {
            thread::sleep(self.0);
            Ok(OcrText::new("4"))
        }
    }

    #[test]
    fn test_digit_response() {
        assert_eq!(read(Ok("8")), Recognition::digit('8', Some(91.0)));
    }

    #[test]
    fn test_noisy_response_keeps_first_digit() {
        assert_eq!(read(Ok(" |7\n")).glyph, Glyph::Digit('7'));
    }

    #[test]
    fn test_empty_and_non_digit_are_unknown() {
        assert_eq!(read(Ok("")).glyph, Glyph::Unknown);
        assert_eq!(read(Ok("B")).glyph, Glyph::Unknown);
    }

    #[test]
    fn test_backend_error_is_unknown() {
        assert_eq!(read(Err("service down")), Recognition::unknown());
    }

    #[test]
    fn test_default_boxes_unsupported() {
        assert!(Fixed(Ok("1")).recognize_boxes(&GrayImage::new(1, 1), None).is_err());
    }

    #[test]
    fn test_answer_within_limit_is_kept() {
        let recognizer: Arc<dyn Recognizer> = Arc::new(Sleepy(Duration::ZERO));
        let read = read_glyph(&recognizer, &GrayImage::new(4, 4), Label::P2, 1, Some(Duration::from_secs(5)));
        assert_eq!(read.glyph, Glyph::Digit('4'));
    }

    #[test]
    fn test_stuck_call_is_abandoned_at_limit() {
        let recognizer: Arc<dyn Recognizer> = Arc::new(Sleepy(Duration::from_secs(3)));
        let started = std::time::Instant::now();

        let read = read_glyph(&recognizer, &GrayImage::new(4, 4), Label::P2, 0, Some(Duration::from_millis(50)));
        assert_eq!(read, Recognition::unknown());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_boxes_within_limit() {
        let recognizer: Arc<dyn Recognizer> = Arc::new(Fixed(Ok("1")));
        assert!(recognize_boxes_within(&recognizer, &GrayImage::new(1, 1), Some(Duration::from_secs(1))).is_err());
    }

    #[test]
    fn test_glyph_display() {
        assert_eq!(Glyph::Digit('4').to_string(), "4");
        assert_eq!(Glyph::Unknown.to_string(), "?");
        assert_eq!(Glyph::Digit('x').digit(), None);
    }
}
