//! Region calibration: resolves a pick label to a pixel rectangle in the
//! current capture.
//!
//! Two strategies are available and selected by configuration:
//! - [`FixedPixelResolver`] uses the stored pixel rectangle when the capture
//!   matches the calibrated reference resolution, and falls back to the
//!   fractional rectangle otherwise.
//! - [`FractionalResolver`] always scales the fractional rectangle.
//!
//! Neither fails: the worst case is a degenerate but in-bounds rectangle.

pub mod coords;

pub use coords::{PixelRect, RelativeRect, pixels_to_relative, relative_to_pixels};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four pick categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    P2,
    P3,
    P4,
    P5,
}

impl Label {
    pub const ALL: [Label; 4] = [Label::P2, Label::P3, Label::P4, Label::P5];

    /// Number of digits a valid pick for this label has.
    pub fn digit_count(self) -> usize {
        match self {
            Label::P2 => 2,
            Label::P3 => 3,
            Label::P4 => 4,
            Label::P5 => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::P2 => "P2",
            Label::P3 => "P3",
            Label::P4 => "P4",
            Label::P5 => "P5",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static per-label region configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub label: Label,
    /// Pixel rectangle at the reference resolution, if one was calibrated.
    #[serde(default)]
    pub pixel: Option<PixelRect>,
    /// Rectangle as fractions of the capture size.
    pub fraction: RelativeRect,
}

impl RegionSpec {
    pub fn expected_digits(&self) -> usize {
        self.label.digit_count()
    }
}

/// How region rectangles are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    /// Pixel rectangles at the reference resolution, fractions elsewhere.
    #[default]
    FixedPixel,
    /// Fractional rectangles at every resolution.
    Fractional,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub mode: CalibrationMode,
    /// Resolution the pixel rectangles were calibrated against.
    pub reference_width: u32,
    pub reference_height: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            mode: CalibrationMode::FixedPixel,
            reference_width: 1280,
            reference_height: 720,
        }
    }
}

/// Resolves a region to a pixel rectangle inside a `width`×`height` capture.
pub trait RegionResolver: Send + Sync {
    fn resolve(&self, spec: &RegionSpec, width: u32, height: u32) -> PixelRect;
}

/// Scales the fractional rectangle by the capture size.
#[derive(Clone, Copy, Debug, Default)]
pub struct FractionalResolver;

impl RegionResolver for FractionalResolver {
    fn resolve(&self, spec: &RegionSpec, width: u32, height: u32) -> PixelRect {
        relative_to_pixels(&spec.fraction, width, height)
    }
}

/// Uses stored pixel rectangles at the reference resolution.
#[derive(Clone, Copy, Debug)]
pub struct FixedPixelResolver {
    pub reference_width: u32,
    pub reference_height: u32,
}

impl RegionResolver for FixedPixelResolver {
    fn resolve(&self, spec: &RegionSpec, width: u32, height: u32) -> PixelRect {
        let at_reference = width == self.reference_width && height == self.reference_height;

        match spec.pixel {
            Some(rect) if at_reference => {
                if rect.fits(width, height) {
                    return rect;
                }
                let clamped = rect.clamp_to(width, height);
                log::warn!(
                    "[{}] calibrate: rectangle {:?} out of bounds for {}x{}, clamped to {:?}",
                    spec.label,
                    rect,
                    width,
                    height,
                    clamped
                );
                clamped
            }
            _ => {
                if spec.pixel.is_some() {
                    log::debug!(
                        "[{}] calibrate: {}x{} differs from reference {}x{}, using fractions",
                        spec.label,
                        width,
                        height,
                        self.reference_width,
                        self.reference_height
                    );
                }
                FractionalResolver.resolve(spec, width, height)
            }
        }
    }
}

/// Builds the resolver selected by `config.mode`.
pub fn resolver_for(config: &CalibrationConfig) -> Box<dyn RegionResolver> {
    match config.mode {
        CalibrationMode::FixedPixel => Box::new(FixedPixelResolver {
            reference_width: config.reference_width,
            reference_height: config.reference_height,
        }),
        CalibrationMode::Fractional => Box::new(FractionalResolver),
    }
}

/// Region rectangles for the 1280x720 results page, with matching fractions
/// for other capture sizes. Starting values only; override in config.json.
pub fn default_regions() -> Vec<RegionSpec> {
    let region = |label, pixel: PixelRect| RegionSpec {
        label,
        pixel: Some(pixel),
        fraction: pixels_to_relative(&pixel, 1280, 720),
    };

    vec![
        region(Label::P2, PixelRect::new(107, 286, 102, 54)),
        region(Label::P3, PixelRect::new(94, 325, 160, 51)),
        region(Label::P4, PixelRect::new(94, 363, 211, 54)),
        region(Label::P5, PixelRect::new(94, 424, 262, 66)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> RegionSpec {
        RegionSpec {
            label: Label::P3,
            pixel: Some(PixelRect::new(94, 325, 160, 51)),
            fraction: RelativeRect {
                x: 0.05,
                y: 0.5,
                width: 0.25,
                height: 0.1,
            },
        }
    }

    fn fixed() -> FixedPixelResolver {
        FixedPixelResolver {
            reference_width: 1280,
            reference_height: 720,
        }
    }

    #[test]
    fn test_reference_resolution_returns_stored_rect() {
        let rect = fixed().resolve(&spec(), 1280, 720);
        assert_eq!(rect, PixelRect::new(94, 325, 160, 51));
    }

    #[test]
    fn test_other_resolution_scales_fractions() {
        let rect = fixed().resolve(&spec(), 1920, 1080);
        assert_eq!(rect, PixelRect::new(96, 540, 480, 108));
    }

    #[test]
    fn test_fixed_without_pixel_rect_uses_fractions() {
        let mut spec = spec();
        spec.pixel = None;
        let rect = fixed().resolve(&spec, 1280, 720);
        assert_eq!(rect, PixelRect::new(64, 360, 320, 72));
    }

    #[test]
    fn test_fractional_mode_ignores_pixel_rect() {
        let resolver = resolver_for(&CalibrationConfig {
            mode: CalibrationMode::Fractional,
            ..CalibrationConfig::default()
        });
        let rect = resolver.resolve(&spec(), 1280, 720);
        assert_eq!(rect, PixelRect::new(64, 360, 320, 72));
    }

    #[test]
    fn test_out_of_bounds_pixel_rect_is_clamped() {
        let resolver = FixedPixelResolver {
            reference_width: 100,
            reference_height: 100,
        };
        let mut spec = spec();
        spec.pixel = Some(PixelRect::new(90, 95, 40, 40));
        let rect = resolver.resolve(&spec, 100, 100);
        assert_eq!(rect, PixelRect::new(90, 95, 10, 5));
    }

    #[test]
    fn test_default_regions_cover_every_label_in_bounds() {
        let regions = default_regions();
        let labels: Vec<Label> = regions.iter().map(|r| r.label).collect();
        assert_eq!(labels, Label::ALL.to_vec());

        let resolver = FixedPixelResolver {
            reference_width: 1280,
            reference_height: 720,
        };
        for (w, h) in [(1280, 720), (1920, 1080), (800, 600), (3, 2)] {
            for region in &regions {
                assert!(resolver.resolve(region, w, h).fits(w, h));
            }
        }
    }

    #[test]
    fn test_label_digit_counts() {
        let counts: Vec<usize> = Label::ALL.iter().map(|l| l.digit_count()).collect();
        assert_eq!(counts, vec![2, 3, 4, 5]);
        assert_eq!(Label::P4.to_string(), "P4");
    }
}
