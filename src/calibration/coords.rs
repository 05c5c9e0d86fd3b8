//! Rectangle types and conversions between fractional and pixel coordinates.

use serde::{Deserialize, Serialize};

/// A rectangle in relative coordinates (0.0 to 1.0).
/// Used for screen regions that scale with the capture size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    /// X position of top-left corner (0.0 = left edge, 1.0 = right edge)
    pub x: f32,
    /// Y position of top-left corner (0.0 = top edge, 1.0 = bottom edge)
    pub y: f32,
    /// Width as fraction of image width
    pub width: f32,
    /// Height as fraction of image height
    pub height: f32,
}

impl Default for RelativeRect {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.1,
            height: 0.1,
        }
    }
}

/// A rectangle in absolute pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.left.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.top.saturating_add(self.height)
    }

    /// True when the rectangle is non-empty and lies inside `[0,W)×[0,H)`.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width > 0 && self.height > 0 && self.right() <= width && self.bottom() <= height
    }

    /// Moves and shrinks the rectangle until it fits `[0,W)×[0,H)`,
    /// keeping at least 1px in each dimension.
    ///
    /// Expects `width` and `height` to be at least 1.
    pub fn clamp_to(&self, width: u32, height: u32) -> PixelRect {
        let left = self.left.min(width.saturating_sub(1));
        let top = self.top.min(height.saturating_sub(1));
        PixelRect {
            left,
            top,
            width: self.width.clamp(1, (width - left).max(1)),
            height: self.height.clamp(1, (height - top).max(1)),
        }
    }
}

/// Scales a fractional rectangle by the image size, flooring each edge.
///
/// Width and height are floored to at least 1px and the result is clamped to
/// the image bounds. Negative or NaN fractions collapse to 0.
pub fn relative_to_pixels(rect: &RelativeRect, width: u32, height: u32) -> PixelRect {
    let scale = |fraction: f32, extent: u32| (fraction.max(0.0) * extent as f32).floor() as u32;

    PixelRect {
        left: scale(rect.x, width),
        top: scale(rect.y, height),
        width: scale(rect.width, width).max(1),
        height: scale(rect.height, height).max(1),
    }
    .clamp_to(width, height)
}

/// Expresses a pixel rectangle as fractions of a reference resolution.
pub fn pixels_to_relative(rect: &PixelRect, width: u32, height: u32) -> RelativeRect {
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    RelativeRect {
        x: rect.left as f32 / w,
        y: rect.top as f32 / h,
        width: rect.width as f32 / w,
        height: rect.height as f32 / h,
    }
}
