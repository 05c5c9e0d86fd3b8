use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, Rgba};
use serde::{Deserialize, Serialize};

/// Which way the display draws its digits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Dark glyphs on a light background.
    #[default]
    DarkOnLight,
    /// Light glyphs on a dark background; inverted during preprocessing.
    LightOnDark,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Integer upscale factor applied before anything else.
    pub upscale: u32,
    pub polarity: Polarity,
    /// Binarization cutoff. Pixels below become ink (0), others background (255).
    pub binarize: Option<u8>,
    /// 3x3 median pass after binarization to remove speckle.
    pub smooth: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            upscale: 3,
            polarity: Polarity::DarkOnLight,
            binarize: Some(160),
            smooth: true,
        }
    }
}

/// Normalizes a cropped region for legibility.
///
/// Fixed pipeline: integer upscale, luminance, contrast stretch to 0–255,
/// polarity fix, optional binarization and median smoothing. The output
/// always has dark glyphs on a light background.
pub fn preprocess(crop: &ImageBuffer<Rgba<u8>, Vec<u8>>, config: &PreprocessConfig) -> GrayImage {
    let scale = config.upscale.max(1);
    let (width, height) = crop.dimensions();

    let upscaled = imageops::resize(crop, width * scale, height * scale, FilterType::Nearest);
    let mut gray = imageops::grayscale(&upscaled);

    stretch_contrast(&mut gray);

    if config.polarity == Polarity::LightOnDark {
        imageops::invert(&mut gray);
    }

    if let Some(cutoff) = config.binarize {
        gray = binarize(&gray, cutoff);
        if config.smooth {
            gray = median3(&gray);
        }
    }

    gray
}

/// Stretches intensities linearly so the darkest pixel becomes 0 and the
/// brightest 255. A uniform image has no contrast to stretch and is left as is.
pub fn stretch_contrast(img: &mut GrayImage) {
    let (min, max) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    if max <= min {
        return;
    }

    let range = (max - min) as u32;
    for pixel in img.pixels_mut() {
        pixel[0] = ((pixel[0] - min) as u32 * 255 / range) as u8;
    }
}

/// Converts to binary: pixels darker than `cutoff` become black (ink),
/// all others white (background).
pub fn binarize(img: &GrayImage, cutoff: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let value = if pixel[0] < cutoff { 0u8 } else { 255u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// 3x3 median filter with edge replication.
pub fn median3(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = ImageBuffer::new(width, height);
    let mut window = [0u8; 9];

    for y in 0..height {
        for x in 0..width {
            let mut i = 0;
            for dy in [-1i64, 0, 1] {
                for dx in [-1i64, 0, 1] {
                    let sx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
                    let sy = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
                    window[i] = img.get_pixel(sx, sy)[0];
                    i += 1;
                }
            }
            window.sort_unstable();
            output.put_pixel(x, y, Luma([window[4]]));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upscale_and_grayscale() {
        let crop: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(4, 2, Rgba([255, 255, 255, 255]));
        let config = PreprocessConfig {
            upscale: 3,
            binarize: None,
            ..PreprocessConfig::default()
        };

        let out = preprocess(&crop, &config);
        assert_eq!(out.dimensions(), (12, 6));
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_stretch_contrast() {
        let mut img: GrayImage = ImageBuffer::new(3, 1);
        img.put_pixel(0, 0, Luma([100]));
        img.put_pixel(1, 0, Luma([150]));
        img.put_pixel(2, 0, Luma([200]));

        stretch_contrast(&mut img);

        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(1, 0)[0], 127);
        assert_eq!(img.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn test_stretch_contrast_uniform_unchanged() {
        let mut img: GrayImage = ImageBuffer::from_pixel(5, 5, Luma([90]));
        stretch_contrast(&mut img);
        assert!(img.pixels().all(|p| p[0] == 90));
    }

    #[test]
    fn test_binarize() {
        let mut img: GrayImage = ImageBuffer::new(3, 1);
        img.put_pixel(0, 0, Luma([40]));
        img.put_pixel(1, 0, Luma([160]));
        img.put_pixel(2, 0, Luma([250]));

        let result = binarize(&img, 160);

        assert_eq!(result.get_pixel(0, 0)[0], 0, "Dark pixel should become ink");
        assert_eq!(result.get_pixel(1, 0)[0], 255, "Cutoff pixel should be background");
        assert_eq!(result.get_pixel(2, 0)[0], 255, "Bright pixel should be background");
    }

    #[test]
    fn test_median_removes_speckle() {
        let mut img: GrayImage = ImageBuffer::from_pixel(5, 5, Luma([255]));
        img.put_pixel(2, 2, Luma([0]));

        let smoothed = median3(&img);
        assert!(smoothed.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_median_keeps_solid_block_interior() {
        let img: GrayImage = ImageBuffer::from_fn(10, 10, |x, y| {
            if (2..8).contains(&x) && (2..8).contains(&y) {
                Luma([0])
            } else {
                Luma([255])
            }
        });

        let smoothed = median3(&img);
        assert_eq!(smoothed.get_pixel(4, 4)[0], 0);
        assert_eq!(smoothed.get_pixel(2, 4)[0], 0, "Edge column survives");
        assert_eq!(smoothed.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_light_on_dark_is_inverted() {
        // Bright "glyph" on a dark background
        let crop: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_fn(4, 4, |x, _| {
            if x == 1 {
                Rgba([250, 250, 250, 255])
            } else {
                Rgba([20, 20, 20, 255])
            }
        });
        let config = PreprocessConfig {
            upscale: 1,
            polarity: Polarity::LightOnDark,
            binarize: Some(128),
            smooth: false,
        };

        let out = preprocess(&crop, &config);
        assert_eq!(out.get_pixel(1, 0)[0], 0, "Glyph becomes dark ink");
        assert_eq!(out.get_pixel(3, 0)[0], 255, "Background becomes light");
    }
}
