use image::GrayImage;
use serde::{Deserialize, Serialize};

/// A horizontal strip of glyph content, `y0..y1` (end exclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Band {
    pub y0: u32,
    pub y1: u32,
    /// Sum of the row ink scores inside the band.
    pub score: u64,
}

impl Band {
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    /// Percentile of the row score distribution a row must reach to be active.
    pub percentile: f32,
    /// Bands shorter than this many rows are noise.
    pub min_height: u32,
    /// Keep at most this many bands, highest score first.
    pub max_bands: usize,
    /// Fraction of the crop height trimmed from top and bottom by the fallback band.
    pub fallback_margin: f32,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            percentile: 0.6,
            min_height: 4,
            max_bands: 2,
            fallback_margin: 0.12,
        }
    }
}

/// Per-row ink: sum over the row of (max intensity − pixel).
///
/// The max is taken over the whole crop, so a uniform image scores zero everywhere.
pub fn row_ink_scores(img: &GrayImage) -> Vec<u64> {
    let max = img.pixels().map(|p| p[0]).max().unwrap_or(0) as u64;
    img.rows()
        .map(|row| row.map(|p| max - p[0] as u64).sum())
        .collect()
}

/// Value at percentile `p` (0..=1) using the nearest-rank method.
pub fn percentile(scores: &[u64], p: f32) -> u64 {
    if scores.is_empty() {
        return 0;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    // 0.6 * 5 is not exactly 3.0 in f32; snap near-integers before ceil
    let exact = p.clamp(0.0, 1.0) as f64 * n as f64;
    let rank = if (exact - exact.round()).abs() < 1e-4 {
        exact.round()
    } else {
        exact.ceil()
    } as usize;
    sorted[rank.clamp(1, n) - 1]
}

/// Finds bands of active rows, sorted by `y0`.
///
/// Returns an empty list when nothing qualifies; callers fall back to
/// [`fallback_band`].
pub fn detect_bands(img: &GrayImage, config: &BandConfig) -> Vec<Band> {
    let scores = row_ink_scores(img);
    let threshold = percentile(&scores, config.percentile);

    let mut bands = Vec::new();
    let mut start: Option<usize> = None;
    for (y, &score) in scores.iter().enumerate() {
        let active = score > 0 && score >= threshold;
        match (active, start) {
            (true, None) => start = Some(y),
            (false, Some(y0)) => {
                bands.push(make_band(&scores, y0, y));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(y0) = start {
        bands.push(make_band(&scores, y0, scores.len()));
    }

    bands.retain(|b| b.height() >= config.min_height.max(1));

    if bands.len() > config.max_bands {
        bands.sort_by(|a, b| b.score.cmp(&a.score).then(a.y0.cmp(&b.y0)));
        bands.truncate(config.max_bands);
    }
    bands.sort_by_key(|b| b.y0);
    bands
}

fn make_band(scores: &[u64], y0: usize, y1: usize) -> Band {
    Band {
        y0: y0 as u32,
        y1: y1 as u32,
        score: scores[y0..y1].iter().sum(),
    }
}

/// The full crop height minus `round(height * margin)` at top and bottom.
pub fn fallback_band(height: u32, margin: f32) -> Band {
    let mut trim = (height as f32 * margin.max(0.0)).round() as u32;
    if trim * 2 >= height {
        trim = 0;
    }
    Band {
        y0: trim,
        y1: height - trim,
        score: 0,
    }
}

/// Detected bands, or the single fallback band when none are found.
pub fn bands_or_fallback(img: &GrayImage, config: &BandConfig) -> Vec<Band> {
    let bands = detect_bands(img, config);
    if bands.is_empty() {
        vec![fallback_band(img.height(), config.fallback_margin)]
    } else {
        bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    /// White image with black rows in each `y0..y1` range.
    fn striped(width: u32, height: u32, stripes: &[(u32, u32)]) -> GrayImage {
        ImageBuffer::from_fn(width, height, |_, y| {
            if stripes.iter().any(|&(y0, y1)| (y0..y1).contains(&y)) {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    #[test]
    fn test_row_ink_scores() {
        let img = striped(4, 3, &[(1, 2)]);
        assert_eq!(row_ink_scores(&img), vec![0, 4 * 255, 0]);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let scores = [5, 1, 4, 2, 3];
        assert_eq!(percentile(&scores, 0.6), 3);
        assert_eq!(percentile(&scores, 1.0), 5);
        assert_eq!(percentile(&scores, 0.0), 1);
        assert_eq!(percentile(&[], 0.6), 0);
    }

    #[test]
    fn test_uniform_image_has_no_bands() {
        for value in [0u8, 128, 255] {
            let img: GrayImage = ImageBuffer::from_pixel(40, 30, Luma([value]));
            assert!(detect_bands(&img, &BandConfig::default()).is_empty());
        }
    }

    #[test]
    fn test_uniform_image_falls_back_to_trimmed_band() {
        let img: GrayImage = ImageBuffer::from_pixel(40, 50, Luma([255]));
        let bands = bands_or_fallback(&img, &BandConfig::default());

        assert_eq!(bands, vec![Band { y0: 6, y1: 44, score: 0 }]);
    }

    #[test]
    fn test_fallback_margin_too_large_uses_full_height() {
        assert_eq!(fallback_band(3, 0.5), Band { y0: 0, y1: 3, score: 0 });
        assert_eq!(fallback_band(1, 0.12), Band { y0: 0, y1: 1, score: 0 });
    }

    #[test]
    fn test_single_band() {
        let img = striped(20, 40, &[(10, 30)]);
        let bands = detect_bands(&img, &BandConfig::default());

        assert_eq!(bands.len(), 1);
        assert_eq!((bands[0].y0, bands[0].y1), (10, 30));
    }

    #[test]
    fn test_short_band_is_noise() {
        let img = striped(20, 40, &[(5, 6), (20, 30)]);
        let bands = detect_bands(&img, &BandConfig::default());

        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].y0, 20);
    }

    #[test]
    fn test_keeps_two_strongest_bands_top_to_bottom() {
        // Three bands; the middle one is the weakest (half-width ink)
        let mut img = striped(20, 60, &[(2, 12), (44, 56)]);
        for y in 24..34 {
            for x in 0..10 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        let config = BandConfig {
            percentile: 0.5,
            ..BandConfig::default()
        };

        let bands = detect_bands(&img, &config);
        assert_eq!(bands.len(), 2);
        assert_eq!((bands[0].y0, bands[0].y1), (2, 12));
        assert_eq!((bands[1].y0, bands[1].y1), (44, 56));
    }

    #[test]
    fn test_band_touching_bottom_edge() {
        let img = striped(10, 20, &[(12, 20)]);
        let bands = detect_bands(&img, &BandConfig::default());

        assert_eq!(bands, vec![Band { y0: 12, y1: 20, score: 8 * 10 * 255 }]);
    }
}
