use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::bands::Band;

/// A single-glyph rectangle, `x0..x1` by `y0..y1` (ends exclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slice {
    /// Reading-order position within the region.
    pub index: usize,
    pub x0: u32,
    pub x1: u32,
    pub y0: u32,
    pub y1: u32,
}

impl Slice {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn center_x(&self) -> u32 {
        self.x0 + self.width() / 2
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicerConfig {
    /// Non-maximum suppression reaches ± (width / window_divisor) columns.
    pub window_divisor: u32,
    /// Slice half-width as a fraction of half the per-glyph pitch.
    pub half_width_ratio: f32,
    /// Most digits the first of two bands may take.
    pub first_band_cap: usize,
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            window_divisor: 30,
            half_width_ratio: 0.9,
            first_band_cap: 4,
        }
    }
}

/// Per-column ink over the band's rows, relative to the band's brightest pixel.
pub fn column_ink_scores(img: &GrayImage, band: &Band) -> Vec<u64> {
    let y1 = band.y1.min(img.height());
    let y0 = band.y0.min(y1);
    let max = (y0..y1)
        .flat_map(|y| (0..img.width()).map(move |x| (x, y)))
        .map(|(x, y)| img.get_pixel(x, y)[0])
        .max()
        .unwrap_or(0) as u64;

    (0..img.width())
        .map(|x| (y0..y1).map(|y| max - img.get_pixel(x, y)[0] as u64).sum())
        .collect()
}

/// Up to `k` glyph centres, left to right.
///
/// A column is a candidate if it is non-zero and no column within ±`window`
/// scores higher. Adjacent candidates with equal scores are one flat-topped
/// peak centred on the run. The `k` strongest peaks are kept.
pub fn find_peaks(scores: &[u64], k: usize, window: usize) -> Vec<u32> {
    let n = scores.len();
    let is_candidate = |x: usize| {
        let s = scores[x];
        let lo = x.saturating_sub(window);
        let hi = (x + window).min(n.saturating_sub(1));
        s > 0 && scores[lo..=hi].iter().all(|&o| s >= o)
    };

    let mut peaks: Vec<(u32, u64)> = Vec::new();
    let mut x = 0;
    while x < n {
        if !is_candidate(x) {
            x += 1;
            continue;
        }
        let start = x;
        while x + 1 < n && scores[x + 1] == scores[start] && is_candidate(x + 1) {
            x += 1;
        }
        peaks.push((((start + x) / 2) as u32, scores[start]));
        x += 1;
    }

    peaks.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    peaks.truncate(k);
    let mut centres: Vec<u32> = peaks.into_iter().map(|(x, _)| x).collect();
    centres.sort_unstable();
    centres
}

/// `k` equal contiguous slices across the band, each at least 1px wide.
pub fn equal_slices(width: u32, band: &Band, k: usize) -> Vec<Slice> {
    let width = width.max(1) as u64;
    let k64 = k as u64;
    (0..k)
        .map(|i| {
            let i = i as u64;
            let x0 = (i * width / k64).min(width - 1);
            let x1 = ((i + 1) * width / k64).max(x0 + 1).min(width);
            Slice {
                index: i as usize,
                x0: x0 as u32,
                x1: x1 as u32,
                y0: band.y0,
                y1: band.y1,
            }
        })
        .collect()
}

/// Splits one band into exactly `k` slices, left to right.
///
/// Falls back to [`equal_slices`] when fewer than `k` peaks are found.
pub fn slice_band(img: &GrayImage, band: &Band, k: usize, config: &SlicerConfig) -> Vec<Slice> {
    if k == 0 {
        return Vec::new();
    }

    let width = img.width();
    let window = (width / config.window_divisor.max(1)).max(1) as usize;
    let scores = column_ink_scores(img, band);
    let centres = find_peaks(&scores, k, window);

    if centres.len() < k {
        log::debug!(
            "slice: {} of {} peaks found, using equal slices",
            centres.len(),
            k
        );
        return equal_slices(width, band, k);
    }

    let pitch = width as f32 / (2 * k) as f32;
    let half = ((pitch * config.half_width_ratio).round() as u32).max(1);

    centres
        .into_iter()
        .enumerate()
        .map(|(index, c)| Slice {
            index,
            x0: c.saturating_sub(half),
            x1: (c + half).min(width),
            y0: band.y0,
            y1: band.y1,
        })
        .collect()
}

/// How many digits each band reads, summing to `n`.
///
/// Each band takes up to `cap` of what remains; any shortfall goes to the
/// first band.
pub fn allocate_digits(n: usize, bands: usize, cap: usize) -> Vec<usize> {
    if bands == 0 {
        return Vec::new();
    }
    if bands == 1 {
        return vec![n];
    }

    let cap = cap.max(1);
    let mut remaining = n;
    let mut counts: Vec<usize> = (0..bands)
        .map(|_| {
            let take = cap.min(remaining);
            remaining -= take;
            take
        })
        .collect();
    counts[0] += remaining;
    counts
}

/// Slices every band and numbers them band-major, left to right.
pub fn slice_region(img: &GrayImage, bands: &[Band], n: usize, config: &SlicerConfig) -> Vec<Slice> {
    let counts = allocate_digits(n, bands.len(), config.first_band_cap);
    let mut slices = Vec::with_capacity(n);

    for (band, &k) in bands.iter().zip(&counts) {
        for slice in slice_band(img, band, k, config) {
            slices.push(Slice {
                index: slices.len(),
                ..slice
            });
        }
    }

    slices
}
