// THEORY:
// The `region_stats` module measures what the scene looks like under the
// mask. It walks the photo once, converts every qualifying pixel to CIE
// L*a*b* through `colorimetry`, and accumulates per-channel mean and
// population standard deviation. A pixel qualifies when its mask alpha is at
// or above the threshold; everything else is invisible to the statistics.
//
// The resulting `RegionStats` is the target the color transfer engine remaps
// material pixels toward. The same computation also runs over a raster's own
// opaque pixels to measure a tile's native statistics, so the transfer
// formula can use the true source distribution instead of a nominal one.
//
// A mask that covers zero qualifying pixels is an `EmptyRegion` error, never
// a division by zero.

use crate::core_modules::colorimetry::srgb_to_lab;
use crate::error::RenderError;
use image::RgbaImage;

/// Mask or raster alpha at or above this value qualifies a pixel for
/// sampling (and later, for transfer and compositing).
pub const MASK_ALPHA_THRESHOLD: u8 = 5;

/// Per-channel mean and standard deviation of a sampled region, in CIE
/// L*a*b* under D65.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStats {
    pub mean_l: f64,
    pub mean_a: f64,
    pub mean_b: f64,
    pub std_l: f64,
    pub std_a: f64,
    pub std_b: f64,
}

impl RegionStats {
    /// Neutral statistics, used only as a placeholder in failure paths.
    pub fn neutral() -> Self {
        Self {
            mean_l: 50.0,
            mean_a: 0.0,
            mean_b: 0.0,
            std_l: 0.0,
            std_a: 0.0,
            std_b: 0.0,
        }
    }
}

/// Running per-channel accumulator. Population variance, matching the tuple
/// form `(mean, std_dev)` used across the engine.
struct ChannelAccumulator {
    sum: f64,
    sum_sq: f64,
}

impl ChannelAccumulator {
    fn new() -> Self {
        Self {
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    fn push(&mut self, value: f64) {
        self.sum += value;
        self.sum_sq += value * value;
    }

    fn stats(&self, count: f64) -> (f64, f64) {
        if count < 1.0 {
            return (0.0, 0.0);
        }
        let mean = self.sum / count;
        let variance = (self.sum_sq / count - mean * mean).max(0.0);
        (mean, variance.sqrt())
    }
}

/// Samples Lab statistics of the photo pixels whose mask alpha is at or
/// above `alpha_threshold`. The mask buffer is `canvas_width` wide and the
/// photo sits at the canvas origin, so only pixels inside both the photo and
/// the canvas can qualify.
pub fn sample_region_stats(
    photo: &RgbaImage,
    mask_alpha: &[u8],
    canvas_width: u32,
    alpha_threshold: u8,
) -> Result<RegionStats, RenderError> {
    if canvas_width == 0 {
        return Err(RenderError::EmptyRegion);
    }
    let canvas_height = (mask_alpha.len() / canvas_width as usize) as u32;
    let sample_width = photo.width().min(canvas_width);
    let sample_height = photo.height().min(canvas_height);

    let mut l_channel = ChannelAccumulator::new();
    let mut a_channel = ChannelAccumulator::new();
    let mut b_channel = ChannelAccumulator::new();
    let mut count = 0u64;

    for y in 0..sample_height {
        let row_offset = y as usize * canvas_width as usize;
        for x in 0..sample_width {
            if mask_alpha[row_offset + x as usize] < alpha_threshold {
                continue;
            }
            let pixel = photo.get_pixel(x, y).0;
            let (l, a, b) = srgb_to_lab(pixel[0], pixel[1], pixel[2]);
            l_channel.push(l);
            a_channel.push(a);
            b_channel.push(b);
            count += 1;
        }
    }

    if count == 0 {
        return Err(RenderError::EmptyRegion);
    }

    let count = count as f64;
    let (mean_l, std_l) = l_channel.stats(count);
    let (mean_a, std_a) = a_channel.stats(count);
    let (mean_b, std_b) = b_channel.stats(count);
    Ok(RegionStats {
        mean_l,
        mean_a,
        mean_b,
        std_l,
        std_a,
        std_b,
    })
}

/// Samples Lab statistics over a raster's own pixels with alpha at or above
/// `alpha_threshold`. Used to measure a tile pattern's native distribution.
pub fn sample_raster_stats(
    raster: &RgbaImage,
    alpha_threshold: u8,
) -> Result<RegionStats, RenderError> {
    let mut l_channel = ChannelAccumulator::new();
    let mut a_channel = ChannelAccumulator::new();
    let mut b_channel = ChannelAccumulator::new();
    let mut count = 0u64;

    for pixel in raster.pixels() {
        if pixel.0[3] < alpha_threshold {
            continue;
        }
        let (l, a, b) = srgb_to_lab(pixel.0[0], pixel.0[1], pixel.0[2]);
        l_channel.push(l);
        a_channel.push(a);
        b_channel.push(b);
        count += 1;
    }

    if count == 0 {
        return Err(RenderError::EmptyRegion);
    }

    let count = count as f64;
    let (mean_l, std_l) = l_channel.stats(count);
    let (mean_a, std_a) = a_channel.stats(count);
    let (mean_b, std_b) = b_channel.stats(count);
    Ok(RegionStats {
        mean_l,
        mean_a,
        mean_b,
        std_l,
        std_a,
        std_b,
    })
}
