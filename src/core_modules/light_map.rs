// THEORY:
// The `light_map` module extracts the scene's lighting from the photo so the
// compositor can reapply it onto the material. Two maps come out of it, both
// photo-sized f32 grids indexed by `y * width + x`:
//
// - The shading map is the low-frequency lighting ratio: Rec. 709 luminance,
//   blurred with a separable Gaussian, divided by the blurred grid's global
//   mean. A sub-linear compression curve and a bounded clamp keep the ratio
//   multiplicative, so shading can darken or brighten the material but never
//   erase it or blow it out.
// - The occlusion map is the edge-based darkening layer: a 3x3 Sobel
//   gradient magnitude on luminance, normalized by the per-image maximum and
//   scaled into a small darkening budget. Strong photo edges (grout lines,
//   shadows under objects) darken the material slightly where they occur.
//
// Both maps depend only on the photo, so they are computed once per photo
// and may be cached keyed by `photo_identity`, a content hash over the
// dimensions and raster bytes.

use crate::core_modules::colorimetry::luminance_709;
use image::RgbaImage;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Gaussian sigma for the shading blur; the kernel radius is ceil(3 * sigma),
/// 10 px at native resolution.
pub const SHADING_BLUR_SIGMA: f32 = 10.0 / 3.0;
/// Sub-linear compression exponent applied to the lighting ratio.
pub const SHADING_EXPONENT: f32 = 0.85;
/// Lower bound of the multiplicative shading range.
pub const SHADING_FLOOR: f32 = 0.7;
/// Upper bound of the multiplicative shading range.
pub const SHADING_CEILING: f32 = 1.3;
/// Maximum darkening fraction the occlusion map may apply.
pub const OCCLUSION_BUDGET: f32 = 0.15;

/// The two lighting layers derived from one photo. A plain data container;
/// the pipeline builds it and the render queue caches it.
#[derive(Debug, Clone)]
pub struct LightMaps {
    pub width: u32,
    pub height: u32,
    /// Multiplicative lighting ratio per photo pixel.
    pub shading: Vec<f32>,
    /// Darkening fraction per photo pixel, within the occlusion budget.
    pub occlusion: Vec<f32>,
}

/// Content identity of a photo: dimensions plus raster bytes. Cache keys for
/// light maps must use this, never a pointer or a caller-supplied id.
pub fn photo_identity(photo: &RgbaImage) -> u64 {
    let mut hasher = DefaultHasher::new();
    photo.width().hash(&mut hasher);
    photo.height().hash(&mut hasher);
    photo.as_raw().hash(&mut hasher);
    hasher.finish()
}

/// Rec. 709 luminance plane of the photo, 0..255 scale.
fn luminance_plane(photo: &RgbaImage) -> Vec<f32> {
    photo
        .pixels()
        .map(|pixel| luminance_709(pixel.0[0], pixel.0[1], pixel.0[2]))
        .collect()
}

/// Build a 1-D Gaussian kernel truncated at ceil(3 * sigma), normalized to
/// sum 1.
fn build_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let len = radius * 2 + 1;
    let mut kernel = vec![0.0f32; len];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;
    for (i, slot) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        let value = (-x * x / s2).exp();
        *slot = value;
        sum += value;
    }
    let inv = 1.0 / sum;
    for value in &mut kernel {
        *value *= inv;
    }
    kernel
}

/// Separable Gaussian blur over a single-channel f32 plane with
/// clamp-to-edge sampling. Also used by the compositor to feather mask
/// alpha.
pub fn gaussian_blur_plane(plane: &[f32], width: usize, height: usize, sigma: f32) -> Vec<f32> {
    if width == 0 || height == 0 {
        return plane.to_vec();
    }
    let kernel = build_gaussian_kernel(sigma);
    let radius = kernel.len() / 2;

    // Horizontal pass.
    let mut horizontal = vec![0.0f32; plane.len()];
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let mut acc = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - radius as isize)
                    .max(0)
                    .min(width as isize - 1) as usize;
                acc += plane[row + sx] * kv;
            }
            horizontal[row + x] = acc;
        }
    }

    // Vertical pass.
    let mut vertical = vec![0.0f32; plane.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - radius as isize)
                    .max(0)
                    .min(height as isize - 1) as usize;
                acc += horizontal[sy * width + x] * kv;
            }
            vertical[y * width + x] = acc;
        }
    }

    vertical
}

/// Derives the low-frequency lighting ratio map from the photo.
///
/// Luminance is blurred at `sigma`, divided by the blurred grid's global
/// mean, compressed with `exponent` and clamped into `[floor, ceiling]`.
/// A photo with zero mean luminance yields a neutral all-ones map.
pub fn build_shading_map(
    photo: &RgbaImage,
    sigma: f32,
    exponent: f32,
    floor: f32,
    ceiling: f32,
) -> Vec<f32> {
    let width = photo.width() as usize;
    let height = photo.height() as usize;
    let luminance = luminance_plane(photo);
    let blurred = gaussian_blur_plane(&luminance, width, height, sigma);

    let mean = blurred.iter().sum::<f32>() / blurred.len().max(1) as f32;
    if mean < 1e-6 {
        return vec![1.0; width * height];
    }

    blurred
        .iter()
        .map(|&value| (value / mean).powf(exponent).clamp(floor, ceiling))
        .collect()
}

/// Derives the edge-based occlusion map from the photo.
///
/// A 3x3 Sobel gradient magnitude on luminance with clamp-to-edge sampling,
/// normalized by the per-image maximum and scaled by `budget`. A flat photo
/// has no edges and yields an all-zero map.
pub fn build_occlusion_map(photo: &RgbaImage, budget: f32) -> Vec<f32> {
    let width = photo.width() as usize;
    let height = photo.height() as usize;
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let luminance = luminance_plane(photo);

    let lum = |px: i32, py: i32| -> f32 {
        let cx = px.clamp(0, width as i32 - 1) as usize;
        let cy = py.clamp(0, height as i32 - 1) as usize;
        luminance[cy * width + cx]
    };

    let mut magnitude = vec![0.0f32; width * height];
    let mut max_magnitude = 0.0f32;
    for y in 0..height {
        for x in 0..width {
            let ix = x as i32;
            let iy = y as i32;
            let gx = -lum(ix - 1, iy - 1) - 2.0 * lum(ix - 1, iy) - lum(ix - 1, iy + 1)
                + lum(ix + 1, iy - 1)
                + 2.0 * lum(ix + 1, iy)
                + lum(ix + 1, iy + 1);
            let gy = -lum(ix - 1, iy - 1) - 2.0 * lum(ix, iy - 1) - lum(ix + 1, iy - 1)
                + lum(ix - 1, iy + 1)
                + 2.0 * lum(ix, iy + 1)
                + lum(ix + 1, iy + 1);
            let edge = (gx * gx + gy * gy).sqrt();
            magnitude[y * width + x] = edge;
            if edge > max_magnitude {
                max_magnitude = edge;
            }
        }
    }

    if max_magnitude < 1e-6 {
        return vec![0.0; width * height];
    }

    for value in &mut magnitude {
        *value = *value / max_magnitude * budget;
    }
    magnitude
}
