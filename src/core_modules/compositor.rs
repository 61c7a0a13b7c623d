// THEORY:
// The `compositor` module is the last stage of a render: it merges the
// re-lit material region into the photo. Four sub-stages run in a fixed
// order. Shade multiplies each covered pixel by the photo's shading ratio,
// occlude darkens it by the edge-crevice fraction, feather softens the mask
// border with a small Gaussian, and composite draws the photo first and then
// source-overs the feathered material on top. Reordering the stages changes
// the result (feathering before shading would blur lighting across the mask
// border), so the order is part of the contract.
//
// All channel arithmetic happens in linear light through the colorimetry
// lookup tables. Multiplying gamma-encoded bytes would darken mid-tones far
// more than the shading ratio asks for.

use crate::core_modules::colorimetry::{linear_to_srgb, srgb_to_linear};
use crate::core_modules::light_map::{gaussian_blur_plane, LightMaps};
use image::{Rgba, RgbaImage};

/// Gaussian sigma for mask-border feathering, roughly a two pixel band.
pub const FEATHER_SIGMA: f32 = 0.7;

/// Merge the tinted region into the photo over a canvas-sized output.
///
/// `tinted_region` is canvas-sized with mask alpha already in its alpha
/// channel. Lighting comes from `maps` where the pixel lies inside the
/// photo; outside it the lighting is neutral. The photo is drawn at the
/// canvas origin and the material is blended over it.
pub fn composite(
    photo: &RgbaImage,
    tinted_region: &RgbaImage,
    maps: &LightMaps,
    mask_alpha: &[u8],
    canvas_size: (u32, u32),
    region_bounds: (u32, u32, u32, u32),
    feather_sigma: f32,
    alpha_threshold: u8,
) -> RgbaImage {
    let (canvas_width, canvas_height) = canvas_size;
    let (min_x, min_y, max_x, max_y) = region_bounds;
    let max_x = max_x.min(canvas_width.saturating_sub(1));
    let max_y = max_y.min(canvas_height.saturating_sub(1));

    // Stage 1 and 2: shade and occlude the covered pixels into a working
    // buffer, in linear light.
    let mut working = RgbaImage::new(canvas_width, canvas_height);
    for y in min_y..=max_y {
        let row_offset = y as usize * canvas_width as usize;
        for x in min_x..=max_x {
            if mask_alpha[row_offset + x as usize] < alpha_threshold {
                continue;
            }
            let tinted = tinted_region.get_pixel(x, y).0;
            let lighting = if x < maps.width && y < maps.height {
                let map_index = (y * maps.width + x) as usize;
                maps.shading[map_index] as f64 * (1.0 - maps.occlusion[map_index] as f64)
            } else {
                1.0
            };
            working.put_pixel(
                x,
                y,
                Rgba([
                    linear_to_srgb(srgb_to_linear(tinted[0]) * lighting),
                    linear_to_srgb(srgb_to_linear(tinted[1]) * lighting),
                    linear_to_srgb(srgb_to_linear(tinted[2]) * lighting),
                    tinted[3],
                ]),
            );
        }
    }

    // Stage 3: feather. Blur a copy of the mask alpha and apply it
    // destination-in, so coverage ramps off toward the border instead of
    // stepping.
    let mask_plane: Vec<f32> = mask_alpha.iter().map(|&alpha| alpha as f32).collect();
    let feathered = gaussian_blur_plane(
        &mask_plane,
        canvas_width as usize,
        canvas_height as usize,
        feather_sigma,
    );

    // Stage 4: composite. Photo first, then the feathered material
    // source-over, blending straight-alpha channels in linear light.
    let mut output = RgbaImage::new(canvas_width, canvas_height);
    for y in 0..photo.height().min(canvas_height) {
        for x in 0..photo.width().min(canvas_width) {
            output.put_pixel(x, y, *photo.get_pixel(x, y));
        }
    }

    for y in min_y..=max_y {
        let row_offset = y as usize * canvas_width as usize;
        for x in min_x..=max_x {
            let source = working.get_pixel(x, y).0;
            if source[3] == 0 {
                continue;
            }
            let feather = feathered[row_offset + x as usize].clamp(0.0, 255.0) as f64 / 255.0;
            let source_alpha = source[3] as f64 / 255.0 * feather;
            if source_alpha <= 0.0 {
                continue;
            }

            let destination = output.get_pixel(x, y).0;
            let destination_alpha = destination[3] as f64 / 255.0;
            let output_alpha = source_alpha + destination_alpha * (1.0 - source_alpha);

            let mut blended = [0u8; 4];
            for channel in 0..3 {
                let mixed = srgb_to_linear(source[channel]) * source_alpha
                    + srgb_to_linear(destination[channel]) * destination_alpha * (1.0 - source_alpha);
                blended[channel] = linear_to_srgb(mixed / output_alpha);
            }
            blended[3] = (output_alpha * 255.0).round() as u8;
            output.put_pixel(x, y, Rgba(blended));
        }
    }

    output
}
