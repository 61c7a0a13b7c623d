// THEORY:
// The `color_transfer` module re-lights the tiled pattern so it looks like it
// belongs in the photographed scene. A raw tile carries studio lighting; the
// masked photo region carries the room's. Matching the first and second
// moments of the two Lab distributions transfers the room's ambiance onto the
// tile while keeping the tile's own texture variation.
//
// Per channel the remap is
//
//     L' = (L - src_mean) * k * (tgt_std / src_std) + tgt_mean
//
// with k the effective strength. The source statistics are measured from the
// tile itself, which makes the remap an exact identity when source and target
// statistics coincide at full strength. A flat tile has no deviation to
// scale, so a degenerate source deviation falls back to the nominal spreads
// of a typical material (20 for L, 10 for a and b) and the tile still takes
// on the target mean.

use crate::core_modules::colorimetry::{lab_to_srgb, srgb_to_lab};
use crate::core_modules::region_stats::RegionStats;
use image::{Rgba, RgbaImage};

/// Strength floor. Below it the remap leaves the tile implausibly flat, so
/// the kernel clamps unconditionally.
pub const MIN_EFFECTIVE_STRENGTH: f64 = 0.3;

/// Strength ceiling; full statistical transfer.
pub const MAX_EFFECTIVE_STRENGTH: f64 = 1.0;

/// Source deviations below this count as degenerate.
const DEGENERATE_DEVIATION: f64 = 1e-6;

/// Nominal spreads used in place of a degenerate source deviation.
const NOMINAL_L_DEVIATION: f64 = 20.0;
const NOMINAL_AB_DEVIATION: f64 = 10.0;

/// Clamp a requested strength into the range the kernel accepts.
pub fn effective_strength(strength: f64) -> f64 {
    strength.clamp(MIN_EFFECTIVE_STRENGTH, MAX_EFFECTIVE_STRENGTH)
}

fn remap_channel(
    value: f64,
    src_mean: f64,
    src_std: f64,
    tgt_mean: f64,
    tgt_std: f64,
    k: f64,
    nominal_deviation: f64,
) -> f64 {
    let divisor = if src_std < DEGENERATE_DEVIATION {
        nominal_deviation
    } else {
        src_std
    };
    (value - src_mean) * k * (tgt_std / divisor) + tgt_mean
}

/// Remap every covered pixel of `region` from the source Lab distribution
/// toward the target one. Pixels below the alpha threshold pass through with
/// alpha forced to 0 so later stages skip them.
pub fn transfer_region_color(
    region: &RgbaImage,
    source_stats: &RegionStats,
    target_stats: &RegionStats,
    strength: f64,
    alpha_threshold: u8,
) -> RgbaImage {
    let k = effective_strength(strength);
    let mut output = RgbaImage::new(region.width(), region.height());

    for (x, y, pixel) in region.enumerate_pixels() {
        let [red, green, blue, alpha] = pixel.0;
        if alpha < alpha_threshold {
            output.put_pixel(x, y, Rgba([red, green, blue, 0]));
            continue;
        }

        let (l, a, b) = srgb_to_lab(red, green, blue);
        let l_out = remap_channel(
            l,
            source_stats.mean_l,
            source_stats.std_l,
            target_stats.mean_l,
            target_stats.std_l,
            k,
            NOMINAL_L_DEVIATION,
        );
        let a_out = remap_channel(
            a,
            source_stats.mean_a,
            source_stats.std_a,
            target_stats.mean_a,
            target_stats.std_a,
            k,
            NOMINAL_AB_DEVIATION,
        );
        let b_out = remap_channel(
            b,
            source_stats.mean_b,
            source_stats.std_b,
            target_stats.mean_b,
            target_stats.std_b,
            k,
            NOMINAL_AB_DEVIATION,
        );

        let (red_out, green_out, blue_out) = lab_to_srgb(l_out, a_out, b_out);
        output.put_pixel(x, y, Rgba([red_out, green_out, blue_out, alpha]));
    }

    output
}
