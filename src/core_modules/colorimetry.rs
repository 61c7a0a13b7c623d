// THEORY:
// The `colorimetry` module is the color-science foundation shared by every
// stage of the compositing engine. Region sampling measures scene color in
// CIE L*a*b*, the transfer engine remaps material color in the same space,
// and the compositor multiplies shading in linear light. All of them call
// into this module, so the constants and conversion path live in exactly one
// place.
//
// The conversion path is the standard one: sRGB bytes are gamma-decoded to
// linear light, linear RGB maps to CIE XYZ under a D65 white point, and XYZ
// maps to L*a*b*. The inverse path re-encodes with the sRGB transfer curve
// and clamps back to bytes.
//
// Key architectural principles:
// 1.  **Single conversion path**: The sampler and the transfer engine must
//     agree bit-for-bit on what "Lab" means. Both directions share the same
//     matrix and white-point constants below.
// 2.  **Table-driven gamma**: Per-pixel gamma math is powf-heavy, so both
//     directions are precomputed once behind `OnceLock`: a 256-entry decode
//     table and a 4096-step quantized encode table. The hot path is a table
//     lookup.
// 3.  **f64 channel math**: Lab values feed statistical accumulation over
//     whole regions; channel math is carried in f64 end to end.

use std::sync::OnceLock;

pub type LinearChannel = f64;
pub type LabL = f64;
pub type LabA = f64;
pub type LabB = f64;
pub type LabTriple = (LabL, LabA, LabB);

/// Rec. 709 luma weights for R, G, B.
pub const REC709_LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// D65 white point in CIE XYZ, normalized so Y = 1.
pub const D65_WHITE_POINT_XYZ: [f64; 3] = [0.95047, 1.00000, 1.08883];

// CIE Lab segmentation constants (216/24389 and 24389/27).
const LAB_EPSILON: f64 = 216.0 / 24389.0;
const LAB_KAPPA: f64 = 24389.0 / 27.0;

const ENCODE_TABLE_STEPS: usize = 4096;

// sRGB (0..255) -> linear light (0..1).
static SRGB_TO_LINEAR_LUT: OnceLock<[f64; 256]> = OnceLock::new();
// linear light (0..1) -> sRGB (0..255), quantized to 4096 steps.
static LINEAR_TO_SRGB_LUT: OnceLock<[u8; ENCODE_TABLE_STEPS]> = OnceLock::new();

/// Gamma-decode one sRGB byte to linear light in [0, 1].
#[inline]
pub fn srgb_to_linear(value: u8) -> LinearChannel {
    let table = SRGB_TO_LINEAR_LUT.get_or_init(|| {
        let mut table = [0.0f64; 256];
        for (index, slot) in table.iter_mut().enumerate() {
            let srgb = index as f64 / 255.0;
            *slot = if srgb <= 0.04045 {
                srgb / 12.92
            } else {
                ((srgb + 0.055) / 1.055).powf(2.4)
            };
        }
        table
    });
    table[value as usize]
}

/// Gamma-encode linear light in [0, 1] back to an sRGB byte.
/// Inputs outside [0, 1] are clamped before quantization.
#[inline]
pub fn linear_to_srgb(linear: LinearChannel) -> u8 {
    let table = LINEAR_TO_SRGB_LUT.get_or_init(|| {
        let mut table = [0u8; ENCODE_TABLE_STEPS];
        for (index, slot) in table.iter_mut().enumerate() {
            let linear = index as f64 / (ENCODE_TABLE_STEPS - 1) as f64;
            let srgb = if linear <= 0.003_130_8 {
                12.92 * linear
            } else {
                1.055 * linear.powf(1.0 / 2.4) - 0.055
            };
            *slot = (srgb * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        table
    });
    let index = (linear.clamp(0.0, 1.0) * (ENCODE_TABLE_STEPS - 1) as f64).round() as usize;
    table[index]
}

/// Rec. 709 luminance of an sRGB pixel, on the 0..255 scale.
#[inline]
pub fn luminance_709(red: u8, green: u8, blue: u8) -> f32 {
    REC709_LUMA_WEIGHTS[0] * red as f32
        + REC709_LUMA_WEIGHTS[1] * green as f32
        + REC709_LUMA_WEIGHTS[2] * blue as f32
}

#[inline]
fn lab_forward(t: f64) -> f64 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        (LAB_KAPPA * t + 16.0) / 116.0
    }
}

/// Convert an sRGB byte triple to CIE L*a*b* under D65.
pub fn srgb_to_lab(red: u8, green: u8, blue: u8) -> LabTriple {
    let r = srgb_to_linear(red);
    let g = srgb_to_linear(green);
    let b = srgb_to_linear(blue);

    let x = 0.4124564 * r + 0.3575761 * g + 0.1804375 * b;
    let y = 0.2126729 * r + 0.7151522 * g + 0.0721750 * b;
    let z = 0.0193339 * r + 0.1191920 * g + 0.9503041 * b;

    let fx = lab_forward(x / D65_WHITE_POINT_XYZ[0]);
    let fy = lab_forward(y / D65_WHITE_POINT_XYZ[1]);
    let fz = lab_forward(z / D65_WHITE_POINT_XYZ[2]);

    (116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
}

/// Convert CIE L*a*b* (D65) back to an sRGB byte triple.
/// Out-of-gamut results are clamped channel-wise.
pub fn lab_to_srgb(l: f64, a: f64, b: f64) -> (u8, u8, u8) {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let xr = if fx * fx * fx > LAB_EPSILON {
        fx * fx * fx
    } else {
        (116.0 * fx - 16.0) / LAB_KAPPA
    };
    let yr = if l > LAB_KAPPA * LAB_EPSILON {
        let fy3 = (l + 16.0) / 116.0;
        fy3 * fy3 * fy3
    } else {
        l / LAB_KAPPA
    };
    let zr = if fz * fz * fz > LAB_EPSILON {
        fz * fz * fz
    } else {
        (116.0 * fz - 16.0) / LAB_KAPPA
    };

    let x = xr * D65_WHITE_POINT_XYZ[0];
    let y = yr * D65_WHITE_POINT_XYZ[1];
    let z = zr * D65_WHITE_POINT_XYZ[2];

    let r = 3.2404542 * x - 1.5371385 * y - 0.4985314 * z;
    let g = -0.9692660 * x + 1.8760108 * y + 0.0415560 * z;
    let b = 0.0556434 * x - 0.2040259 * y + 1.0572252 * z;

    (linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_maps_to_lab_anchor() {
        let (l, a, b) = srgb_to_lab(255, 255, 255);
        assert!((l - 100.0).abs() < 0.01, "L for white was {l}");
        assert!(a.abs() < 0.01, "a for white was {a}");
        assert!(b.abs() < 0.01, "b for white was {b}");
    }

    #[test]
    fn mid_gray_is_neutral() {
        let (l, a, b) = srgb_to_lab(128, 128, 128);
        assert!(l > 50.0 && l < 57.0, "L for mid gray was {l}");
        assert!(a.abs() < 0.05, "a for mid gray was {a}");
        assert!(b.abs() < 0.05, "b for mid gray was {b}");
    }

    #[test]
    fn black_maps_to_zero_lightness() {
        let (l, a, b) = srgb_to_lab(0, 0, 0);
        assert!(l.abs() < 1e-6);
        assert!(a.abs() < 1e-6);
        assert!(b.abs() < 1e-6);
    }

    #[test]
    fn srgb_lab_round_trip_stays_within_two_steps() {
        for red in (0..=255).step_by(17) {
            for green in (0..=255).step_by(17) {
                for blue in (0..=255).step_by(17) {
                    let (l, a, b) = srgb_to_lab(red as u8, green as u8, blue as u8);
                    let (r2, g2, b2) = lab_to_srgb(l, a, b);
                    assert!(
                        (red as i32 - r2 as i32).abs() <= 2,
                        "red {red} came back as {r2}"
                    );
                    assert!(
                        (green as i32 - g2 as i32).abs() <= 2,
                        "green {green} came back as {g2}"
                    );
                    assert!(
                        (blue as i32 - b2 as i32).abs() <= 2,
                        "blue {blue} came back as {b2}"
                    );
                }
            }
        }
    }

    #[test]
    fn gamma_tables_agree_at_extremes() {
        assert_eq!(linear_to_srgb(srgb_to_linear(0)), 0);
        assert_eq!(linear_to_srgb(srgb_to_linear(255)), 255);
        assert_eq!(linear_to_srgb(-0.5), 0);
        assert_eq!(linear_to_srgb(2.0), 255);
    }
}

// -----------------------------------------------------------------------------
// Glossary: Color Spaces Used by the Engine
//
// - sRGB: The byte-encoded display space of source photos and output rasters.
//   Gamma-encoded; not proportional to light intensity.
//
// - Linear light: Gamma-decoded RGB, proportional to physical intensity. The
//   space where multiplicative operations (shading, occlusion, blending) are
//   physically meaningful.
//
// - CIE XYZ: Device-independent intermediate space. The D65 white point models
//   average daylight.
//
// - CIE L*a*b*: Perceptually uniform space. L* is lightness (0..100), a* runs
//   green to red, b* runs blue to yellow. Equal numeric steps are close to
//   equal perceived steps, which is what makes mean/std-dev color statistics
//   meaningful to match between a photo region and a material.
