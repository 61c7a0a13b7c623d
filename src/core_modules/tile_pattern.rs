// THEORY:
// The `tile_pattern` module turns a material description into a region-sized
// raster at the correct physical scale. A material carries a reference
// texture (an in-memory raster, encoded bytes, or a remote URL resolved at
// the orchestration boundary), the real-world size one texture repeat
// represents, and a user scale multiplier.
//
// `build_tile` resamples the reference texture so that one repeat spans
// `physical_repeat_meters * pixels_per_meter * tile_scale` photo pixels,
// which is what makes a 30 cm tile look 30 cm wide in a calibrated photo.
// Without calibration the documented default of 100 px/m applies and the
// result is visually indicative only. `fill_region` then repeats the tile
// across the mask's bounding box, anchored at the box origin, copying each
// output pixel's alpha from the rasterized mask so downstream stages can
// pass uncovered pixels through untouched.

use crate::error::RenderError;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::sync::Arc;

/// Calibration fallback when the measurement subsystem supplies nothing.
/// Results rendered with it are visually indicative, not dimensionally
/// accurate.
pub const DEFAULT_PIXELS_PER_METER: f64 = 100.0;

/// Smallest tile side the generator will produce.
pub const MIN_TILE_PX: u32 = 32;

/// The reference texture in the three shapes the input contract allows.
#[derive(Debug, Clone)]
pub enum TextureRef {
    /// A decoded raster, shared as-is.
    Raster(Arc<RgbaImage>),
    /// Encoded image bytes (PNG, JPEG, ...), decoded on use.
    Bytes(Arc<[u8]>),
    /// A remote URL. Resolving it requires the fetch boundary at the render
    /// queue; the synchronous pipeline rejects it.
    Remote(String),
}

/// A material to preview inside a mask region.
#[derive(Debug, Clone)]
pub struct Material {
    pub texture: TextureRef,
    /// Real-world size in meters that one texture repeat represents.
    pub physical_repeat_meters: f64,
    /// User multiplier on the repeat size.
    pub tile_scale: f64,
}

/// Decode encoded texture bytes into an RGBA raster.
pub fn decode_texture_bytes(bytes: &[u8]) -> Result<RgbaImage, RenderError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|error| RenderError::MaterialUnavailable(format!("decode failed: {error}")))?;
    Ok(decoded.to_rgba8())
}

/// Resolve a texture reference without the fetch boundary. Raster and byte
/// references resolve synchronously; remote references are rejected.
pub fn resolve_texture_sync(texture: &TextureRef) -> Result<Arc<RgbaImage>, RenderError> {
    match texture {
        TextureRef::Raster(raster) => Ok(Arc::clone(raster)),
        TextureRef::Bytes(bytes) => Ok(Arc::new(decode_texture_bytes(bytes)?)),
        TextureRef::Remote(url) => Err(RenderError::MaterialUnavailable(format!(
            "remote texture {url} requires a fetcher"
        ))),
    }
}

/// Resample the reference texture into one tile at physical scale.
///
/// The tile width is `physical_repeat_meters * pixels_per_meter * tile_scale`
/// rounded to pixels and clamped to at least `min_tile_px` (callers normally
/// pass [`MIN_TILE_PX`]); the height follows the texture's aspect ratio.
/// Non-finite or non-positive sizes are rejected as `MaterialUnavailable`.
pub fn build_tile(
    texture: &RgbaImage,
    physical_repeat_meters: f64,
    tile_scale: f64,
    pixels_per_meter: f64,
    min_tile_px: u32,
) -> Result<RgbaImage, RenderError> {
    if texture.width() == 0 || texture.height() == 0 {
        return Err(RenderError::MaterialUnavailable(
            "reference texture is empty".to_string(),
        ));
    }

    let target_side = physical_repeat_meters * pixels_per_meter * tile_scale;
    if !target_side.is_finite() || target_side <= 0.0 {
        return Err(RenderError::MaterialUnavailable(format!(
            "tile size {target_side} px is not renderable"
        )));
    }

    let min_side = min_tile_px.max(1);
    let tile_width = (target_side.round() as u32).max(min_side);
    let aspect = texture.height() as f64 / texture.width() as f64;
    let tile_height = ((tile_width as f64 * aspect).round() as u32).max(min_side);

    Ok(imageops::resize(
        texture,
        tile_width,
        tile_height,
        FilterType::Triangle,
    ))
}

/// Repeat the tile across the mask's bounding box into a canvas-sized
/// raster. Repeats anchor at the box origin; each output pixel's alpha is
/// copied from the rasterized mask, so pixels the mask does not cover stay
/// transparent.
pub fn fill_region(
    tile: &RgbaImage,
    mask_alpha: &[u8],
    canvas_size: (u32, u32),
    bounds: (u32, u32, u32, u32),
) -> RgbaImage {
    let (canvas_width, canvas_height) = canvas_size;
    let (min_x, min_y, max_x, max_y) = bounds;
    let mut region = RgbaImage::new(canvas_width, canvas_height);

    let tile_width = tile.width();
    let tile_height = tile.height();

    for y in min_y..=max_y.min(canvas_height.saturating_sub(1)) {
        let row_offset = y as usize * canvas_width as usize;
        for x in min_x..=max_x.min(canvas_width.saturating_sub(1)) {
            let alpha = mask_alpha[row_offset + x as usize];
            let tile_pixel = tile.get_pixel((x - min_x) % tile_width, (y - min_y) % tile_height);
            let mut out = *tile_pixel;
            out.0[3] = alpha;
            region.put_pixel(x, y, out);
        }
    }

    region
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Two-by-two checkerboard scaled up to the requested size.
    fn checkerboard(cell: u32, light: [u8; 3], dark: [u8; 3]) -> RgbaImage {
        let side = cell * 2;
        let mut texture = RgbaImage::new(side, side);
        for y in 0..side {
            for x in 0..side {
                let is_light = ((x / cell) + (y / cell)) % 2 == 0;
                let rgb = if is_light { light } else { dark };
                texture.put_pixel(x, y, Rgba([rgb[0], rgb[1], rgb[2], 255]));
            }
        }
        texture
    }

    #[test]
    fn tile_size_follows_calibration() {
        let texture = checkerboard(8, [240, 240, 240], [32, 32, 32]);
        // 0.5 m repeat at 200 px/m is a 100 px tile.
        let tile = build_tile(&texture, 0.5, 1.0, 200.0, MIN_TILE_PX).expect("valid tile");
        assert_eq!(tile.width(), 100);
        assert_eq!(tile.height(), 100);
    }

    #[test]
    fn tiny_tiles_clamp_to_the_minimum() {
        let texture = checkerboard(8, [240, 240, 240], [32, 32, 32]);
        // 0.3 m at 100 px/m is 30 px, below the minimum.
        let tile = build_tile(&texture, 0.3, 1.0, 100.0, MIN_TILE_PX).expect("valid tile");
        assert_eq!(tile.width(), MIN_TILE_PX);
        assert_eq!(tile.height(), MIN_TILE_PX);
    }

    #[test]
    fn tile_scale_multiplies_the_repeat() {
        let texture = checkerboard(8, [240, 240, 240], [32, 32, 32]);
        let tile = build_tile(&texture, 0.5, 2.0, 200.0, MIN_TILE_PX).expect("valid tile");
        assert_eq!(tile.width(), 200);
    }

    #[test]
    fn rectangular_textures_keep_their_aspect() {
        let mut texture = RgbaImage::new(64, 32);
        for pixel in texture.pixels_mut() {
            *pixel = Rgba([128, 128, 128, 255]);
        }
        let tile = build_tile(&texture, 0.5, 1.0, 200.0, MIN_TILE_PX).expect("valid tile");
        assert_eq!(tile.width(), 100);
        assert_eq!(tile.height(), 50);
    }

    #[test]
    fn degenerate_sizes_are_material_errors() {
        let texture = checkerboard(4, [255, 255, 255], [0, 0, 0]);
        assert!(matches!(
            build_tile(&texture, 0.0, 1.0, 100.0, MIN_TILE_PX),
            Err(RenderError::MaterialUnavailable(_))
        ));
        assert!(matches!(
            build_tile(&texture, f64::NAN, 1.0, 100.0, MIN_TILE_PX),
            Err(RenderError::MaterialUnavailable(_))
        ));
        assert!(matches!(
            build_tile(&texture, 0.3, -1.0, 100.0, MIN_TILE_PX),
            Err(RenderError::MaterialUnavailable(_))
        ));

        let empty = RgbaImage::new(0, 0);
        assert!(matches!(
            build_tile(&empty, 0.3, 1.0, 100.0, MIN_TILE_PX),
            Err(RenderError::MaterialUnavailable(_))
        ));
    }

    #[test]
    fn remote_textures_need_the_fetch_boundary() {
        let remote = TextureRef::Remote("https://example.test/tile.png".to_string());
        assert!(matches!(
            resolve_texture_sync(&remote),
            Err(RenderError::MaterialUnavailable(_))
        ));
    }

    #[test]
    fn fill_anchors_repeats_at_the_bounds_origin() {
        // 2x2 tile: (0,0) white, (1,0) black, (0,1) black, (1,1) white.
        let tile = checkerboard(1, [255, 255, 255], [0, 0, 0]);
        let canvas = (10u32, 10u32);
        let mut mask = vec![0u8; 100];
        for y in 5..9 {
            for x in 3..7 {
                mask[y * 10 + x] = 255;
            }
        }
        let region = fill_region(&tile, &mask, canvas, (3, 5, 6, 8));

        // The bounds origin shows the tile's own origin.
        assert_eq!(region.get_pixel(3, 5).0, [255, 255, 255, 255]);
        assert_eq!(region.get_pixel(4, 5).0, [0, 0, 0, 255]);
        assert_eq!(region.get_pixel(3, 6).0, [0, 0, 0, 255]);
        // One full repeat later the pattern recurs.
        assert_eq!(region.get_pixel(5, 7).0, [255, 255, 255, 255]);
        // Outside the bounds nothing was written.
        assert_eq!(region.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn fill_copies_mask_alpha_per_pixel() {
        let tile = checkerboard(1, [200, 200, 200], [20, 20, 20]);
        let canvas = (4u32, 4u32);
        let mut mask = vec![0u8; 16];
        mask[1 * 4 + 1] = 255;
        // Pixel (2, 1) sits inside the bounds but outside the mask.
        let region = fill_region(&tile, &mask, canvas, (1, 1, 2, 2));
        assert_eq!(region.get_pixel(1, 1).0[3], 255);
        assert_eq!(region.get_pixel(2, 1).0[3], 0);
    }
}
