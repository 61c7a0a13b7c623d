// THEORY:
// The `pipeline` module is the top-level synchronous API for the compositing
// engine. It encapsulates the full stack into a single entry point: one
// `CompositeRequest` goes in, one finished raster comes out. Every stage is
// CPU-bound and runs on the caller's thread; the async render queue in
// `parallel_pipeline` wraps this same pipeline when jobs should not block
// an interactive caller.

use crate::core_modules::color_transfer::{self, MIN_EFFECTIVE_STRENGTH};
use crate::core_modules::compositor::{self, FEATHER_SIGMA};
use crate::core_modules::light_map::{
    self, LightMaps, OCCLUSION_BUDGET, SHADING_BLUR_SIGMA, SHADING_CEILING, SHADING_EXPONENT,
    SHADING_FLOOR,
};
use crate::core_modules::region_stats::{self, MASK_ALPHA_THRESHOLD};
use crate::core_modules::tile_pattern::{self, DEFAULT_PIXELS_PER_METER, MIN_TILE_PX};
use crate::error::RenderError;
use image::RgbaImage;
use std::sync::Arc;

// Re-export key data structures for the public API.
pub use crate::core_modules::polygon_mask::PolygonMask;
pub use crate::core_modules::region_stats::RegionStats;
pub use crate::core_modules::tile_pattern::{Material, TextureRef};
pub use crate::core_modules::view_transform::{Camera, ImageFit, Point};

/// Configuration for the RenderPipeline, allowing for tunable behavior.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Mask coverage below this alpha leaves a pixel untouched.
    pub alpha_threshold: u8,
    pub shading_sigma: f32,
    pub shading_exponent: f32,
    pub shading_floor: f32,
    pub shading_ceiling: f32,
    pub occlusion_budget: f32,
    pub feather_sigma: f32,
    /// Smallest tile side the pattern generator will produce.
    pub min_tile_px: u32,
    /// Calibration fallback when a request carries no measurement. Renders
    /// made with it are visually indicative, not dimensionally accurate.
    pub default_pixels_per_meter: f64,
    /// Transfer strengths below this floor are raised to it.
    pub strength_floor: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            alpha_threshold: MASK_ALPHA_THRESHOLD,
            shading_sigma: SHADING_BLUR_SIGMA,
            shading_exponent: SHADING_EXPONENT,
            shading_floor: SHADING_FLOOR,
            shading_ceiling: SHADING_CEILING,
            occlusion_budget: OCCLUSION_BUDGET,
            feather_sigma: FEATHER_SIGMA,
            min_tile_px: MIN_TILE_PX,
            default_pixels_per_meter: DEFAULT_PIXELS_PER_METER,
            strength_floor: MIN_EFFECTIVE_STRENGTH,
        }
    }
}

/// One compositing job: preview `material` inside `mask` on `photo`.
#[derive(Debug, Clone)]
pub struct CompositeRequest {
    /// Caller-chosen id echoed back with the result.
    pub correlation_id: String,
    pub photo: Arc<RgbaImage>,
    pub material: Material,
    pub mask: PolygonMask,
    /// Size of the working buffers and of the output raster. The photo is
    /// drawn at its native size at the canvas origin.
    pub canvas_size: (u32, u32),
    /// Transfer strength in [0, 1]. Anything else is rejected.
    pub strength: f64,
    /// Measured calibration for this photo, when available.
    pub pixels_per_meter: Option<f64>,
}

/// The main, top-level struct for the synchronous compositing engine.
pub struct RenderPipeline {
    config: RenderConfig,
}

impl RenderPipeline {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Run one request end to end on the calling thread.
    ///
    /// Remote textures cannot be resolved here; submit those through the
    /// render queue, which owns the fetch boundary.
    pub fn render(&self, request: &CompositeRequest) -> Result<RgbaImage, RenderError> {
        self.validate(request)?;
        let texture = tile_pattern::resolve_texture_sync(&request.material.texture)?;
        let maps = self.build_light_maps(request.photo.as_ref());
        self.render_with_maps(request, texture.as_ref(), &maps)
    }

    /// Derive both lighting layers from a photo. The render queue calls this
    /// on cache misses and reuses the result across jobs on the same photo.
    pub fn build_light_maps(&self, photo: &RgbaImage) -> LightMaps {
        LightMaps {
            width: photo.width(),
            height: photo.height(),
            shading: light_map::build_shading_map(
                photo,
                self.config.shading_sigma,
                self.config.shading_exponent,
                self.config.shading_floor,
                self.config.shading_ceiling,
            ),
            occlusion: light_map::build_occlusion_map(photo, self.config.occlusion_budget),
        }
    }

    /// Run one request with an already resolved texture and prebuilt light
    /// maps.
    pub fn render_with_maps(
        &self,
        request: &CompositeRequest,
        texture: &RgbaImage,
        maps: &LightMaps,
    ) -> Result<RgbaImage, RenderError> {
        // Stage 1: Request validation
        self.validate(request)?;
        let (canvas_width, canvas_height) = request.canvas_size;

        // Stage 2: Mask rasterization
        let mask_alpha = request.mask.rasterize(canvas_width, canvas_height);
        let bounds = request
            .mask
            .bounding_box(canvas_width, canvas_height)
            .ok_or(RenderError::EmptyRegion)?;

        // Stage 3: Region statistics of the photo under the mask
        let target_stats = region_stats::sample_region_stats(
            request.photo.as_ref(),
            &mask_alpha,
            canvas_width,
            self.config.alpha_threshold,
        )?;

        // Stage 4: Tile pattern at physical scale
        let pixels_per_meter = request
            .pixels_per_meter
            .unwrap_or(self.config.default_pixels_per_meter);
        let tile = tile_pattern::build_tile(
            texture,
            request.material.physical_repeat_meters,
            request.material.tile_scale,
            pixels_per_meter,
            self.config.min_tile_px,
        )?;
        let region = tile_pattern::fill_region(&tile, &mask_alpha, request.canvas_size, bounds);

        // Stage 5: Color transfer toward the sampled ambiance
        let source_stats = region_stats::sample_raster_stats(&tile, self.config.alpha_threshold)
            .map_err(|_| {
                RenderError::MaterialUnavailable("texture has no opaque pixels".to_string())
            })?;
        let strength = request.strength.max(self.config.strength_floor);
        let tinted = color_transfer::transfer_region_color(
            &region,
            &source_stats,
            &target_stats,
            strength,
            self.config.alpha_threshold,
        );

        // Stage 6: Shade, occlude, feather, composite
        Ok(compositor::composite(
            request.photo.as_ref(),
            &tinted,
            maps,
            &mask_alpha,
            request.canvas_size,
            bounds,
            self.config.feather_sigma,
            self.config.alpha_threshold,
        ))
    }

    fn validate(&self, request: &CompositeRequest) -> Result<(), RenderError> {
        if !request.strength.is_finite() || !(0.0..=1.0).contains(&request.strength) {
            return Err(RenderError::InvalidStrength(request.strength));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::colorimetry::srgb_to_lab;
    use crate::core_modules::region_stats::{sample_raster_stats, sample_region_stats};
    use image::Rgba;

    fn solid_photo(width: u32, height: u32, rgb: [u8; 3]) -> Arc<RgbaImage> {
        let mut photo = RgbaImage::new(width, height);
        for pixel in photo.pixels_mut() {
            *pixel = Rgba([rgb[0], rgb[1], rgb[2], 255]);
        }
        Arc::new(photo)
    }

    fn checkerboard_texture(cell: u32) -> Arc<RgbaImage> {
        let side = cell * 2;
        let mut texture = RgbaImage::new(side, side);
        for y in 0..side {
            for x in 0..side {
                let gray = if ((x / cell) + (y / cell)) % 2 == 0 { 240 } else { 32 };
                texture.put_pixel(x, y, Rgba([gray, gray, gray, 255]));
            }
        }
        Arc::new(texture)
    }

    fn square_mask(x0: f64, y0: f64, x1: f64, y1: f64) -> PolygonMask {
        PolygonMask::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
        .expect("valid square")
    }

    fn blue_room_request(strength: f64) -> CompositeRequest {
        CompositeRequest {
            correlation_id: "job-1".to_string(),
            photo: solid_photo(200, 200, [40, 60, 180]),
            material: Material {
                texture: TextureRef::Raster(checkerboard_texture(8)),
                physical_repeat_meters: 0.3,
                tile_scale: 1.0,
            },
            mask: square_mask(30.0, 30.0, 170.0, 170.0),
            canvas_size: (200, 200),
            strength,
            pixels_per_meter: None,
        }
    }

    #[test]
    fn render_pulls_the_material_toward_the_room_color() {
        let pipeline = RenderPipeline::new(RenderConfig::default());
        let request = blue_room_request(1.0);
        let output = pipeline.render(&request).expect("render succeeds");
        assert_eq!((output.width(), output.height()), request.canvas_size);

        let mask_alpha = request.mask.rasterize(200, 200);
        let rendered = sample_region_stats(&output, &mask_alpha, 200, 5).expect("covered");
        let raw_tile = sample_raster_stats(&checkerboard_texture(8), 5).expect("opaque");
        let room = srgb_to_lab(40, 60, 180);

        let rendered_distance = (rendered.mean_l - room.0).abs()
            + (rendered.mean_a - room.1).abs()
            + (rendered.mean_b - room.2).abs();
        let raw_distance = (raw_tile.mean_l - room.0).abs()
            + (raw_tile.mean_a - room.1).abs()
            + (raw_tile.mean_b - room.2).abs();

        assert!(
            rendered_distance < raw_distance * 0.5,
            "rendered {rendered_distance} vs raw {raw_distance}"
        );
    }

    #[test]
    fn untouched_pixels_survive_rendering() {
        let pipeline = RenderPipeline::new(RenderConfig::default());
        let request = blue_room_request(1.0);
        let output = pipeline.render(&request).expect("render succeeds");
        assert_eq!(output.get_pixel(5, 5).0, [40, 60, 180, 255]);
    }

    #[test]
    fn off_canvas_masks_are_empty_regions() {
        let pipeline = RenderPipeline::new(RenderConfig::default());
        let mut request = blue_room_request(1.0);
        request.mask = square_mask(300.0, 300.0, 350.0, 350.0);
        assert_eq!(pipeline.render(&request), Err(RenderError::EmptyRegion));
    }

    #[test]
    fn masks_past_the_photo_are_empty_regions() {
        let pipeline = RenderPipeline::new(RenderConfig::default());
        let mut request = blue_room_request(1.0);
        // On the canvas, but entirely beyond the 100 px photo.
        request.photo = solid_photo(100, 100, [40, 60, 180]);
        request.mask = square_mask(120.0, 120.0, 180.0, 180.0);
        assert_eq!(pipeline.render(&request), Err(RenderError::EmptyRegion));
    }

    #[test]
    fn out_of_range_strengths_are_rejected() {
        let pipeline = RenderPipeline::new(RenderConfig::default());
        for bad in [-0.1, 1.5, f64::NAN, f64::INFINITY] {
            let request = blue_room_request(bad);
            assert!(matches!(
                pipeline.render(&request),
                Err(RenderError::InvalidStrength(_))
            ));
        }
    }

    #[test]
    fn remote_textures_are_unavailable_synchronously() {
        let pipeline = RenderPipeline::new(RenderConfig::default());
        let mut request = blue_room_request(1.0);
        request.material.texture = TextureRef::Remote("https://example.test/t.png".to_string());
        assert!(matches!(
            pipeline.render(&request),
            Err(RenderError::MaterialUnavailable(_))
        ));
    }
}
