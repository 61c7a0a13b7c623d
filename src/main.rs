// This file is an example of how to use the `resurface` library.
// The main library entry point is `src/lib.rs`.

use image::{Rgba, RgbaImage};
use resurface::core_modules::view_transform::screen_to_photo;
use resurface::parallel_pipeline::RenderQueue;
use resurface::pipeline::{
    Camera, CompositeRequest, ImageFit, Material, Point, PolygonMask, RenderConfig, TextureRef,
};
use std::sync::Arc;

const OUTPUT_PATH: &str = "resurface_preview.png";

#[tokio::main]
async fn main() {
    println!("Resurface Engine - Example Runner");

    // --- 1. Synthetic Room Photo ---
    // A wall lit from the left with a darker band along the floor, so the
    // shading map has a gradient to pick up.
    let photo = synthetic_room_photo(480, 360);

    // --- 2. Mask from Screen Taps ---
    // Pointer positions arrive in device pixels; map them through the
    // viewport camera into photo space before building the mask.
    let camera = Camera {
        scale: 1.25,
        pan_x: 40.0,
        pan_y: 20.0,
    };
    let fit = ImageFit::identity();
    let viewport_origin = Point::new(12.0, 8.0);
    let taps = [
        Point::new(69.5, 49.25),
        Point::new(294.5, 61.75),
        Point::new(282.0, 205.5),
        Point::new(82.0, 193.0),
    ];
    let vertices = taps
        .iter()
        .map(|tap| screen_to_photo(*tap, viewport_origin, &camera, 2.0, &fit))
        .collect();
    let mask = PolygonMask::new(vertices).expect("demo polygon is valid");

    // --- 3. Material ---
    // A terracotta checkerboard previewed inside the drawn quadrilateral.
    let material = Material {
        texture: TextureRef::Raster(Arc::new(checkerboard_texture(32))),
        physical_repeat_meters: 0.4,
        tile_scale: 1.0,
    };

    // --- 4. Render Queue Initialization ---
    let queue = RenderQueue::new(RenderConfig::default());
    println!("Spawned {} render workers", queue.worker_count());

    // --- 5. Submit & Await ---
    let request = CompositeRequest {
        correlation_id: "demo-1".to_string(),
        photo: Arc::new(photo),
        material,
        mask,
        canvas_size: (480, 360),
        strength: 0.85,
        pixels_per_meter: Some(250.0),
    };

    match queue.submit(request).await {
        Ok(result) => match result.outcome {
            Ok(raster) => {
                // --- 6. Write Output ---
                std::fs::write(OUTPUT_PATH, raster.png.as_ref()).expect("preview is writable");
                println!(
                    "{}: {}x{} preview written to {}",
                    result.correlation_id, raster.width, raster.height, OUTPUT_PATH
                );
            }
            Err(error) => println!("{} failed: {}", result.correlation_id, error),
        },
        Err(error) => println!("queue error: {error}"),
    }

    queue.shutdown();
}

fn synthetic_room_photo(width: u32, height: u32) -> RgbaImage {
    let mut photo = RgbaImage::new(width, height);
    let floor_line = height * 4 / 5;
    for y in 0..height {
        for x in 0..width {
            let falloff = 1.0 - 0.45 * (x as f32 / width as f32);
            let floor = if y > floor_line { 0.55 } else { 1.0 };
            let level = |base: f32| (base * falloff * floor).clamp(0.0, 255.0) as u8;
            photo.put_pixel(x, y, Rgba([level(196.0), level(178.0), level(150.0), 255]));
        }
    }
    photo
}

fn checkerboard_texture(cell: u32) -> RgbaImage {
    let side = cell * 2;
    let mut texture = RgbaImage::new(side, side);
    for y in 0..side {
        for x in 0..side {
            let rgb: [u8; 3] = if ((x / cell) + (y / cell)) % 2 == 0 {
                [188, 98, 62]
            } else {
                [228, 208, 180]
            };
            texture.put_pixel(x, y, Rgba([rgb[0], rgb[1], rgb[2], 255]));
        }
    }
    texture
}
