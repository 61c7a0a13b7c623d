// THEORY:
// The `view_transform` module is the single mapping path between the frames a
// pointer event lives in and the frame the photo's pixels live in. Three
// frames exist and every function names the frame of each point it touches:
//
//   device space    raw pointer coordinates, scaled by pixel density relative
//                   to logical viewport units
//   viewport space  logical coordinates local to the editor viewport
//   photo space     the source photo's raster frame, (0,0) top-left, one unit
//                   per photo pixel
//
// The forward chain subtracts the viewport origin, applies pixel density,
// undoes the user's pan/zoom, then undoes the fit transform applied when the
// photo was loaded. The inverse applies the same three steps in the opposite
// order with the opposite operators. Composing the two must reproduce the
// original point within 1.0 unit per axis for any pixel density >= 1, any
// positive camera scale and any fit.
//
// Every caller that maps coordinates (mask drawing, hit-testing, overlay
// rendering) routes through these two functions. No other mapping path may
// exist in the crate.

/// A point in one of the three coordinate frames. The frame is carried by
/// parameter names, never implied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// User pan/zoom of the photo coordinate space within the viewport.
/// Supplied per call by the interactive layer; never stored by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Zoom factor. Must be positive.
    pub scale: f64,
    /// Horizontal pan in viewport units.
    pub pan_x: f64,
    /// Vertical pan in viewport units.
    pub pan_y: f64,
}

impl Camera {
    /// Returns `true` when the scale is finite and positive.
    pub fn is_valid(&self) -> bool {
        self.scale.is_finite()
            && self.scale > 0.0
            && self.pan_x.is_finite()
            && self.pan_y.is_finite()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

/// Offset and scale applied when the photo was fit into its container.
/// Immutable for the lifetime of one photo load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageFit {
    pub origin_x: f64,
    pub origin_y: f64,
    /// Fit scale factor. Must be positive.
    pub img_scale: f64,
}

impl ImageFit {
    /// The identity fit: photo pixels coincide with camera-space units.
    pub fn identity() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            img_scale: 1.0,
        }
    }

    /// Returns `true` when the fit scale is finite and positive.
    pub fn is_valid(&self) -> bool {
        self.img_scale.is_finite()
            && self.img_scale > 0.0
            && self.origin_x.is_finite()
            && self.origin_y.is_finite()
    }
}

/// Map a raw pointer position in device space to photo-pixel space.
///
/// `pixel_density` is the ratio of device pixels to logical viewport units
/// (>= 1, constant per display). `viewport_origin` is the viewport's top-left
/// corner in device space.
pub fn screen_to_photo(
    device_point: Point,
    viewport_origin: Point,
    camera: &Camera,
    pixel_density: f64,
    image_fit: &ImageFit,
) -> Point {
    // Device -> viewport: shift to viewport-local, apply density.
    let viewport_x = (device_point.x - viewport_origin.x) * pixel_density;
    let viewport_y = (device_point.y - viewport_origin.y) * pixel_density;

    // Viewport -> camera space: undo pan, undo zoom.
    let camera_x = (viewport_x - camera.pan_x) / camera.scale;
    let camera_y = (viewport_y - camera.pan_y) / camera.scale;

    // Camera space -> photo: undo the fit transform.
    Point {
        x: (camera_x - image_fit.origin_x) / image_fit.img_scale,
        y: (camera_y - image_fit.origin_y) / image_fit.img_scale,
    }
}

/// Exact inverse of [`screen_to_photo`]: map a photo-pixel point back to
/// device space under the same camera, density and fit.
pub fn photo_to_screen(
    photo_point: Point,
    viewport_origin: Point,
    camera: &Camera,
    pixel_density: f64,
    image_fit: &ImageFit,
) -> Point {
    // Photo -> camera space: apply the fit transform.
    let camera_x = photo_point.x * image_fit.img_scale + image_fit.origin_x;
    let camera_y = photo_point.y * image_fit.img_scale + image_fit.origin_y;

    // Camera space -> viewport: apply zoom, apply pan.
    let viewport_x = camera_x * camera.scale + camera.pan_x;
    let viewport_y = camera_y * camera.scale + camera.pan_y;

    // Viewport -> device: undo density, shift back to device origin.
    Point {
        x: viewport_x / pixel_density + viewport_origin.x,
        y: viewport_y / pixel_density + viewport_origin.y,
    }
}
