// THEORY:
// The `polygon_mask` module owns the user-drawn region. A mask is an ordered
// vertex list in photo-pixel space; edges follow insertion order and the ring
// closes implicitly from the last vertex back to the first. Validation happens
// once, at construction, so no later stage can ever see a degenerate mask.
//
// Two read paths exist. `contains` answers interactive hit-tests with an
// even-odd ray cast, O(n) per query. `rasterize` turns the ring into a
// single-channel alpha buffer with an even-odd scanline fill sampled at row
// centers, which is the buffer the sampler, the tile filler and the compositor
// all index by `y * width + x`. Self-intersecting rings are accepted; the
// even-odd rule resolves them the same way in both read paths.

use crate::core_modules::view_transform::Point;
use crate::error::RenderError;

/// Vertices closer than this along consecutive edges count as coincident.
const COINCIDENT_VERTEX_TOLERANCE: f64 = 1e-9;

/// An ordered polygon ring in photo-pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonMask {
    points: Vec<Point>,
}

impl PolygonMask {
    /// Builds a mask from at least three vertices. Rejects rings with fewer
    /// vertices or with coincident consecutive vertices (the closing edge
    /// from last back to first included) as `InvalidMask`.
    pub fn new(points: Vec<Point>) -> Result<Self, RenderError> {
        if points.len() < 3 {
            return Err(RenderError::InvalidMask(format!(
                "polygon needs at least 3 vertices, got {}",
                points.len()
            )));
        }
        for index in 0..points.len() {
            let current = points[index];
            let next = points[(index + 1) % points.len()];
            if (current.x - next.x).abs() < COINCIDENT_VERTEX_TOLERANCE
                && (current.y - next.y).abs() < COINCIDENT_VERTEX_TOLERANCE
            {
                return Err(RenderError::InvalidMask(format!(
                    "vertices {} and {} are coincident",
                    index,
                    (index + 1) % points.len()
                )));
            }
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Even-odd point-in-polygon test over the closed ring.
    pub fn contains(&self, point: Point) -> bool {
        let n = self.points.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let pi = self.points[i];
            let pj = self.points[j];
            if (pi.y > point.y) != (pj.y > point.y) {
                let crossing_x = pi.x + (point.y - pi.y) / (pj.y - pi.y) * (pj.x - pi.x);
                if point.x < crossing_x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Rasterizes the ring into a `width * height` single-channel buffer:
    /// 255 inside, 0 outside, even-odd fill sampled at row centers (y + 0.5).
    pub fn rasterize(&self, width: u32, height: u32) -> Vec<u8> {
        let mut alpha = vec![0u8; width as usize * height as usize];
        let n = self.points.len();

        for y in 0..height {
            let yf = y as f64 + 0.5; // centre of pixel row
            let mut nodes: Vec<f64> = Vec::new();
            // Walk polygon edges, the closing edge n-1 -> 0 included.
            for i in 0..n {
                let j = (i + 1) % n;
                let yi = self.points[i].y;
                let yj = self.points[j].y;
                if (yi < yf && yj >= yf) || (yj < yf && yi >= yf) {
                    let t = (yf - yi) / (yj - yi);
                    nodes.push(self.points[i].x + t * (self.points[j].x - self.points[i].x));
                }
            }
            nodes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            // Fill between pairs of crossings.
            let row_offset = y as usize * width as usize;
            let mut k = 0;
            while k + 1 < nodes.len() {
                let x_start = (nodes[k].max(0.0) as u32).min(width);
                let x_end = ((nodes[k + 1] + 1.0).max(0.0) as u32).min(width);
                for x in x_start..x_end {
                    alpha[row_offset + x as usize] = 255;
                }
                k += 2;
            }
        }

        alpha
    }

    /// Integer vertex bounds clamped to a `width` x `height` canvas, as
    /// inclusive `(min_x, min_y, max_x, max_y)`. `None` when the ring lies
    /// entirely outside the canvas.
    pub fn bounding_box(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        if width == 0 || height == 0 {
            return None;
        }
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for point in &self.points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        if max_x < 0.0 || max_y < 0.0 || min_x >= width as f64 || min_y >= height as f64 {
            return None;
        }
        let clamped_min_x = min_x.floor().max(0.0) as u32;
        let clamped_min_y = min_y.floor().max(0.0) as u32;
        let clamped_max_x = (max_x.ceil() as u32).min(width - 1);
        let clamped_max_y = (max_y.ceil() as u32).min(height - 1);
        Some((clamped_min_x, clamped_min_y, clamped_max_x, clamped_max_y))
    }

    /// Vertex mean. Inside the ring for convex masks.
    pub fn centroid(&self) -> Point {
        let n = self.points.len() as f64;
        let sum_x: f64 = self.points.iter().map(|p| p.x).sum();
        let sum_y: f64 = self.points.iter().map(|p| p.y).sum();
        Point::new(sum_x / n, sum_y / n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, side: f64) -> PolygonMask {
        PolygonMask::new(vec![
            Point::new(x0, y0),
            Point::new(x0 + side, y0),
            Point::new(x0 + side, y0 + side),
            Point::new(x0, y0 + side),
        ])
        .expect("square is a valid mask")
    }

    #[test]
    fn rejects_fewer_than_three_vertices() {
        for count in 0..3 {
            let points: Vec<Point> = (0..count).map(|i| Point::new(i as f64, 0.0)).collect();
            match PolygonMask::new(points) {
                Err(RenderError::InvalidMask(_)) => {}
                other => panic!("expected InvalidMask for {count} vertices, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_coincident_consecutive_vertices() {
        let result = PolygonMask::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ]);
        assert!(matches!(result, Err(RenderError::InvalidMask(_))));

        // The closing edge counts too.
        let closing = PolygonMask::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 0.0),
        ]);
        assert!(matches!(closing, Err(RenderError::InvalidMask(_))));
    }

    #[test]
    fn centroid_is_inside_convex_mask_and_far_point_is_not() {
        let mask = square(20.0, 30.0, 60.0);
        assert!(mask.contains(mask.centroid()));
        assert!(!mask.contains(Point::new(500.0, 500.0)));
        assert!(!mask.contains(Point::new(-40.0, 45.0)));
    }

    #[test]
    fn rasterize_fills_interior_and_leaves_exterior_empty() {
        let mask = square(10.0, 10.0, 20.0);
        let alpha = mask.rasterize(50, 50);
        assert_eq!(alpha[20 * 50 + 20], 255, "interior pixel should be filled");
        assert_eq!(alpha[5 * 50 + 5], 0, "exterior pixel should be empty");
        assert_eq!(alpha[45 * 50 + 45], 0, "exterior pixel should be empty");
    }

    #[test]
    fn rasterize_outside_canvas_is_all_zero() {
        let mask = square(300.0, 300.0, 50.0);
        let alpha = mask.rasterize(100, 100);
        assert!(alpha.iter().all(|&value| value == 0));
    }

    #[test]
    fn bounding_box_clamps_to_canvas() {
        let mask = square(-10.0, 40.0, 100.0);
        let bounds = mask.bounding_box(64, 64).expect("overlaps the canvas");
        assert_eq!(bounds, (0, 40, 63, 63));

        let outside = square(300.0, 300.0, 10.0);
        assert!(outside.bounding_box(64, 64).is_none());
    }

    #[test]
    fn self_intersecting_ring_uses_even_odd_fill() {
        // Bowtie: the crossing region in the middle is outside by even-odd.
        let mask = PolygonMask::new(vec![
            Point::new(0.0, 0.0),
            Point::new(40.0, 40.0),
            Point::new(40.0, 0.0),
            Point::new(0.0, 40.0),
        ])
        .expect("bowtie is structurally valid");
        // A point in the left lobe is inside, the vertical midline is not.
        assert!(mask.contains(Point::new(8.0, 20.0)));
        assert!(!mask.contains(Point::new(20.0, 35.0)));
    }
}
