//! Shape statistics measured from the ink of a drawing.
//!
//! A pixel is *ink* when its intensity is below the dark threshold. All
//! statistics are computed from a single pass over the ink mask, so the
//! measurements are deterministic and depend only on the image.

use crate::features::ImageAccess;
use crate::types::BoundingBox;

/// Default ink threshold: pixels darker than this count as drawn.
pub const DEFAULT_DARK_THRESHOLD: u8 = 240;

/// Ink count at which complexity saturates for a full-size canvas.
pub const DEFAULT_COMPLEXITY_SCALE: f64 = 5000.0;

/// Raw shape measurements of one drawing.
///
/// Counts are in pixels. Use the derived methods to get the normalized
/// features the scorers compare against label profiles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeMetrics {
    /// Total pixels in the image
    pub total_pixels: u64,

    /// Pixels darker than the threshold
    pub ink_pixels: u64,

    /// Bounding box of the ink, `(0,0,0,0)` when there is none
    pub bounding_box: BoundingBox,

    /// Length of the ink outline traced through pixel centres
    pub boundary_length: f64,

    /// Area enclosed by that outline; about half a pixel per boundary pixel
    /// short of `ink_pixels`
    pub enclosed_area: f64,

    /// Ink pixels whose mirror about the bounding box's vertical bisector is ink
    pub mirrored_pixels: u64,

    /// Maximal runs of consecutive ink along rows
    pub horizontal_runs: u64,

    /// Maximal runs of consecutive ink along columns
    pub vertical_runs: u64,
}

impl ShapeMetrics {
    /// Measure the ink of `image` using `threshold` as the dark cut-off.
    pub fn measure<I: ImageAccess>(image: &I, threshold: u8) -> Self {
        let mask = InkMask::from_image(image, threshold);
        let mut metrics = Self {
            total_pixels: mask.width as u64 * mask.height as u64,
            ..Self::default()
        };

        let mut bounds: Option<BoundingBox> = None;
        for y in 0..mask.height {
            for x in 0..mask.width {
                if !mask.is_ink(x as i64, y as i64) {
                    continue;
                }
                metrics.ink_pixels += 1;
                bounds = Some(match bounds {
                    None => BoundingBox::new(x, y, x, y),
                    Some(b) => BoundingBox::new(
                        b.min_x.min(x),
                        b.min_y.min(y),
                        b.max_x.max(x),
                        b.max_y.max(y),
                    ),
                });

                let (xi, yi) = (x as i64, y as i64);
                // A run starts wherever the previous pixel along the scan line is paper
                if !mask.is_ink(xi - 1, yi) {
                    metrics.horizontal_runs += 1;
                }
                if !mask.is_ink(xi, yi - 1) {
                    metrics.vertical_runs += 1;
                }
            }
        }

        if let Some(bbox) = bounds {
            metrics.bounding_box = bbox;
            (metrics.enclosed_area, metrics.boundary_length) = mask.outline(bbox);
            for y in bbox.min_y..=bbox.max_y {
                for x in bbox.min_x..=bbox.max_x {
                    if mask.is_ink(x as i64, y as i64)
                        && mask.is_ink(bbox.mirror_x(x) as i64, y as i64)
                    {
                        metrics.mirrored_pixels += 1;
                    }
                }
            }
        }

        metrics
    }

    /// Fraction of the image covered by ink.
    pub fn density(&self) -> f64 {
        ratio(self.ink_pixels as f64, self.total_pixels as f64)
    }

    /// Bounding-box height over width; 1.0 for a box without width.
    pub fn aspect_ratio(&self) -> f64 {
        self.bounding_box.aspect_ratio()
    }

    /// Ink amount relative to `scale`, saturating at 1.0.
    pub fn complexity(&self, scale: f64) -> f64 {
        ratio(self.ink_pixels as f64, scale).min(1.0)
    }

    /// Isoperimetric quotient `4πA / P²` of the ink outline, in [0, 1].
    ///
    /// Around 0.9 for filled round blobs, π/4 for squares, small for long
    /// thin strokes.
    pub fn circularity(&self) -> f64 {
        let perimeter = self.boundary_length;
        ratio(
            4.0 * std::f64::consts::PI * self.enclosed_area,
            perimeter * perimeter,
        )
        .clamp(0.0, 1.0)
    }

    /// Fraction of ink that overlaps its own left-right mirror image.
    pub fn symmetry(&self) -> f64 {
        ratio(self.mirrored_pixels as f64, self.ink_pixels as f64)
    }

    /// Estimated pen width in pixels.
    ///
    /// Mean run length along rows and along columns; the smaller of the two,
    /// since a stroke is long in one direction and pen-wide in the other.
    pub fn stroke_width(&self) -> f64 {
        let ink = self.ink_pixels as f64;
        let horizontal = ratio(ink, self.horizontal_runs as f64);
        let vertical = ratio(ink, self.vertical_runs as f64);
        horizontal.min(vertical)
    }
}

/// Division that yields 0 for a non-positive denominator.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Boolean ink mask of an image.
struct InkMask {
    width: u32,
    height: u32,
    ink: Vec<bool>,
}

impl InkMask {
    fn from_image<I: ImageAccess>(image: &I, threshold: u8) -> Self {
        let (width, height) = (image.width(), image.height());
        let mut ink = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                ink.push(image.get_pixel(x as i32, y as i32) < threshold);
            }
        }
        Self { width, height, ink }
    }

    /// Off-image coordinates are paper.
    #[inline]
    fn is_ink(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.ink[y as usize * self.width as usize + x as usize]
    }

    /// Marching squares over the 2x2 cells touching `bbox`: returns the
    /// enclosed area and the outline length. Diagonal-only cells count as
    /// two separate corners.
    fn outline(&self, bbox: BoundingBox) -> (f64, f64) {
        let corner = std::f64::consts::FRAC_1_SQRT_2;
        let (mut area, mut length) = (0.0, 0.0);
        for y in bbox.min_y as i64 - 1..=bbox.max_y as i64 {
            for x in bbox.min_x as i64 - 1..=bbox.max_x as i64 {
                let tl = self.is_ink(x, y);
                let tr = self.is_ink(x + 1, y);
                let bl = self.is_ink(x, y + 1);
                let br = self.is_ink(x + 1, y + 1);
                match [tl, tr, bl, br].iter().filter(|&&ink| ink).count() {
                    0 => {}
                    1 => {
                        area += 0.125;
                        length += corner;
                    }
                    2 if tl == br => {
                        area += 0.25;
                        length += 2.0 * corner;
                    }
                    2 => {
                        area += 0.5;
                        length += 1.0;
                    }
                    3 => {
                        area += 0.875;
                        length += corner;
                    }
                    _ => area += 1.0,
                }
            }
        }
        (area, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::GrayImage;

    fn blank(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |_, _| 255)
    }

    #[test]
    fn blank_canvas_has_no_ink() {
        let m = ShapeMetrics::measure(&blank(50, 40), DEFAULT_DARK_THRESHOLD);
        assert_eq!(m.total_pixels, 2000);
        assert_eq!(m.ink_pixels, 0);
        assert_eq!(m.bounding_box, BoundingBox::new(0, 0, 0, 0));
        assert_eq!(m.density(), 0.0);
        assert_eq!(m.complexity(DEFAULT_COMPLEXITY_SCALE), 0.0);
        assert_eq!(m.circularity(), 0.0);
        assert_eq!(m.symmetry(), 0.0);
        assert_eq!(m.stroke_width(), 0.0);
        assert!((m.aspect_ratio() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn threshold_is_strict() {
        // 240 is paper, 239 is ink
        let img = GrayImage::from_fn(2, 1, |x, _| if x == 0 { 240 } else { 239 });
        let m = ShapeMetrics::measure(&img, DEFAULT_DARK_THRESHOLD);
        assert_eq!(m.ink_pixels, 1);
        assert_eq!(m.bounding_box, BoundingBox::new(1, 0, 1, 0));
    }

    #[test]
    fn horizontal_bar() {
        // 40 wide, 4 tall bar starting at (10, 20)
        let img = GrayImage::from_fn(100, 100, |x, y| {
            if (10..50).contains(&x) && (20..24).contains(&y) {
                0
            } else {
                255
            }
        });
        let m = ShapeMetrics::measure(&img, DEFAULT_DARK_THRESHOLD);

        assert_eq!(m.ink_pixels, 160);
        assert_eq!(m.bounding_box, BoundingBox::new(10, 20, 49, 23));
        assert!((m.density() - 0.016).abs() < 1e-9);
        assert!((m.aspect_ratio() - 3.0 / 39.0).abs() < 1e-9);
        assert!((m.complexity(DEFAULT_COMPLEXITY_SCALE) - 160.0 / 5000.0).abs() < 1e-9);

        // Rows give runs of 40, columns give runs of 4
        assert_eq!(m.horizontal_runs, 4);
        assert_eq!(m.vertical_runs, 40);
        assert!((m.stroke_width() - 4.0).abs() < 1e-9);

        // A rectangle is its own mirror image
        assert!((m.symmetry() - 1.0).abs() < 1e-9);

        // Long and thin: far from round
        assert!((m.enclosed_area - 159.5).abs() < 1e-9);
        assert!((m.boundary_length - (84.0 + 2.0 * std::f64::consts::SQRT_2)).abs() < 1e-9);
        assert!(m.circularity() < 0.3);
    }

    #[test]
    fn disk_is_round_but_not_perfect() {
        let disk = GrayImage::from_fn(101, 101, |x, y| {
            let (dx, dy) = (x as f64 - 50.0, y as f64 - 50.0);
            if dx * dx + dy * dy <= 30.0 * 30.0 {
                0
            } else {
                255
            }
        });
        let square = GrayImage::from_fn(120, 120, |x, y| {
            if (10..110).contains(&x) && (10..110).contains(&y) {
                0
            } else {
                255
            }
        });
        let disk = ShapeMetrics::measure(&disk, DEFAULT_DARK_THRESHOLD).circularity();
        let square = ShapeMetrics::measure(&square, DEFAULT_DARK_THRESHOLD).circularity();

        assert!(disk > 0.85 && disk < 0.95, "disk = {disk}");
        assert!((square - 0.79).abs() < 0.01, "square = {square}");
        assert!(disk > square);

        // Larger disks approach the ideal without reaching it
        let big = GrayImage::from_fn(131, 131, |x, y| {
            let (dx, dy) = (x as f64 - 65.0, y as f64 - 65.0);
            if dx * dx + dy * dy <= 60.0 * 60.0 {
                0
            } else {
                255
            }
        });
        let big = ShapeMetrics::measure(&big, DEFAULT_DARK_THRESHOLD).circularity();
        assert!(big > disk && big < 1.0, "big = {big}");
    }

    #[test]
    fn single_pixel_outline() {
        let img = GrayImage::from_fn(3, 3, |x, y| if x == 1 && y == 1 { 0 } else { 255 });
        let m = ShapeMetrics::measure(&img, DEFAULT_DARK_THRESHOLD);
        assert!((m.enclosed_area - 0.5).abs() < 1e-9);
        assert!((m.boundary_length - 2.0 * std::f64::consts::SQRT_2).abs() < 1e-9);
        assert!((m.circularity() - std::f64::consts::FRAC_PI_4).abs() < 1e-9);
    }

    #[test]
    fn filled_disk_is_rounder_than_ring() {
        let disk = GrayImage::from_fn(101, 101, |x, y| {
            let (dx, dy) = (x as f64 - 50.0, y as f64 - 50.0);
            if dx * dx + dy * dy <= 30.0 * 30.0 {
                0
            } else {
                255
            }
        });
        let ring = GrayImage::from_fn(101, 101, |x, y| {
            let d = ((x as f64 - 50.0).powi(2) + (y as f64 - 50.0).powi(2)).sqrt();
            if (27.0..=30.0).contains(&d) {
                0
            } else {
                255
            }
        });

        let disk_m = ShapeMetrics::measure(&disk, DEFAULT_DARK_THRESHOLD);
        let ring_m = ShapeMetrics::measure(&ring, DEFAULT_DARK_THRESHOLD);

        assert!(disk_m.circularity() > 0.7);
        assert!(disk_m.circularity() <= 1.0);
        assert!(ring_m.circularity() < disk_m.circularity());
        assert!(disk_m.symmetry() > 0.99);
        assert!(ring_m.stroke_width() < disk_m.stroke_width());
    }

    #[test]
    fn lopsided_shape_is_not_symmetric() {
        // An "L": vertical bar on the left plus a foot along the bottom
        let img = GrayImage::from_fn(30, 30, |x, y| {
            let vertical = (5..8).contains(&x) && (5..25).contains(&y);
            let foot = (5..25).contains(&x) && (22..25).contains(&y);
            if vertical || foot {
                0
            } else {
                255
            }
        });
        let m = ShapeMetrics::measure(&img, DEFAULT_DARK_THRESHOLD);
        assert!(m.symmetry() < 0.8);
        assert!(m.symmetry() > 0.0);
    }

    #[test]
    fn complexity_saturates() {
        let img = GrayImage::from_fn(100, 100, |_, _| 0);
        let m = ShapeMetrics::measure(&img, DEFAULT_DARK_THRESHOLD);
        assert_eq!(m.ink_pixels, 10_000);
        assert_eq!(m.complexity(DEFAULT_COMPLEXITY_SCALE), 1.0);
        assert!((m.density() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ratio() {
        assert!((ratio(25.0, 100.0) - 0.25).abs() < 1e-9);
        assert_eq!(ratio(100.0, 0.0), 0.0);
    }
}
