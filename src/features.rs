use std::collections::BTreeMap;
use std::fmt;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics::{ShapeMetrics, DEFAULT_COMPLEXITY_SCALE, DEFAULT_DARK_THRESHOLD};
use crate::types::BoundingBox;

/// Trait for accessing pixel intensities from an image.
pub trait ImageAccess {
    /// Get the grayscale intensity at (x, y). Returns 255 (blank paper) for
    /// out-of-bounds pixels.
    fn get_pixel(&self, x: i32, y: i32) -> u8;

    /// Image dimensions.
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// A simple grayscale image buffer implementing ImageAccess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl GrayImage {
    /// Wrap a row-major luma buffer.
    ///
    /// Fails when either dimension is zero or the buffer length does not
    /// match `width * height`.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "image must not be empty (got {width}x{height})"
            )));
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(Error::InvalidInput(format!(
                "pixel buffer has {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Build an image pixel by pixel.
    ///
    /// Unlike [`GrayImage::new`] this accepts a zero dimension; analysis
    /// rejects such an image.
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> u8,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { data, width, height }
    }

    /// Raw row-major pixel data.
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Resample to `width` x `height` with a triangle (bilinear) filter.
    pub fn resize(&self, width: u32, height: u32) -> Result<GrayImage> {
        let buffer = image::GrayImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| Error::InvalidInput("pixel buffer does not match dimensions".into()))?;
        let resized = image::imageops::resize(&buffer, width, height, FilterType::Triangle);
        Ok(GrayImage::from(resized))
    }
}

impl From<image::GrayImage> for GrayImage {
    fn from(img: image::GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
        }
    }
}

impl ImageAccess for GrayImage {
    fn get_pixel(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 255;
        }
        self.data[(y as u32 * self.width + x as u32) as usize]
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Names of the shape descriptors a method can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Density,
    AspectRatio,
    Complexity,
    Circularity,
    Symmetry,
    StrokeWidth,
    BoundingBox,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::Density,
        Feature::AspectRatio,
        Feature::Complexity,
        Feature::Circularity,
        Feature::Symmetry,
        Feature::StrokeWidth,
        Feature::BoundingBox,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Density => "density",
            Feature::AspectRatio => "aspect_ratio",
            Feature::Complexity => "complexity",
            Feature::Circularity => "circularity",
            Feature::Symmetry => "symmetry",
            Feature::StrokeWidth => "stroke_width",
            Feature::BoundingBox => "bounding_box",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a single feature: a number, or the ink bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Scalar(f64),
    Bounds(BoundingBox),
}

impl FeatureValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            FeatureValue::Scalar(v) => Some(*v),
            FeatureValue::Bounds(_) => None,
        }
    }
}

/// Named descriptors of one drawing as seen by one method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    values: BTreeMap<Feature, FeatureValue>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, feature: Feature, value: FeatureValue) {
        self.values.insert(feature, value);
    }

    pub fn with_scalar(mut self, feature: Feature, value: f64) -> Self {
        self.insert(feature, FeatureValue::Scalar(value));
        self
    }

    pub fn get(&self, feature: Feature) -> Option<FeatureValue> {
        self.values.get(&feature).copied()
    }

    /// Numeric value of a feature; `None` if absent or not numeric.
    pub fn scalar(&self, feature: Feature) -> Option<f64> {
        self.get(feature).and_then(|v| v.as_scalar())
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self.get(Feature::BoundingBox) {
            Some(FeatureValue::Bounds(b)) => Some(b),
            _ => None,
        }
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.values.contains_key(&feature)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, FeatureValue)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

/// Parameters of the geometric feature computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionParams {
    /// Pixels strictly darker than this are ink.
    pub dark_threshold: u8,
    /// Ink pixel count at which complexity saturates.
    pub complexity_scale: f64,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            dark_threshold: DEFAULT_DARK_THRESHOLD,
            complexity_scale: DEFAULT_COMPLEXITY_SCALE,
        }
    }
}

/// Compute the requested features of `image`.
///
/// Every feature is derived from the same [`ShapeMetrics`] pass, so the
/// result is a pure function of the image and `params`.
pub fn extract_features<I: ImageAccess>(
    image: &I,
    wanted: &[Feature],
    params: &ExtractionParams,
) -> FeatureSet {
    let metrics = ShapeMetrics::measure(image, params.dark_threshold);
    features_from_metrics(&metrics, wanted, params)
}

/// Select the requested features from precomputed metrics.
pub fn features_from_metrics(
    metrics: &ShapeMetrics,
    wanted: &[Feature],
    params: &ExtractionParams,
) -> FeatureSet {
    let mut set = FeatureSet::new();
    for &feature in wanted {
        let value = match feature {
            Feature::Density => FeatureValue::Scalar(metrics.density()),
            Feature::AspectRatio => FeatureValue::Scalar(metrics.aspect_ratio()),
            Feature::Complexity => {
                FeatureValue::Scalar(metrics.complexity(params.complexity_scale))
            }
            Feature::Circularity => FeatureValue::Scalar(metrics.circularity()),
            Feature::Symmetry => FeatureValue::Scalar(metrics.symmetry()),
            Feature::StrokeWidth => FeatureValue::Scalar(metrics.stroke_width()),
            Feature::BoundingBox => FeatureValue::Bounds(metrics.bounding_box),
        };
        set.insert(feature, value);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_image_access() {
        // 3x3 checkerboard pattern
        let data = vec![
            0, 255, 0, //
            255, 0, 255, //
            0, 255, 0, //
        ];
        let img = GrayImage::new(data, 3, 3).unwrap();

        assert_eq!(img.get_pixel(0, 0), 0);
        assert_eq!(img.get_pixel(1, 0), 255);
        assert_eq!(img.get_pixel(1, 1), 0);

        // Out of bounds reads as blank paper
        assert_eq!(img.get_pixel(-1, 0), 255);
        assert_eq!(img.get_pixel(3, 0), 255);
    }

    #[test]
    fn from_fn_sizes_buffer() {
        let img = GrayImage::from_fn(70_000, 1, |x, _| (x % 256) as u8);
        assert_eq!(img.as_raw().len(), 70_000);
        assert_eq!(img.get_pixel(257, 0), 1);

        let empty = GrayImage::from_fn(0, 4, |_, _| 0);
        assert!(empty.as_raw().is_empty());
        assert_eq!(empty.height(), 4);
    }

    #[test]
    fn gray_image_rejects_bad_buffers() {
        assert!(matches!(
            GrayImage::new(vec![], 0, 0),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            GrayImage::new(vec![0; 5], 2, 2),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn resize_keeps_ink_roughly_in_place() {
        // Dark left half
        let img = GrayImage::from_fn(280, 280, |x, _| if x < 140 { 0 } else { 255 });
        let small = img.resize(28, 28).unwrap();
        assert_eq!(small.width(), 28);
        assert_eq!(small.height(), 28);
        assert!(small.get_pixel(2, 14) < 50);
        assert!(small.get_pixel(25, 14) > 200);
    }

    #[test]
    fn blank_canvas_features() {
        let img = GrayImage::from_fn(280, 280, |_, _| 255);
        let set = extract_features(&img, &Feature::ALL, &ExtractionParams::default());

        assert_eq!(set.len(), 7);
        assert_eq!(set.scalar(Feature::Density), Some(0.0));
        assert_eq!(set.scalar(Feature::Complexity), Some(0.0));
        assert_eq!(set.bounding_box(), Some(BoundingBox::new(0, 0, 0, 0)));
        assert_eq!(set.scalar(Feature::AspectRatio), Some(1.0));
        // The bounding box is not a scalar
        assert_eq!(set.scalar(Feature::BoundingBox), None);
    }

    #[test]
    fn only_requested_features_are_extracted() {
        let img = GrayImage::from_fn(10, 10, |x, y| if x == y { 0 } else { 255 });
        let set = extract_features(
            &img,
            &[Feature::Density, Feature::Symmetry],
            &ExtractionParams::default(),
        );
        assert_eq!(set.len(), 2);
        assert!(set.contains(Feature::Density));
        assert!(!set.contains(Feature::Circularity));
        assert!((set.scalar(Feature::Density).unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn feature_set_serializes_by_name() {
        let mut set = FeatureSet::new().with_scalar(Feature::Density, 0.25);
        set.insert(
            Feature::BoundingBox,
            FeatureValue::Bounds(BoundingBox::new(1, 2, 3, 4)),
        );
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["density"], 0.25);
        assert_eq!(json["bounding_box"], serde_json::json!([1, 2, 3, 4]));
    }
}
