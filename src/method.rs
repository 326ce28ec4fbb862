//! Analysis methods: one feature extractor plus one scorer each.
//!
//! Every method turns a drawing into a [`FeatureSet`] and then scores that
//! set against the target letter's profile. The built-in methods differ only
//! in preprocessing and in which features they look at; scoring is shared.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::features::{
    extract_features, features_from_metrics, ExtractionParams, Feature, FeatureSet, GrayImage,
    ImageAccess,
};
use crate::metrics::ShapeMetrics;
use crate::profile::LetterTables;
use crate::types::Label;

/// Side of the square grid the `shape_stats` method resamples to.
pub const SHAPE_GRID: u32 = 28;

/// Confidence reported when the target has no comparable profile.
pub const DEFAULT_CONFIDENCE: f64 = 0.6;

/// Confidence above which a method commits to the target letter.
pub const DECISION_THRESHOLD: f64 = 0.65;

/// Tunables shared by all methods.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodParams {
    pub extraction: ExtractionParams,
    pub decision_threshold: f64,
    pub default_confidence: f64,
    /// Seed for the `mock` method. Only read by that method.
    pub mock_seed: u64,
}

impl Default for MethodParams {
    fn default() -> Self {
        Self {
            extraction: ExtractionParams::default(),
            decision_threshold: DECISION_THRESHOLD,
            default_confidence: DEFAULT_CONFIDENCE,
            mock_seed: 0,
        }
    }
}

/// Clamp to [0, 1], mapping NaN to 0.
pub(crate) fn unit_interval(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Outcome of running one method on one drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    /// Method name, used to look up the method's ensemble weight
    pub method: String,
    pub prediction: Label,
    /// Always within [0, 1]
    pub confidence: f64,
    pub features: FeatureSet,
}

impl MethodResult {
    pub fn new(method: impl Into<String>, prediction: Label, confidence: f64) -> Self {
        Self {
            method: method.into(),
            prediction,
            confidence: unit_interval(confidence),
            features: FeatureSet::new(),
        }
    }

    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.features = features;
        self
    }
}

/// A named feature-extraction and scoring strategy.
///
/// Implementors must be pure: the same image, target and tables always give
/// the same result. The provided [`score`](AnalysisMethod::score) implements
/// profile matching and is what the built-in methods use.
pub trait AnalysisMethod {
    fn name(&self) -> &str;

    fn extract(&self, image: &GrayImage, params: &MethodParams) -> Result<FeatureSet>;

    fn score(
        &self,
        features: &FeatureSet,
        target: Label,
        tables: &LetterTables,
        params: &MethodParams,
    ) -> (Label, f64) {
        score_features(features, target, tables, params)
    }

    fn analyze(
        &self,
        image: &GrayImage,
        target: Label,
        tables: &LetterTables,
        params: &MethodParams,
    ) -> Result<MethodResult> {
        let features = self.extract(image, params)?;
        let (prediction, confidence) = self.score(&features, target, tables, params);
        tracing::debug!(
            method = self.name(),
            %prediction,
            confidence,
            "method scored drawing"
        );
        Ok(MethodResult::new(self.name(), prediction, confidence).with_features(features))
    }
}

/// Score a feature set against `target`'s profile.
///
/// Returns `(target, default_confidence)` when the target has no profile or
/// shares no feature with it. Otherwise the confidence is the profile
/// similarity, and the prediction is the target only when the confidence
/// exceeds the decision threshold; below it the nearest confusable letter is
/// predicted instead.
pub fn score_features(
    features: &FeatureSet,
    target: Label,
    tables: &LetterTables,
    params: &MethodParams,
) -> (Label, f64) {
    let similarity = tables
        .profiles
        .get(target)
        .and_then(|profile| profile.similarity(features));

    let Some(similarity) = similarity else {
        return (target, unit_interval(params.default_confidence));
    };

    let confidence = unit_interval(similarity);
    if confidence > params.decision_threshold {
        (target, confidence)
    } else {
        (tables.nearest_alternative(target, features), confidence)
    }
}

/// The built-in analysis methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Whole-canvas ink statistics: coverage, extent and pen width.
    VisionLike,
    /// Shape statistics on a 28x28 resample of the canvas.
    ShapeStats,
    /// Outline descriptors at full resolution.
    PatternMatch,
    /// Seeded pseudo-random features, for demos and tests only.
    Mock,
}

impl Method {
    /// The deterministic methods, in default ensemble order.
    pub const STANDARD: [Method; 3] = [Method::VisionLike, Method::ShapeStats, Method::PatternMatch];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::VisionLike => "vision_like",
            Method::ShapeStats => "shape_stats",
            Method::PatternMatch => "pattern_match",
            Method::Mock => "mock",
        }
    }

    /// Features this method extracts.
    pub fn features(self) -> &'static [Feature] {
        match self {
            Method::VisionLike => &[
                Feature::Density,
                Feature::BoundingBox,
                Feature::StrokeWidth,
                Feature::AspectRatio,
                Feature::Complexity,
            ],
            Method::ShapeStats => &[
                Feature::Density,
                Feature::AspectRatio,
                Feature::Complexity,
                Feature::Circularity,
                Feature::Symmetry,
            ],
            Method::PatternMatch | Method::Mock => &[
                Feature::AspectRatio,
                Feature::Circularity,
                Feature::Complexity,
                Feature::Symmetry,
            ],
        }
    }

    pub fn is_mock(self) -> bool {
        self == Method::Mock
    }

    fn extract_shape_stats(image: &GrayImage, params: &MethodParams) -> Result<FeatureSet> {
        let grid = image.resize(SHAPE_GRID, SHAPE_GRID)?;
        // Keep complexity comparable with full-resolution methods
        let source_pixels = image.width() as f64 * image.height() as f64;
        let grid_pixels = (SHAPE_GRID * SHAPE_GRID) as f64;
        let extraction = ExtractionParams {
            complexity_scale: params.extraction.complexity_scale * grid_pixels / source_pixels,
            ..params.extraction
        };
        Ok(extract_features(&grid, Method::ShapeStats.features(), &extraction))
    }

    fn extract_mock(image: &GrayImage, params: &MethodParams) -> FeatureSet {
        let metrics = ShapeMetrics::measure(image, params.extraction.dark_threshold);
        let mut rng = StdRng::seed_from_u64(mock_seed(params.mock_seed, &metrics, image));
        FeatureSet::new()
            .with_scalar(Feature::AspectRatio, rng.gen_range(0.5..1.5))
            .with_scalar(Feature::Circularity, rng.gen_range(0.1..0.8))
            .with_scalar(Feature::Complexity, rng.gen_range(0.0..1.0))
            .with_scalar(Feature::Symmetry, rng.gen_range(0.3..0.9))
    }
}

/// Mix the configured seed with simple pixel statistics so different
/// drawings get different draws while each drawing stays reproducible.
fn mock_seed(seed: u64, metrics: &ShapeMetrics, image: &GrayImage) -> u64 {
    let dims = ((image.width() as u64) << 32) | image.height() as u64;
    seed ^ metrics.ink_pixels.rotate_left(17) ^ dims
}

impl AnalysisMethod for Method {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn extract(&self, image: &GrayImage, params: &MethodParams) -> Result<FeatureSet> {
        match self {
            Method::VisionLike | Method::PatternMatch => {
                let metrics = ShapeMetrics::measure(image, params.extraction.dark_threshold);
                Ok(features_from_metrics(&metrics, self.features(), &params.extraction))
            }
            Method::ShapeStats => Self::extract_shape_stats(image, params),
            Method::Mock => Ok(Self::extract_mock(image, params)),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
