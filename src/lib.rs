//! # akuru
//!
//! Pure Rust scoring for handwritten Sinhala letter practice.
//!
//! This crate provides:
//! - **Shape Metrics**: ink density, bounding box, stroke width, aspect ratio,
//!   complexity, circularity and symmetry of a grayscale drawing
//! - **Analysis Methods**: independent feature extractors, each scored against
//!   per-letter expected-feature profiles
//! - **Ensemble**: a weighted vote over the methods' predictions, with
//!   player-facing feedback
//! - **Server** (feature `server`): the HTTP endpoints a practice canvas talks to
//!
//! ## Pipeline
//!
//! 1. Decode the canvas snapshot to grayscale, with transparency on white
//! 2. For each configured method:
//!    - Extract the method's [`FeatureSet`]
//!    - Compare it with the target letter's [`LabelProfile`]
//!    - Predict the target when similarity clears the decision threshold,
//!      otherwise the nearest confusable letter
//! 3. Combine the method results by weighted vote ([`WeightedEnsemble`])
//! 4. Render feedback for the verdict
//!
//! ## Quick Start
//!
//! ```rust
//! use akuru::{Analyzer, GrayImage};
//!
//! let analyzer = Analyzer::default();
//!
//! // A ring drawn on a white canvas
//! let image = GrayImage::from_fn(280, 280, |x, y| {
//!     let (dx, dy) = (x as i64 - 140, y as i64 - 140);
//!     let r2 = dx * dx + dy * dy;
//!     if (60 * 60..=72 * 72).contains(&r2) { 0 } else { 255 }
//! });
//!
//! let analysis = analyzer.analyze_str(&image, "ප").unwrap();
//! println!(
//!     "{} ({:.0}%): {}",
//!     analysis.result.prediction,
//!     analysis.result.confidence * 100.0,
//!     analysis.feedback
//! );
//! ```
//!
//! ## Custom Methods
//!
//! Implement [`AnalysisMethod`] to add your own extractor; scoring against
//! the letter profiles comes for free:
//!
//! ```rust
//! use akuru::{AnalysisMethod, Analyzer, Feature, FeatureSet, GrayImage, MethodParams, Result};
//!
//! struct Tall;
//!
//! impl AnalysisMethod for Tall {
//!     fn name(&self) -> &str { "tall" }
//!     fn extract(&self, _image: &GrayImage, _params: &MethodParams) -> Result<FeatureSet> {
//!         Ok(FeatureSet::new().with_scalar(Feature::AspectRatio, 2.0))
//!     }
//! }
//!
//! let analyzer = Analyzer::builder().method(Tall).build().unwrap();
//! assert_eq!(analyzer.method_names(), vec!["tall"]);
//! ```

mod analyzer;
mod config;
pub mod decode;
mod ensemble;
mod error;
mod features;
pub mod feedback;
mod method;
mod metrics;
mod profile;
#[cfg(feature = "server")]
pub mod server;
mod types;

pub use analyzer::{Analysis, Analyzer, AnalyzerBuilder};
pub use config::{AnalysisConfig, AnalyzerConfig, MockConfig, ServerConfig};
pub use ensemble::{
    EnsembleKind, EnsembleResult, LabelScore, MethodWeights, WeightedEnsemble,
    FALLBACK_CONFIDENCE, UNKNOWN_METHOD_WEIGHT,
};
pub use error::{Error, Result};
pub use features::{
    extract_features, features_from_metrics, ExtractionParams, Feature, FeatureSet, FeatureValue,
    GrayImage, ImageAccess,
};
pub use method::{
    score_features, AnalysisMethod, Method, MethodParams, MethodResult, DECISION_THRESHOLD,
    DEFAULT_CONFIDENCE, SHAPE_GRID,
};
pub use metrics::{ShapeMetrics, DEFAULT_COMPLEXITY_SCALE, DEFAULT_DARK_THRESHOLD};
pub use profile::{
    default_confusables, default_profiles, ConfusableTable, Confusion, LabelProfile, LetterTables,
    ProfileTable,
};
pub use types::{BoundingBox, Label, ALPHABET};

/// Install a `tracing` subscriber that logs to stderr.
///
/// `RUST_LOG` takes precedence over `default_filter`. Intended for binaries;
/// calling it twice panics.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
