//! Analyzer and server configuration.
//!
//! Every field has a built-in default, so an empty TOML document is a valid
//! configuration. Letter profiles and confusable groups given in the file are
//! laid over the built-in tables rather than replacing them.
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [analysis]
//! methods = ["vision_like", "shape_stats"]
//!
//! [weights]
//! vision_like = 0.6
//!
//! [profiles."ම"]
//! complexity = 0.55
//! aspect_ratio = 1.0
//!
//! [confusables]
//! "ම" = ["ව"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decode::DEFAULT_MAX_IMAGE_SIDE;
use crate::ensemble::{MethodWeights, WeightedEnsemble, FALLBACK_CONFIDENCE};
use crate::error::{Error, Result};
use crate::features::ExtractionParams;
use crate::method::{Method, MethodParams, DECISION_THRESHOLD, DEFAULT_CONFIDENCE};
use crate::metrics::{DEFAULT_COMPLEXITY_SCALE, DEFAULT_DARK_THRESHOLD};
use crate::profile::{
    default_confusables, default_profiles, ConfusableTable, LetterTables, ProfileTable,
};

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Seed for `GET /random-letter`; drawn from entropy when unset.
    pub random_seed: Option<u64>,
    /// Canvases wider or taller than this are rejected.
    pub max_image_side: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            random_seed: None,
            max_image_side: DEFAULT_MAX_IMAGE_SIDE,
        }
    }
}

impl ServerConfig {
    /// `address:port`, suitable for `TcpListener::bind`.
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Feature extraction and scoring thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Pixels strictly darker than this are ink.
    pub dark_threshold: u8,
    /// Ink pixel count at which complexity saturates.
    pub complexity_scale: f64,
    pub decision_threshold: f64,
    pub default_confidence: f64,
    pub fallback_confidence: f64,
    /// Methods run for each drawing, in order. May be empty.
    pub methods: Vec<Method>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            dark_threshold: DEFAULT_DARK_THRESHOLD,
            complexity_scale: DEFAULT_COMPLEXITY_SCALE,
            decision_threshold: DECISION_THRESHOLD,
            default_confidence: DEFAULT_CONFIDENCE,
            fallback_confidence: FALLBACK_CONFIDENCE,
            methods: Method::STANDARD.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    pub seed: u64,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub server: ServerConfig,
    pub analysis: AnalysisConfig,
    /// Per-method weights, laid over the defaults.
    pub weights: MethodWeights,
    pub mock: MockConfig,
    /// Extra or replacement letter profiles.
    pub profiles: ProfileTable,
    /// Extra or replacement confusable groups, keyed by group head.
    pub confusables: ConfusableTable,
}

impl AnalyzerConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `AKURU_*` environment variables. Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("AKURU_BIND_ADDRESS") {
            if !val.trim().is_empty() {
                self.server.bind_address = val.trim().to_string();
            }
        }
        if let Ok(val) = std::env::var("AKURU_PORT") {
            if let Ok(port) = val.trim().parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("AKURU_MOCK_SEED") {
            if let Ok(seed) = val.trim().parse::<u64>() {
                self.mock.seed = seed;
            }
        }
        if let Ok(val) = std::env::var("AKURU_RANDOM_SEED") {
            if let Ok(seed) = val.trim().parse::<u64>() {
                self.server.random_seed = Some(seed);
            }
        }
        if let Ok(val) = std::env::var("AKURU_MAX_IMAGE_SIDE") {
            if let Ok(side) = val.trim().parse::<u32>() {
                self.server.max_image_side = side;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        if !(a.complexity_scale.is_finite() && a.complexity_scale > 0.0) {
            return Err(Error::Config(format!(
                "analysis.complexity_scale must be positive, got {}",
                a.complexity_scale
            )));
        }
        for (name, value) in [
            ("decision_threshold", a.decision_threshold),
            ("default_confidence", a.default_confidence),
            ("fallback_confidence", a.fallback_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "analysis.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.server.bind_address.trim().is_empty() {
            return Err(Error::Config("server.bind_address is empty".to_string()));
        }
        if self.server.max_image_side == 0 {
            return Err(Error::Config("server.max_image_side must be positive".to_string()));
        }
        self.weights.validate()?;
        self.letter_tables().validate()
    }

    pub fn method_params(&self) -> MethodParams {
        MethodParams {
            extraction: ExtractionParams {
                dark_threshold: self.analysis.dark_threshold,
                complexity_scale: self.analysis.complexity_scale,
            },
            decision_threshold: self.analysis.decision_threshold,
            default_confidence: self.analysis.default_confidence,
            mock_seed: self.mock.seed,
        }
    }

    /// Built-in tables with this configuration's overlays applied.
    pub fn letter_tables(&self) -> LetterTables {
        let mut profiles = default_profiles();
        profiles.merge(self.profiles.clone());
        let mut confusables = default_confusables();
        confusables.merge(self.confusables.clone());
        LetterTables::new(profiles, confusables)
    }

    pub fn ensemble(&self) -> WeightedEnsemble {
        let mut weights = MethodWeights::default();
        weights.merge(self.weights.clone());
        WeightedEnsemble {
            weights,
            fallback_confidence: self.analysis.fallback_confidence,
        }
    }
}
