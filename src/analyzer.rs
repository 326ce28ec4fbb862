use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::AnalyzerConfig;
use crate::ensemble::{EnsembleResult, WeightedEnsemble};
use crate::error::{Error, Result};
use crate::features::{GrayImage, ImageAccess};
use crate::feedback;
use crate::method::{AnalysisMethod, Method, MethodParams};
use crate::profile::LetterTables;
use crate::types::Label;

type BoxedMethod = Box<dyn AnalysisMethod + Send + Sync>;

/// Verdict on one drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub target: Label,
    pub result: EnsembleResult,
    pub feedback: String,
    pub processing_time: Duration,
}

impl Analysis {
    /// Wall-clock analysis time in whole milliseconds.
    pub fn processing_ms(&self) -> u64 {
        self.processing_time.as_millis() as u64
    }
}

/// Runs every configured method on a drawing and combines the results.
///
/// An `Analyzer` is immutable once built and can be shared between threads.
pub struct Analyzer {
    methods: Vec<BoxedMethod>,
    tables: LetterTables,
    params: MethodParams,
    ensemble: WeightedEnsemble,
}

impl Analyzer {
    /// Analyzer for a validated configuration.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let builder = config
            .analysis
            .methods
            .iter()
            .fold(AnalyzerBuilder::new(), |b, &m| b.method(m));
        builder
            .tables(config.letter_tables())
            .params(config.method_params())
            .ensemble(config.ensemble())
            .build()
    }

    pub fn builder() -> AnalyzerBuilder {
        AnalyzerBuilder::new()
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.iter().map(|m| m.name()).collect()
    }

    pub fn tables(&self) -> &LetterTables {
        &self.tables
    }

    pub fn params(&self) -> &MethodParams {
        &self.params
    }

    pub fn ensemble(&self) -> &WeightedEnsemble {
        &self.ensemble
    }

    /// Parse `target` and analyze `image` against it.
    pub fn analyze_str(&self, image: &GrayImage, target: &str) -> Result<Analysis> {
        let target = target.trim();
        if target.is_empty() {
            return Err(Error::InvalidInput("target letter is required".to_string()));
        }
        self.analyze(image, target.parse()?)
    }

    /// Score `image` as an attempt at writing `target`.
    ///
    /// A method that fails is logged and left out of the vote; if none
    /// succeed the ensemble's fallback verdict is returned.
    pub fn analyze(&self, image: &GrayImage, target: Label) -> Result<Analysis> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::InvalidInput(format!(
                "image must not be empty (got {}x{})",
                image.width(),
                image.height()
            )));
        }

        let start = Instant::now();
        let results = self
            .methods
            .iter()
            .filter_map(|method| {
                match method.analyze(image, target, &self.tables, &self.params) {
                    Ok(result) => Some(result),
                    Err(e) => {
                        warn!(method = method.name(), error = %e, "analysis method failed");
                        None
                    }
                }
            })
            .collect();
        let result = self.ensemble.combine(results, target);
        let feedback = feedback::generate(&result, target);
        let processing_time = start.elapsed();

        info!(
            %target,
            prediction = %result.prediction,
            confidence = result.confidence,
            correct = result.is_correct,
            ensemble = %result.ensemble_type,
            elapsed_ms = processing_time.as_millis() as u64,
            "drawing analyzed"
        );

        Ok(Analysis {
            target,
            result,
            feedback,
            processing_time,
        })
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Method::STANDARD
            .iter()
            .fold(AnalyzerBuilder::new(), |b, &m| b.method(m))
            .into_analyzer()
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("methods", &self.method_names())
            .field("tables", &self.tables)
            .field("params", &self.params)
            .field("ensemble", &self.ensemble)
            .finish()
    }
}

/// Builder for creating an [`Analyzer`].
///
/// Unset parts take their built-in defaults. No method is added implicitly;
/// an analyzer without methods always returns the fallback verdict.
pub struct AnalyzerBuilder {
    methods: Vec<BoxedMethod>,
    tables: LetterTables,
    params: MethodParams,
    ensemble: WeightedEnsemble,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
            tables: LetterTables::default(),
            params: MethodParams::default(),
            ensemble: WeightedEnsemble::default(),
        }
    }

    /// Add a method. Methods run in the order they are added.
    pub fn method<M>(mut self, method: M) -> Self
    where
        M: AnalysisMethod + Send + Sync + 'static,
    {
        self.methods.push(Box::new(method));
        self
    }

    pub fn tables(mut self, tables: LetterTables) -> Self {
        self.tables = tables;
        self
    }

    pub fn params(mut self, params: MethodParams) -> Self {
        self.params = params;
        self
    }

    pub fn ensemble(mut self, ensemble: WeightedEnsemble) -> Self {
        self.ensemble = ensemble;
        self
    }

    /// Validate the tables and weights and build the analyzer.
    pub fn build(self) -> Result<Analyzer> {
        self.tables.validate()?;
        self.ensemble.weights.validate()?;
        Ok(self.into_analyzer())
    }

    fn into_analyzer(self) -> Analyzer {
        Analyzer {
            methods: self.methods,
            tables: self.tables,
            params: self.params,
            ensemble: self.ensemble,
        }
    }
}

impl Default for AnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
