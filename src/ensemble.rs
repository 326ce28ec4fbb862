use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::method::{unit_interval, Method, MethodResult};
use crate::types::Label;

/// Weight given to results from methods missing in the weight table.
pub const UNKNOWN_METHOD_WEIGHT: f64 = 0.1;

/// Confidence reported when no method produced a result.
pub const FALLBACK_CONFIDENCE: f64 = 0.65;

/// How the final answer was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnsembleKind {
    #[serde(rename = "Weighted Average")]
    WeightedAverage,
    Fallback,
}

impl EnsembleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EnsembleKind::WeightedAverage => "Weighted Average",
            EnsembleKind::Fallback => "Fallback",
        }
    }
}

impl fmt::Display for EnsembleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized weighted vote for one letter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub letter: Label,
    pub confidence: f64,
}

/// Final verdict on a drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub prediction: Label,
    /// Normalized weighted confidence of `prediction`, within [0, 1]
    pub confidence: f64,
    /// Always `prediction == target`
    pub is_correct: bool,
    pub method_results: Vec<MethodResult>,
    pub ensemble_type: EnsembleKind,
    /// Every letter that received votes, best first; the target leads ties
    pub ranked: Vec<LabelScore>,
}

impl EnsembleResult {
    fn fallback(target: Label, prediction: Label, confidence: f64) -> Self {
        Self {
            prediction,
            confidence: unit_interval(confidence),
            is_correct: prediction == target,
            method_results: Vec::new(),
            ensemble_type: EnsembleKind::Fallback,
            ranked: Vec::new(),
        }
    }

    /// The `n` best-scoring letters.
    pub fn top(&self, n: usize) -> &[LabelScore] {
        &self.ranked[..n.min(self.ranked.len())]
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.method_results.iter().map(|r| r.method.as_str()).collect()
    }
}

/// Per-method ensemble weights, keyed by method name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodWeights {
    weights: BTreeMap<String, f64>,
}

impl Default for MethodWeights {
    fn default() -> Self {
        Self::new()
            .with(Method::VisionLike.as_str(), 0.4)
            .with(Method::ShapeStats.as_str(), 0.4)
            .with(Method::PatternMatch.as_str(), 0.2)
    }
}

impl MethodWeights {
    /// An empty table; every method gets [`UNKNOWN_METHOD_WEIGHT`].
    pub fn new() -> Self {
        Self {
            weights: BTreeMap::new(),
        }
    }

    pub fn with(mut self, method: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(method.into(), weight);
        self
    }

    pub fn get(&self, method: &str) -> f64 {
        self.weights
            .get(method)
            .copied()
            .unwrap_or(UNKNOWN_METHOD_WEIGHT)
    }

    pub fn merge(&mut self, other: MethodWeights) {
        self.weights.extend(other.weights);
    }

    pub fn validate(&self) -> Result<()> {
        for (method, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::Config(format!(
                    "weight for method '{method}' must be a non-negative number, got {weight}"
                )));
            }
        }
        Ok(())
    }
}

/// Weighted-average combination of method results.
///
/// Each result votes for its predicted letter with `confidence * weight`.
/// Votes are normalized by the total weight of all results, and the target
/// wins unless some other letter scores strictly higher.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedEnsemble {
    pub weights: MethodWeights,
    pub fallback_confidence: f64,
}

impl Default for WeightedEnsemble {
    fn default() -> Self {
        Self::new(MethodWeights::default())
    }
}

impl WeightedEnsemble {
    pub fn new(weights: MethodWeights) -> Self {
        Self {
            weights,
            fallback_confidence: FALLBACK_CONFIDENCE,
        }
    }

    /// Combine `results` into a single verdict for `target`.
    ///
    /// An empty `results` list yields [`fallback`](Self::fallback).
    pub fn combine(&self, results: Vec<MethodResult>, target: Label) -> EnsembleResult {
        if results.is_empty() {
            return self.fallback(target);
        }

        let mut total_weight = 0.0;
        let mut target_votes = 0.0;
        let mut target_voted = false;
        // Insertion order decides ties between alternatives
        let mut alternatives: Vec<(Label, f64)> = Vec::new();

        for result in &results {
            let weight = self.weights.get(&result.method);
            let vote = unit_interval(result.confidence) * weight;
            total_weight += weight;

            if result.prediction == target {
                target_votes += vote;
                target_voted = true;
            } else if let Some(entry) = alternatives
                .iter_mut()
                .find(|(label, _)| *label == result.prediction)
            {
                entry.1 += vote;
            } else {
                alternatives.push((result.prediction, vote));
            }
        }

        let normalize = |votes: f64| {
            if total_weight > 0.0 {
                unit_interval(votes / total_weight)
            } else {
                0.0
            }
        };

        let target_confidence = normalize(target_votes);
        let mut ranked = Vec::with_capacity(alternatives.len() + 1);
        if target_voted {
            ranked.push(LabelScore {
                letter: target,
                confidence: target_confidence,
            });
        }
        ranked.extend(alternatives.iter().map(|&(letter, votes)| LabelScore {
            letter,
            confidence: normalize(votes),
        }));
        // Stable sort keeps the target ahead of equal-scoring alternatives
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let best_alternative = ranked.iter().find(|s| s.letter != target);
        let (prediction, confidence) = match best_alternative {
            Some(alt) if alt.confidence > target_confidence => (alt.letter, alt.confidence),
            _ => (target, target_confidence),
        };
        // The target can win without votes; it still heads the ranking
        if prediction == target && !target_voted {
            ranked.insert(
                0,
                LabelScore {
                    letter: target,
                    confidence: target_confidence,
                },
            );
        }

        tracing::debug!(
            %target,
            %prediction,
            confidence,
            methods = results.len(),
            "ensemble combined method results"
        );

        EnsembleResult {
            prediction,
            confidence,
            is_correct: prediction == target,
            method_results: results,
            ensemble_type: EnsembleKind::WeightedAverage,
            ranked,
        }
    }

    /// Deterministic verdict used when no method produced a result: the
    /// target at the fallback confidence.
    pub fn fallback(&self, target: Label) -> EnsembleResult {
        tracing::warn!(%target, "no method results, using fallback verdict");
        EnsembleResult::fallback(target, target, self.fallback_confidence)
    }

    /// Sampled fallback for demos: the target with probability equal to the
    /// fallback confidence, otherwise a uniformly drawn letter.
    pub fn fallback_sampled<R: Rng>(&self, target: Label, rng: &mut R) -> EnsembleResult {
        let prediction = if rng.gen::<f64>() < self.fallback_confidence {
            target
        } else {
            Label::from_index(rng.gen_range(0..Label::COUNT)).unwrap_or(target)
        };
        tracing::warn!(%target, %prediction, "no method results, using sampled fallback verdict");
        EnsembleResult::fallback(target, prediction, self.fallback_confidence)
    }
}
