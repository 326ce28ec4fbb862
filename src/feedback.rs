//! Player-facing feedback for an ensemble verdict.

use serde::{Deserialize, Serialize};

use crate::ensemble::EnsembleResult;
use crate::types::Label;

/// Which feedback template applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackTone {
    /// Correct, above 85%
    Excellent,
    /// Correct, above 70%
    Correct,
    /// Correct, 70% or lower
    Moderate,
    /// Wrong letter, agreed on by several methods
    Incorrect,
    /// Wrong letter from a single method
    Mismatch,
}

/// Confidence as a whole percentage, rounded half away from zero.
pub fn confidence_percent(confidence: f64) -> u32 {
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u32
}

pub fn tone(result: &EnsembleResult) -> FeedbackTone {
    let percent = confidence_percent(result.confidence);
    match (result.is_correct, percent) {
        (false, _) if result.method_results.len() > 1 => FeedbackTone::Incorrect,
        (false, _) => FeedbackTone::Mismatch,
        (true, p) if p > 85 => FeedbackTone::Excellent,
        (true, p) if p > 70 => FeedbackTone::Correct,
        (true, _) => FeedbackTone::Moderate,
    }
}

/// Render the feedback message for `result` against `target`.
pub fn generate(result: &EnsembleResult, target: Label) -> String {
    let percent = confidence_percent(result.confidence);
    match tone(result) {
        FeedbackTone::Excellent => format!(
            "Excellent! Multi-method analysis confirms '{target}' with {percent}% confidence!"
        ),
        FeedbackTone::Correct => {
            format!("Correct! The ensemble recognized '{target}' with {percent}% confidence.")
        }
        FeedbackTone::Moderate => format!(
            "Right answer! Confidence was moderate ({percent}%) - try writing '{target}' more clearly."
        ),
        FeedbackTone::Incorrect => format!(
            "Analysis is {percent}% confident it's '{}'. Expected '{target}'. Try again!",
            result.prediction
        ),
        FeedbackTone::Mismatch => format!(
            "Prediction: '{}' ({percent}% confident). Target: '{target}'.",
            result.prediction
        ),
    }
}
