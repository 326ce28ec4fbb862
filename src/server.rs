//! HTTP surface for the practice front end.
//!
//! | Route                | Response                                   |
//! |----------------------|--------------------------------------------|
//! | `POST /predict`      | verdict, feedback and per-method breakdown |
//! | `GET /health`        | liveness and configured methods            |
//! | `GET /letters`       | the practice alphabet                      |
//! | `GET /random-letter` | one letter to practise next                |
//!
//! Errors are reported as `{"error": ..., "status": "error"}`. Client
//! mistakes get a 400 with a readable message; every other failure is a 500
//! with a generic message and the details go to the log.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::analyzer::{Analysis, Analyzer};
use crate::decode::{decode_data_url_within, DEFAULT_MAX_IMAGE_SIDE};
use crate::ensemble::{EnsembleKind, LabelScore};
use crate::error::Error;
use crate::types::{Label, ALPHABET};

pub const SERVER_NAME: &str = "akuru (Rust + axum)";
pub const MODEL_TYPE: &str = "Multi-AI Ensemble";

/// Number of ranked letters reported per prediction.
pub const TOP_PREDICTIONS: usize = 3;

/// Shared handler state. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<Analyzer>,
    rng: Arc<Mutex<StdRng>>,
    max_image_side: u32,
}

impl AppState {
    /// State around `analyzer`; `random_seed` fixes the practice-letter
    /// sequence, otherwise it is seeded from entropy.
    pub fn new(analyzer: Analyzer, random_seed: Option<u64>) -> Self {
        let rng = match random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            analyzer: Arc::new(analyzer),
            rng: Arc::new(Mutex::new(rng)),
            max_image_side: DEFAULT_MAX_IMAGE_SIDE,
        }
    }

    /// Reject canvases wider or taller than `side` pixels.
    pub fn with_max_image_side(mut self, side: u32) -> Self {
        self.max_image_side = side;
        self
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    fn random_letter(&self) -> Label {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Label::from_index(rng.gen_range(0..Label::COUNT)).unwrap_or(Label::at(0))
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .route("/letters", get(letters))
        .route("/random-letter", get(random_letter))
        .with_state(state)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub target_letter: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    pub prediction: Label,
    /// Rounded to three decimals
    pub confidence: f64,
    pub status: &'static str,
    pub feedback: String,
    pub ai_analysis: AiAnalysis,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub model_type: &'static str,
    /// Milliseconds
    pub processing_time: u64,
    pub is_correct: bool,
    pub ensemble_type: EnsembleKind,
    pub method_count: usize,
    pub methods: Vec<String>,
    pub top_predictions: Vec<LabelScore>,
}

impl From<Analysis> for PredictResponse {
    fn from(analysis: Analysis) -> Self {
        let processing_time = analysis.processing_ms();
        let result = analysis.result;
        let top_predictions = result
            .top(TOP_PREDICTIONS)
            .iter()
            .map(|s| LabelScore {
                letter: s.letter,
                confidence: round3(s.confidence),
            })
            .collect();
        Self {
            prediction: result.prediction,
            confidence: round3(result.confidence),
            status: "success",
            feedback: analysis.feedback,
            ai_analysis: AiAnalysis {
                model_type: MODEL_TYPE,
                processing_time,
                is_correct: result.is_correct,
                ensemble_type: result.ensemble_type,
                method_count: result.method_results.len(),
                methods: result.method_results.into_iter().map(|r| r.method).collect(),
                top_predictions,
            },
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Error body returned by every route.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "AI analysis failed".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_client_error() {
            warn!(error = %err, "rejected prediction request");
            Self::bad_request(err.to_string())
        } else {
            error!(error = %err, "prediction failed");
            Self::internal()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": "error",
        }));
        (self.status, body).into_response()
    }
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection, "unreadable prediction request");
        ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let image = request.image.as_deref().map(str::trim).unwrap_or_default();
    let target = request.target_letter.as_deref().map(str::trim).unwrap_or_default();
    if image.is_empty() || target.is_empty() {
        return Err(ApiError::bad_request(
            "Image data and target letter required",
        ));
    }

    let target: Label = target.parse()?;
    info!(%target, "analysis starting");

    // Decoding and scoring are CPU-bound
    let image = image.to_string();
    let analyzer = Arc::clone(&state.analyzer);
    let max_side = state.max_image_side;
    let analysis = tokio::task::spawn_blocking(move || {
        let drawing = decode_data_url_within(&image, max_side)?;
        analyzer.analyze(&drawing, target)
    })
    .await
    .map_err(|e| {
        error!(error = %e, "analysis task failed");
        ApiError::internal()
    })??;
    Ok(Json(analysis.into()))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "server": SERVER_NAME,
        "ai_methods": state.analyzer.method_names(),
        "letters_supported": Label::COUNT,
    }))
}

async fn letters() -> Json<serde_json::Value> {
    Json(json!({ "letters": &ALPHABET[..] }))
}

async fn random_letter(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "letter": state.random_letter() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_three_decimals() {
        assert!((round3(0.45678) - 0.457).abs() < 1e-12);
        assert!((round3(1.0) - 1.0).abs() < 1e-12);
        assert!((round3(0.0004) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn error_mapping() {
        let e: ApiError = Error::UnknownLabel("Z".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert!(e.message.contains("Z"));

        let e: ApiError = Error::Decode("corrupt PNG chunk".into()).into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // Internal details are not returned
        assert_eq!(e.message, "AI analysis failed");
    }

    #[test]
    fn seeded_letters_repeat() {
        let a = AppState::new(Analyzer::default(), Some(11));
        let b = AppState::new(Analyzer::default(), Some(11));
        let seq_a: Vec<Label> = (0..10).map(|_| a.random_letter()).collect();
        let seq_b: Vec<Label> = (0..10).map(|_| b.random_letter()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn response_from_analysis() {
        let analyzer = Analyzer::default();
        let image = crate::features::GrayImage::from_fn(50, 50, |x, _| if x < 5 { 0 } else { 255 });
        let analysis = analyzer.analyze_str(&image, "ක").unwrap();
        let response = PredictResponse::from(analysis);

        assert_eq!(response.status, "success");
        assert_eq!(response.ai_analysis.model_type, MODEL_TYPE);
        assert_eq!(response.ai_analysis.method_count, 3);
        assert_eq!(
            response.ai_analysis.methods,
            vec!["vision_like", "shape_stats", "pattern_match"]
        );
        assert!(response.ai_analysis.top_predictions.len() <= TOP_PREDICTIONS);

        let json = serde_json::to_value(&response).unwrap();
        assert!(json["aiAnalysis"]["ensembleType"].is_string());
        assert!(json["aiAnalysis"]["topPredictions"].is_array());
    }
}
