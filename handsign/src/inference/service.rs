//! Predict request handling
//!
//! ```text
//! POST /predict {"features": [[f32; 126]; 30]}
//!   200 {"label": "hello", "confidence": 92.4}
//!   400 {"error": "Invalid feature shape: expected (30, 126), found (30, 100)"}
//!   500 {"error": "..."}
//! ```
//!
//! The window shape is checked before the classifier is called.

use crate::capture::SequenceWindow;
use crate::classifier::SequenceClassifier;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Route the endpoint is served under
pub const PREDICT_PATH: &str = "/predict";

/// One window of frame feature vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub features: Vec<Vec<f32>>,
}

impl PredictRequest {
    pub fn from_window(window: &SequenceWindow) -> Self {
        Self {
            features: window.to_rows(),
        }
    }
}

/// Response body. Confidence is a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Prediction { label: String, confidence: f32 },
    Failure { error: String },
}

/// Status code plus body
#[derive(Debug, Clone, PartialEq)]
pub struct PredictReply {
    pub status: StatusCode,
    pub body: PredictResponse,
}

impl PredictReply {
    fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: PredictResponse::Failure { error: message.into() },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(&self.body)?)
    }
}

/// Classify one request.
///
/// Shape problems are client errors (400); classifier faults are server
/// errors (500). Both carry a human-readable `error` message.
pub fn handle_predict(classifier: &dyn SequenceClassifier, request: &PredictRequest) -> PredictReply {
    let expected = classifier.input_shape();
    let window = match SequenceWindow::from_rows(&request.features, expected) {
        Ok(window) => window,
        Err(crate::Error::ShapeMismatch { expected, found }) => {
            warn!(%expected, %found, "rejecting predict request");
            return PredictReply::failure(
                StatusCode::BAD_REQUEST,
                format!("Invalid feature shape: expected {}, found {}", expected, found),
            );
        }
        Err(e) => return PredictReply::failure(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match classifier.classify(&window) {
        Ok(results) => match results.into_iter().next() {
            Some(top) => {
                debug!(label = %top.label, confidence = top.confidence, "predict ok");
                PredictReply {
                    status: StatusCode::OK,
                    body: PredictResponse::Prediction {
                        confidence: top.confidence_percent(),
                        label: top.label,
                    },
                }
            }
            None => PredictReply::failure(StatusCode::INTERNAL_SERVER_ERROR, "classifier returned no classes"),
        },
        Err(e) => {
            error!(error = %e, "predict failed");
            PredictReply::failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Parse a raw JSON body and classify it. Unparseable bodies are client errors.
pub fn handle_predict_json(classifier: &dyn SequenceClassifier, body: &str) -> PredictReply {
    match serde_json::from_str::<PredictRequest>(body) {
        Ok(request) => handle_predict(classifier, &request),
        Err(e) => {
            warn!(error = %e, "malformed predict request");
            PredictReply::failure(StatusCode::BAD_REQUEST, format!("Malformed request: {}", e))
        }
    }
}
