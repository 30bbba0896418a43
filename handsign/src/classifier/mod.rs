//! Sequence classification
//!
//! A trained [`SequenceModel`] and its [`GestureClassCatalog`] are loaded together
//! into a [`Classifier`], which is read-only afterwards and can be shared across
//! sessions. Recognition consumes any [`SequenceClassifier`], so a remote endpoint
//! ([`RemoteClassifier`]) can stand in for the local model.

pub mod artifact;
pub mod catalog;
pub mod model;
pub mod local;
pub mod http_retry;
pub mod remote;

pub use catalog::GestureClassCatalog;
pub use model::{CentroidModel, SequenceModel, DEFAULT_TEMPERATURE};
pub use local::{write_artifacts, Classifier};
pub use remote::{RemoteClassifier, RemoteSettings};

use crate::capture::{SequenceWindow, WindowShape};
use serde::{Deserialize, Serialize};

/// One class and its probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    /// Probability in `[0, 1]`
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Confidence as a percentage, the unit shown to users
    pub fn confidence_percent(&self) -> f32 {
        self.confidence * 100.0
    }
}

impl std::fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.1}%)", self.label, self.confidence_percent())
    }
}

/// Anything that can classify a full window.
///
/// Results are ranked by descending confidence; the first entry is the top-1
/// prediction. Implementations hold no per-session state.
pub trait SequenceClassifier: Send + Sync {
    /// Window shape this classifier accepts
    fn input_shape(&self) -> WindowShape;

    fn classify(&self, window: &SequenceWindow) -> crate::Result<Vec<ClassificationResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_display_uses_percent() {
        let result = ClassificationResult::new("hello", 0.925);
        assert_eq!(result.to_string(), "hello (92.5%)");
        assert!((result.confidence_percent() - 92.5).abs() < 1e-4);
    }
}
