//! # Handsign
//!
//! Real-time recognition of two-handed gestures from hand-landmark sequences.
//!
//! ## Overview
//!
//! An external detector turns each camera frame into zero or more hand landmark
//! sets. This crate turns those detections into fixed-size feature vectors, buffers
//! them into fixed-length windows, classifies each full window with a trained
//! sequence model, and stabilizes the raw prediction stream into label-change
//! events. The same pipeline records labeled training samples and checks the
//! integrity of the training corpus.
//!
//! ## Quick Start
//!
//! ```no_run
//! use handsign::capture::{FeatureLayout, HandDetection};
//! use handsign::classifier::Classifier;
//! use handsign::recognition::{FrameInput, RecognitionSettings, RecognitionStateMachine};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let classifier = Classifier::load(
//!     Path::new("artifacts/gesture_model.json"),
//!     Path::new("artifacts/label_catalog.json"),
//! ).expect("artifacts must load together");
//!
//! let settings = RecognitionSettings::new(FeatureLayout::default(), 30);
//! let mut machine = RecognitionStateMachine::new(settings);
//! machine.start_recognition().unwrap();
//!
//! let hands: Vec<HandDetection> = Vec::new(); // from the landmark detector
//! let output = machine.tick(Duration::ZERO, FrameInput::Hands(&hands), Some(&classifier));
//! println!("{:?}", output.overlay);
//! ```
//!
//! ## Architecture
//!
//! - [`capture`]: landmark types, feature extraction, the sequence buffer and frame sources
//! - [`classifier`]: class catalog, model artifacts, local and remote classifiers
//! - [`recognition`]: the recognition state machine and the session host loop
//! - [`dataset`]: sample persistence, corpus scanning, quarantine and admission policy
//! - [`training`]: split, fit, evaluate and write the model/catalog artifact pair
//! - [`inference`]: request/response shape of the remote inference endpoint
//! - [`app`]: CLI and configuration management
//!
//! ## Data Flow
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │ FrameSource │───▶│  Landmark   │───▶│   Feature   │───▶│  Sequence   │
//! │  (camera)   │    │  Detector   │    │  Extractor  │    │   Buffer    │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!                                                                 │ window ready
//!                                                                 ▼
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │ Speech/UI/  │◀───│ Label-change│◀───│ Recognition │◀───│ Classifier  │
//! │  HTTP sink  │    │   events    │    │State Machine│    │             │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//! ```

pub mod capture;
pub mod classifier;
pub mod recognition;
pub mod dataset;
pub mod training;
pub mod inference;
pub mod app;

use std::path::PathBuf;

// Re-export commonly used types
pub use capture::{FeatureExtractor, FeatureLayout, HandDetection, SequenceBuffer, SequenceWindow, WindowShape};
pub use classifier::{ClassificationResult, Classifier, GestureClassCatalog, SequenceClassifier};
pub use dataset::{Corpus, DatasetValidator, LabeledSample};
pub use recognition::{RecognitionEvent, RecognitionStateMachine};

/// Result type alias for the gesture pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the gesture pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Capture device error: {0}")]
    Device(String),

    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    #[error("Model artifact integrity error: {0}")]
    ArtifactIntegrity(String),

    #[error("Insufficient training data: {0}")]
    InsufficientData(String),

    #[error("Corrupt corpus file {path:?}: {reason}")]
    CorpusCorruption { path: PathBuf, reason: String },

    #[error("Quarantine failed for {} file(s): {}", failed.len(), describe_failures(failed))]
    Quarantine { failed: Vec<(PathBuf, String)> },

    #[error("Remote inference error: {0}")]
    Remote(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Array file error: {0}")]
    Npy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a shape mismatch from two `(rows, cols)` shapes.
    pub fn shape_mismatch(expected: (usize, usize), found: (usize, usize)) -> Self {
        Error::ShapeMismatch {
            expected: format!("({}, {})", expected.0, expected.1),
            found: format!("({}, {})", found.0, found.1),
        }
    }

    /// Errors that must stop the current workflow rather than being skipped or retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ArtifactIntegrity(_) | Error::InsufficientData(_) | Error::Config(_)
        )
    }

    /// Short message for end users. Device and artifact failures never share wording.
    pub fn user_message(&self) -> String {
        match self {
            Error::Device(_) => "Camera Error! Check that the capture device is connected.".to_string(),
            Error::ArtifactIntegrity(_) => {
                "Model files are missing or do not match. Retrain or restore the artifacts.".to_string()
            }
            Error::InsufficientData(msg) => format!("Not enough training data: {}", msg),
            other => other.to_string(),
        }
    }
}

fn describe_failures(failed: &[(PathBuf, String)]) -> String {
    failed
        .iter()
        .map(|(path, reason)| format!("{} ({})", path.display(), reason))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let err = Error::shape_mismatch((30, 126), (30, 100));
        assert_eq!(err.to_string(), "Shape mismatch: expected (30, 126), found (30, 100)");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::ArtifactIntegrity("missing".into()).is_fatal());
        assert!(Error::InsufficientData("one class".into()).is_fatal());
        assert!(!Error::Device("no frame".into()).is_fatal());
        assert!(!Error::shape_mismatch((1, 1), (2, 2)).is_fatal());
    }

    #[test]
    fn test_device_and_artifact_messages_are_distinct() {
        let device = Error::Device("read failed".into()).user_message();
        let artifact = Error::ArtifactIntegrity("catalog missing".into()).user_message();
        assert_ne!(device, artifact);
        assert!(device.contains("Camera"));
        assert!(artifact.contains("Model"));
    }

    #[test]
    fn test_quarantine_error_lists_files() {
        let err = Error::Quarantine {
            failed: vec![(PathBuf::from("/data/hello/a.npy"), "permission denied".into())],
        };
        let msg = err.to_string();
        assert!(msg.contains("1 file(s)"));
        assert!(msg.contains("a.npy"));
        assert!(msg.contains("permission denied"));
    }
}
