//! Training corpus
//!
//! Persistence of labeled samples, the on-disk corpus layout, and the offline
//! integrity checks that keep the corpus consistent with the pipeline's
//! window shape.

pub mod sample;
pub mod corpus;
pub mod validator;
pub mod report;

pub use sample::{read_array, read_window, LabeledSample};
pub use corpus::{Corpus, DEFAULT_EXTENSION, DEFAULT_QUARANTINE_DIR};
pub use validator::{
    AdmissionPolicy, AdmissionReport, CorruptFile, CorruptReason, DatasetValidator, QuarantineReport, ScanReport,
};
pub use report::{distribution_chart, render_scan};
