//! Training pipeline boundary
//!
//! Consumes a validated corpus and produces the model + catalog artifact pair.
//! The reference model is a nearest-centroid classifier; the data contract
//! (window shape, sorted label encoding) is what any other trainer must honor.

pub mod split;
pub mod metrics;
pub mod pipeline;

pub use split::{stratified_split, DatasetSplit, SplitFractions, SplitMix64};
pub use metrics::ConfusionMatrix;
pub use pipeline::{evaluate, TrainingOptions, TrainingPipeline, TrainingReport};
