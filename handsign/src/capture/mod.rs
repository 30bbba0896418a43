//! Landmark capture module
//!
//! Turns per-frame hand detections into fixed-size feature vectors and buffers
//! them into fixed-length sequence windows. The camera and landmark detector
//! are reached through the [`FrameSource`] and [`LandmarkDetector`] seams.

pub mod types;
pub mod features;
pub mod sequence_buffer;
pub mod source;

pub use types::*;
pub use features::FeatureExtractor;
pub use sequence_buffer::{BufferStats, FrameOutcome, SequenceBuffer};
pub use source::{Frame, FramePayload, FrameSource, LandmarkDetector, LandmarkRecord, PrecomputedLandmarks, ReplaySource};
