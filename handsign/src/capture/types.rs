//! Core data types for the landmark pipeline
//!
//! These types carry one frame's detections from the external landmark detector
//! through feature extraction into fixed-shape sequence windows.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Landmarks reported per hand by the detector
pub const LANDMARKS_PER_HAND: usize = 21;

/// Hands encoded per frame
pub const DEFAULT_MAX_HANDS: usize = 2;

/// Coordinates per landmark (x, y, z)
pub const COORDS_PER_LANDMARK: usize = 3;

/// Frames per window unless configured otherwise
pub const DEFAULT_SEQUENCE_LENGTH: usize = 30;

/// Wrist landmark index, used for hand ordering
pub const WRIST: usize = 0;

/// One landmark in normalized image coordinates.
///
/// `x` and `y` are in 0..1 relative to the frame; `z` is relative depth.
/// Serialized as a `[x, y, z]` triple.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<[f32; 3]> for Landmark {
    fn from(p: [f32; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

impl From<Landmark> for [f32; 3] {
    fn from(l: Landmark) -> Self {
        [l.x, l.y, l.z]
    }
}

/// One hand's landmark set from a single frame.
///
/// Produced per frame by the detector and consumed immediately.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandDetection {
    landmarks: Vec<Landmark>,
}

impl HandDetection {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    /// Build a detection from raw `[x, y, z]` points
    pub fn from_points(points: &[[f32; 3]]) -> Self {
        Self::new(points.iter().copied().map(Landmark::from).collect())
    }

    /// Raw x-coordinate of the wrist (landmark 0). A detection without landmarks
    /// sorts first.
    pub fn wrist_x(&self) -> f32 {
        self.landmarks
            .get(WRIST)
            .map(|l| l.x)
            .unwrap_or(f32::NEG_INFINITY)
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

/// Shape of the per-frame feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureLayout {
    /// Hands encoded per frame; extra detections are discarded
    pub max_hands: usize,
    /// Landmarks encoded per hand
    pub landmarks_per_hand: usize,
}

impl FeatureLayout {
    pub const fn new(max_hands: usize, landmarks_per_hand: usize) -> Self {
        Self {
            max_hands,
            landmarks_per_hand,
        }
    }

    /// Values contributed by one hand
    pub const fn hand_block(&self) -> usize {
        self.landmarks_per_hand * COORDS_PER_LANDMARK
    }

    /// Length of every frame feature vector (126 for the default layout)
    pub const fn feature_size(&self) -> usize {
        self.max_hands * self.hand_block()
    }
}

impl Default for FeatureLayout {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HANDS, LANDMARKS_PER_HAND)
    }
}

/// Shape `(frames, features)` of a sequence window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowShape {
    pub frames: usize,
    pub features: usize,
}

impl WindowShape {
    pub const fn new(frames: usize, features: usize) -> Self {
        Self { frames, features }
    }

    pub const fn for_layout(layout: FeatureLayout, frames: usize) -> Self {
        Self::new(frames, layout.feature_size())
    }

    pub const fn as_tuple(&self) -> (usize, usize) {
        (self.frames, self.features)
    }

    pub const fn element_count(&self) -> usize {
        self.frames * self.features
    }
}

impl Default for WindowShape {
    fn default() -> Self {
        Self::for_layout(FeatureLayout::default(), DEFAULT_SEQUENCE_LENGTH)
    }
}

impl std::fmt::Display for WindowShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.frames, self.features)
    }
}

/// Fixed-length feature vector for one frame. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameFeatures(Vec<f32>);

impl FrameFeatures {
    /// All-zero vector for a frame with no hands
    pub fn zeros(layout: FeatureLayout) -> Self {
        Self(vec![0.0; layout.feature_size()])
    }

    /// Wrap raw values, rejecting anything that is not exactly the layout's size
    pub fn from_vec(values: Vec<f32>, layout: FeatureLayout) -> crate::Result<Self> {
        if values.len() != layout.feature_size() {
            return Err(crate::Error::ShapeMismatch {
                expected: layout.feature_size().to_string(),
                found: values.len().to_string(),
            });
        }
        Ok(Self(values))
    }

    pub(crate) fn from_exact(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

/// An ordered run of frame feature vectors classified as one unit.
///
/// Always rectangular: every row has the same number of features.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceWindow {
    data: Array2<f32>,
}

impl SequenceWindow {
    /// Stack frames into a window. Fails on an empty list or ragged frames.
    pub fn from_frames(frames: &[FrameFeatures]) -> crate::Result<Self> {
        let rows: Vec<&[f32]> = frames.iter().map(FrameFeatures::as_slice).collect();
        Self::from_slices(&rows)
    }

    /// Build a window from nested rows, checking them against `expected`.
    pub fn from_rows(rows: &[Vec<f32>], expected: WindowShape) -> crate::Result<Self> {
        let ragged = rows.iter().any(|r| r.len() != expected.features);
        if rows.len() != expected.frames || ragged {
            let found_cols = match rows.first() {
                Some(first) if rows.iter().all(|r| r.len() == first.len()) => first.len().to_string(),
                Some(_) => "ragged".to_string(),
                None => "0".to_string(),
            };
            return Err(crate::Error::ShapeMismatch {
                expected: expected.to_string(),
                found: format!("({}, {})", rows.len(), found_cols),
            });
        }
        let slices: Vec<&[f32]> = rows.iter().map(Vec::as_slice).collect();
        Self::from_slices(&slices)
    }

    fn from_slices(rows: &[&[f32]]) -> crate::Result<Self> {
        let frames = rows.len();
        let features = rows.first().map(|r| r.len()).unwrap_or(0);
        if frames == 0 || features == 0 {
            return Err(crate::Error::InvalidInput("window must not be empty".to_string()));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != features) {
            return Err(crate::Error::ShapeMismatch {
                expected: features.to_string(),
                found: bad.len().to_string(),
            });
        }
        let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        let data = Array2::from_shape_vec((frames, features), flat)
            .map_err(|e| crate::Error::InvalidInput(e.to_string()))?;
        Ok(Self { data })
    }

    pub fn from_array(data: Array2<f32>) -> Self {
        Self { data }
    }

    pub fn shape(&self) -> WindowShape {
        let (frames, features) = self.data.dim();
        WindowShape::new(frames, features)
    }

    /// Fail with `ShapeMismatch` unless this window is exactly `expected`
    pub fn ensure_shape(&self, expected: WindowShape) -> crate::Result<()> {
        if self.shape() != expected {
            return Err(crate::Error::shape_mismatch(
                expected.as_tuple(),
                self.shape().as_tuple(),
            ));
        }
        Ok(())
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn into_array(self) -> Array2<f32> {
        self.data
    }

    /// Rows as nested vectors, the shape used by the remote inference request
    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        self.data.outer_iter().map(|row| row.to_vec()).collect()
    }
}
