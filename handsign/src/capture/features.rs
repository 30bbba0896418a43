//! Feature extraction
//!
//! Converts one frame's hand detections into a fixed-size vector:
//! hands sorted left-to-right by wrist x, each hand's landmarks appended as
//! `x, y, z` in landmark-index order, missing hands zero-filled.
//!
//! Known limitation: when two hands cross horizontally mid-sequence their slots
//! swap. The ascending-wrist-x order is kept for compatibility with recorded corpora.

use super::types::{FeatureLayout, FrameFeatures, HandDetection};

/// Stateless per-frame feature extractor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureExtractor {
    layout: FeatureLayout,
}

impl FeatureExtractor {
    pub fn new(layout: FeatureLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    /// Extract the feature vector for one frame.
    ///
    /// Output length is always `layout.feature_size()`, for any number of
    /// detections. Each taken hand fills exactly one block: extra landmarks are
    /// dropped and missing ones are zero-filled, so a malformed detection never
    /// shifts the next hand's slot.
    pub fn extract(&self, detections: &[HandDetection]) -> FrameFeatures {
        let size = self.layout.feature_size();
        let mut ordered: Vec<&HandDetection> = detections.iter().collect();
        // Stable sort: ties keep detector order
        ordered.sort_by(|a, b| a.wrist_x().total_cmp(&b.wrist_x()));

        let mut values = Vec::with_capacity(size);
        for hand in ordered.into_iter().take(self.layout.max_hands) {
            let block_end = values.len() + self.layout.hand_block();
            for lm in hand.landmarks().iter().take(self.layout.landmarks_per_hand) {
                values.extend_from_slice(&[lm.x, lm.y, lm.z]);
            }
            values.resize(block_end, 0.0);
        }
        values.resize(size, 0.0);
        values.truncate(size);

        FrameFeatures::from_exact(values)
    }
}

/// Extract with an explicit layout
pub fn extract(detections: &[HandDetection], max_hands: usize, landmarks_per_hand: usize) -> FrameFeatures {
    FeatureExtractor::new(FeatureLayout::new(max_hands, landmarks_per_hand)).extract(detections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::{Landmark, LANDMARKS_PER_HAND};

    fn hand_at(wrist_x: f32, marker: f32) -> HandDetection {
        let mut points = vec![Landmark::new(marker, marker, marker); LANDMARKS_PER_HAND];
        points[0] = Landmark::new(wrist_x, 0.5, 0.0);
        HandDetection::new(points)
    }

    #[test]
    fn test_length_is_fixed_for_any_hand_count() {
        let extractor = FeatureExtractor::default();
        for count in 0..5 {
            let hands: Vec<_> = (0..count).map(|i| hand_at(i as f32 * 0.1, 0.2)).collect();
            assert_eq!(extractor.extract(&hands).len(), 126, "hands = {}", count);
        }
    }

    #[test]
    fn test_no_hands_is_all_zero() {
        let features = FeatureExtractor::default().extract(&[]);
        assert!(features.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_single_hand_pads_second_block() {
        let features = FeatureExtractor::default().extract(&[hand_at(0.4, 0.7)]);
        let values = features.as_slice();
        assert_eq!(values[0], 0.4);
        assert_eq!(values[3], 0.7);
        assert!(values[63..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_hands_sorted_by_wrist_x() {
        let left = hand_at(0.2, 0.11);
        let right = hand_at(0.8, 0.99);
        let extractor = FeatureExtractor::default();

        let a = extractor.extract(&[right.clone(), left.clone()]);
        let b = extractor.extract(&[left, right]);
        assert_eq!(a, b);
        assert_eq!(a.as_slice()[0], 0.2);
        assert_eq!(a.as_slice()[63], 0.8);
    }

    #[test]
    fn test_extra_hands_discarded_after_sorting() {
        let hands = vec![hand_at(0.9, 0.3), hand_at(0.1, 0.1), hand_at(0.5, 0.2)];
        let features = FeatureExtractor::default().extract(&hands);
        assert_eq!(features.as_slice()[0], 0.1);
        assert_eq!(features.as_slice()[63], 0.5);
    }

    #[test]
    fn test_short_detection_keeps_block_alignment() {
        let short = HandDetection::from_points(&[[0.1, 0.1, 0.1], [0.2, 0.2, 0.2]]);
        let full = hand_at(0.6, 0.4);
        let features = FeatureExtractor::default().extract(&[short, full]);
        assert_eq!(features.as_slice()[3], 0.2);
        assert_eq!(features.as_slice()[6], 0.0);
        assert_eq!(features.as_slice()[63], 0.6);
    }

    #[test]
    fn test_custom_layout() {
        let features = extract(&[hand_at(0.3, 0.3)], 1, 21);
        assert_eq!(features.len(), 63);
        let tiny = extract(&[hand_at(0.3, 0.3)], 3, 2);
        assert_eq!(tiny.len(), 18);
    }
}
