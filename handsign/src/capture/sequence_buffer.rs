//! Bounded Temporal Window
//!
//! Accumulates one feature vector per frame while hands are visible and signals
//! when a full window of `capacity` consecutive frames is available.
//!
//! Lifecycle:
//! - `start(L)` clears and activates the buffer
//! - a frame without hands clears the partial window (lost hands invalidate
//!   the temporal context)
//! - a full window is consumed with `take_window()`, which leaves the buffer empty
//! - `stop()` deactivates and clears
//!
//! Length never exceeds the capacity, and "window ready" fires exactly once per
//! `capacity` consecutive present frames since the last clear or consumption.

use super::types::{FeatureLayout, FrameFeatures, SequenceWindow, WindowShape};
use tracing::debug;

/// Buffer statistics for monitoring
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// Feature vectors appended
    pub frames_appended: u64,
    /// Windows that reached full length
    pub windows_ready: u64,
    /// Windows taken by the caller
    pub windows_consumed: u64,
    /// Partial windows discarded because hands were lost
    pub hand_loss_resets: u64,
    /// Full windows discarded because the caller never consumed them
    pub stale_windows_dropped: u64,
    /// Highest fill level observed
    pub peak_fill: usize,
}

/// Result of feeding one frame to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Buffer is not active; the frame was ignored
    Inactive,
    /// No hands in the frame; any partial window was discarded
    Cleared { discarded: usize },
    /// Frame appended, window not yet full
    Accumulating { filled: usize, capacity: usize },
    /// Frame appended and the window is now full
    WindowReady,
}

/// Bounded window of frame feature vectors
#[derive(Debug, Clone)]
pub struct SequenceBuffer {
    frames: Vec<FrameFeatures>,
    capacity: usize,
    feature_size: usize,
    active: bool,
    stats: BufferStats,
}

impl SequenceBuffer {
    /// Create an inactive buffer for the given layout and window length
    pub fn new(layout: FeatureLayout, capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
            capacity,
            feature_size: layout.feature_size(),
            active: false,
            stats: BufferStats::default(),
        }
    }

    /// Clear, set the window length and activate
    pub fn start(&mut self, capacity: usize) -> crate::Result<()> {
        if capacity == 0 {
            return Err(crate::Error::InvalidInput(
                "sequence length must be greater than zero".to_string(),
            ));
        }
        self.frames.clear();
        self.frames.reserve(capacity);
        self.capacity = capacity;
        self.active = true;
        Ok(())
    }

    /// Feed one frame.
    ///
    /// When `detections_present` is false the partial window is discarded.
    /// A frame arriving while a full window is still pending replaces that
    /// stale window with a fresh one starting at this frame.
    pub fn on_frame(
        &mut self,
        detections_present: bool,
        vector: FrameFeatures,
    ) -> crate::Result<FrameOutcome> {
        if !self.active {
            return Ok(FrameOutcome::Inactive);
        }

        if !detections_present {
            let discarded = self.frames.len();
            if discarded > 0 {
                self.stats.hand_loss_resets += 1;
                debug!(discarded, "hands lost, clearing partial window");
            }
            self.frames.clear();
            return Ok(FrameOutcome::Cleared { discarded });
        }

        if vector.len() != self.feature_size {
            return Err(crate::Error::ShapeMismatch {
                expected: self.feature_size.to_string(),
                found: vector.len().to_string(),
            });
        }

        if self.is_full() {
            self.stats.stale_windows_dropped += 1;
            debug!(capacity = self.capacity, "dropping unconsumed full window");
            self.frames.clear();
        }

        self.frames.push(vector);
        self.stats.frames_appended += 1;
        self.stats.peak_fill = self.stats.peak_fill.max(self.frames.len());

        if self.frames.len() == self.capacity {
            self.stats.windows_ready += 1;
            Ok(FrameOutcome::WindowReady)
        } else {
            Ok(FrameOutcome::Accumulating {
                filled: self.frames.len(),
                capacity: self.capacity,
            })
        }
    }

    /// Take the full window, leaving the buffer empty. `Ok(None)` unless full.
    pub fn take_window(&mut self) -> crate::Result<Option<SequenceWindow>> {
        if !self.is_full() {
            return Ok(None);
        }
        let frames = std::mem::take(&mut self.frames);
        self.frames.reserve(self.capacity);
        self.stats.windows_consumed += 1;
        SequenceWindow::from_frames(&frames).map(Some)
    }

    /// Discard any partial window without deactivating
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Deactivate and discard any partial window
    pub fn stop(&mut self) {
        self.active = false;
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.frames.len() == self.capacity
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shape of the windows this buffer produces
    pub fn window_shape(&self) -> WindowShape {
        WindowShape::new(self.capacity, self.feature_size)
    }

    pub fn stats(&self) -> BufferStats {
        self.stats
    }
}
