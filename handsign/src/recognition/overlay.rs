//! Overlay sinks
//!
//! The rendering collaborator receives the overlay state after every tick.
//! It is an output only; nothing flows back into the state machine.

use super::state_machine::OverlayState;
use tracing::debug;

pub trait OverlaySink {
    fn render(&mut self, overlay: &OverlayState);
}

/// Discards overlay updates
#[derive(Debug, Default)]
pub struct NullOverlay;

impl OverlaySink for NullOverlay {
    fn render(&mut self, _overlay: &OverlayState) {}
}

/// Logs the overlay whenever its status or stable label changes
#[derive(Debug, Default)]
pub struct LogOverlay {
    last: Option<OverlayState>,
}

impl OverlaySink for LogOverlay {
    fn render(&mut self, overlay: &OverlayState) {
        let changed = match &self.last {
            None => true,
            Some(last) => last.status != overlay.status || last.stable_label != overlay.stable_label,
        };
        if changed {
            debug!(
                phase = overlay.phase.name(),
                filled = overlay.filled,
                target = overlay.target,
                label = ?overlay.stable_label.as_ref().map(|r| r.to_string()),
                status = %overlay.status,
                "overlay"
            );
        }
        self.last = Some(overlay.clone());
    }
}

/// Keeps every overlay state; used to inspect sessions after the fact
#[derive(Debug, Default)]
pub struct RecordingOverlay {
    pub frames: Vec<OverlayState>,
}

impl OverlaySink for RecordingOverlay {
    fn render(&mut self, overlay: &OverlayState) {
        self.frames.push(overlay.clone());
    }
}
