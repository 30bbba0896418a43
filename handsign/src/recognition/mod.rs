//! Recognition
//!
//! The [`RecognitionStateMachine`] turns a stream of per-frame detections into
//! recorded samples (one-shot mode) or stable label-change events (continuous
//! mode). [`Session`] is the host loop around it: frame source, device-failure
//! policy, sample persistence, overlay and speech.

pub mod state_machine;
pub mod session;
pub mod speech;
pub mod overlay;

pub use state_machine::{
    normalize_class_name, CaptureMode, FrameInput, OverlayState, OverlayStatus, Phase, RecognitionEvent,
    RecognitionSettings, RecognitionStateMachine, TickOutput, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_COUNTDOWN,
};
pub use session::{Pace, Session, SessionEnd, SessionEvent, SessionOptions, SessionSummary};
pub use speech::{CommandSpeaker, LogSpeaker, Speaker, SpeechDispatcher};
pub use overlay::{LogOverlay, NullOverlay, OverlaySink, RecordingOverlay};
