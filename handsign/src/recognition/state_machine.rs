//! Recognition State Machine
//!
//! Drives one capture session as a pure tick function. The host calls
//! [`RecognitionStateMachine::tick`] once per scheduled frame with the current
//! session time, the frame's detections (or the fact that no frame was
//! available) and an optional classifier; the machine returns the events
//! produced by that frame plus the overlay state to display.
//!
//! ```text
//!            start_recording(name)              countdown elapsed
//!   Idle ─────────────────────────▶ Countdown ─────────────────────▶ Collecting
//!    ▲  │                                                            │  ▲   │
//!    │  │ start_recognition                                          │  └───┘ window ready
//!    │  └────────────────────────────────────────────────────────────┘   (continuous)
//!    │                        window ready (one-shot)                │
//!    └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! `stop()` returns to Idle from any phase and discards the in-flight window.
//! A missing frame never changes the phase.

use crate::capture::{BufferStats, FeatureExtractor, FeatureLayout, FrameOutcome, HandDetection, SequenceBuffer, SequenceWindow, WindowShape};
use crate::classifier::{ClassificationResult, SequenceClassifier};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default minimum confidence for a label change
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Default delay before one-shot capture starts
pub const DEFAULT_COUNTDOWN: Duration = Duration::from_secs(3);

/// Construction-time parameters for one machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognitionSettings {
    pub layout: FeatureLayout,
    /// Frames per window (L)
    pub sequence_length: usize,
    /// Results below this confidence never change the stable label
    pub confidence_threshold: f32,
    pub countdown: Duration,
}

impl RecognitionSettings {
    pub fn new(layout: FeatureLayout, sequence_length: usize) -> Self {
        Self {
            layout,
            sequence_length,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            countdown: DEFAULT_COUNTDOWN,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_countdown(mut self, countdown: Duration) -> Self {
        self.countdown = countdown;
        self
    }

    pub fn window_shape(&self) -> WindowShape {
        WindowShape::for_layout(self.layout, self.sequence_length)
    }
}

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Waiting until the given session time before collecting
    Countdown { until: Duration },
    Collecting,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Countdown { .. } => "countdown",
            Phase::Collecting => "collecting",
        }
    }
}

/// What the current session is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureMode {
    /// Record one labeled sample, then stop
    OneShot { class_name: String },
    /// Classify windows until stopped
    Continuous,
}

/// Input for one tick
#[derive(Debug, Clone, Copy)]
pub enum FrameInput<'a> {
    /// Detections for the frame; empty when no hands were found
    Hands(&'a [HandDetection]),
    /// The capture device produced no frame this tick
    Unavailable,
}

/// Something the host should react to
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// Countdown finished; frames are now being collected
    CollectionStarted,
    /// Hands disappeared and a partial window was discarded
    HandsLost { discarded: usize },
    /// One-shot capture finished. The host persists the sample.
    SampleReady {
        class_name: String,
        window: SequenceWindow,
        /// Classification of the captured window, when a classifier was available
        prediction: Option<ClassificationResult>,
    },
    /// A confident prediction different from the stable label
    LabelChanged {
        previous: Option<String>,
        result: ClassificationResult,
    },
    /// Top prediction was below the threshold; stable label unchanged
    LowConfidence { result: ClassificationResult },
    /// Confident prediction equal to the stable label; no notification
    DuplicateSuppressed { result: ClassificationResult },
    /// No frame was available; retried on the next tick
    FrameUnavailable,
    /// A full window could not be classified
    ClassificationFailed { message: String },
}

/// Short status line for the overlay
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayStatus {
    Idle,
    Countdown { remaining_secs: u64 },
    WaitingForHands,
    Collecting,
    LowConfidence { label: String, percent: f32 },
    SampleCaptured { class_name: String },
    /// Set by the host once capture failures pass its bound
    DeviceError,
}

impl std::fmt::Display for OverlayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayStatus::Idle => write!(f, "Idle"),
            OverlayStatus::Countdown { remaining_secs } => write!(f, "Starting in {}...", remaining_secs),
            OverlayStatus::WaitingForHands => write!(f, "Waiting for hands"),
            OverlayStatus::Collecting => write!(f, "Collecting"),
            OverlayStatus::LowConfidence { label, percent } => {
                write!(f, "Low confidence: {} ({:.1}%)", label, percent)
            }
            OverlayStatus::SampleCaptured { class_name } => write!(f, "Captured '{}'", class_name),
            OverlayStatus::DeviceError => write!(f, "Camera Error!"),
        }
    }
}

/// Snapshot handed to the rendering collaborator after each tick
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayState {
    pub phase: Phase,
    /// Frames in the current window
    pub filled: usize,
    /// Window length
    pub target: usize,
    pub stable_label: Option<ClassificationResult>,
    pub status: OverlayStatus,
}

/// Events and overlay produced by one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub events: Vec<RecognitionEvent>,
    pub overlay: OverlayState,
}

/// One session's capture and stabilization state.
///
/// Owns the live window and the stable label exclusively; run one instance
/// per camera session.
#[derive(Debug, Clone)]
pub struct RecognitionStateMachine {
    settings: RecognitionSettings,
    extractor: FeatureExtractor,
    buffer: SequenceBuffer,
    phase: Phase,
    mode: Option<CaptureMode>,
    stable: Option<ClassificationResult>,
    status: OverlayStatus,
}

impl RecognitionStateMachine {
    pub fn new(settings: RecognitionSettings) -> Self {
        Self {
            extractor: FeatureExtractor::new(settings.layout),
            buffer: SequenceBuffer::new(settings.layout, settings.sequence_length),
            settings,
            phase: Phase::Idle,
            mode: None,
            stable: None,
            status: OverlayStatus::Idle,
        }
    }

    pub fn settings(&self) -> &RecognitionSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> Option<&CaptureMode> {
        self.mode.as_ref()
    }

    pub fn stable_label(&self) -> Option<&ClassificationResult> {
        self.stable.as_ref()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    /// Begin a one-shot recording after the countdown.
    ///
    /// The name is trimmed and lower-cased; the normalized name is returned.
    /// Fails without any state change if the name is empty or the machine is
    /// not idle.
    pub fn start_recording(&mut self, class_name: &str, now: Duration) -> crate::Result<String> {
        let name = normalize_class_name(class_name)?;
        self.ensure_idle()?;

        let until = now + self.settings.countdown;
        self.phase = Phase::Countdown { until };
        self.mode = Some(CaptureMode::OneShot { class_name: name.clone() });
        self.status = OverlayStatus::Countdown {
            remaining_secs: ceil_secs(self.settings.countdown),
        };
        debug!(class = %name, countdown = ?self.settings.countdown, "recording armed");
        Ok(name)
    }

    /// Begin continuous recognition immediately. Clears the stable label.
    pub fn start_recognition(&mut self) -> crate::Result<()> {
        self.ensure_idle()?;
        self.begin_collecting()?;
        self.mode = Some(CaptureMode::Continuous);
        self.stable = None;
        debug!(length = self.settings.sequence_length, "recognition started");
        Ok(())
    }

    /// Return to Idle, discarding any in-flight window
    pub fn stop(&mut self) {
        if self.phase != Phase::Idle {
            debug!(phase = self.phase.name(), discarded = self.buffer.len(), "stopped");
        }
        self.buffer.stop();
        self.phase = Phase::Idle;
        self.mode = None;
        self.status = OverlayStatus::Idle;
    }

    /// Process one scheduled frame.
    ///
    /// `now` is the session clock; it only needs to be monotonic.
    pub fn tick(
        &mut self,
        now: Duration,
        input: FrameInput<'_>,
        classifier: Option<&dyn SequenceClassifier>,
    ) -> TickOutput {
        let mut events = Vec::new();

        match input {
            FrameInput::Unavailable => events.push(RecognitionEvent::FrameUnavailable),
            FrameInput::Hands(hands) => {
                if let Phase::Countdown { until } = self.phase {
                    if now >= until {
                        if let Err(e) = self.begin_collecting() {
                            warn!(error = %e, "cannot start collection");
                            self.stop();
                        } else {
                            events.push(RecognitionEvent::CollectionStarted);
                        }
                    } else {
                        self.status = OverlayStatus::Countdown {
                            remaining_secs: ceil_secs(until - now),
                        };
                    }
                }
                if self.phase == Phase::Collecting {
                    self.collect(hands, classifier, &mut events);
                }
            }
        }

        TickOutput {
            events,
            overlay: self.overlay(),
        }
    }

    /// Overlay state without advancing the machine
    pub fn overlay(&self) -> OverlayState {
        OverlayState {
            phase: self.phase,
            filled: self.buffer.len(),
            target: self.settings.sequence_length,
            stable_label: self.stable.clone(),
            status: self.status.clone(),
        }
    }

    fn ensure_idle(&self) -> crate::Result<()> {
        if self.phase != Phase::Idle {
            return Err(crate::Error::InvalidInput(format!(
                "a session is already {}",
                self.phase.name()
            )));
        }
        Ok(())
    }

    fn begin_collecting(&mut self) -> crate::Result<()> {
        self.buffer.start(self.settings.sequence_length)?;
        self.phase = Phase::Collecting;
        self.status = OverlayStatus::WaitingForHands;
        Ok(())
    }

    fn collect(
        &mut self,
        hands: &[HandDetection],
        classifier: Option<&dyn SequenceClassifier>,
        events: &mut Vec<RecognitionEvent>,
    ) {
        let features = self.extractor.extract(hands);
        let outcome = match self.buffer.on_frame(!hands.is_empty(), features) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "frame rejected by sequence buffer");
                return;
            }
        };

        match outcome {
            FrameOutcome::Inactive => {}
            FrameOutcome::Cleared { discarded } => {
                if discarded > 0 {
                    events.push(RecognitionEvent::HandsLost { discarded });
                }
                self.status = OverlayStatus::WaitingForHands;
            }
            FrameOutcome::Accumulating { .. } => {
                if !matches!(self.status, OverlayStatus::LowConfidence { .. }) {
                    self.status = OverlayStatus::Collecting;
                }
            }
            FrameOutcome::WindowReady => {
                match self.buffer.take_window() {
                    Ok(Some(window)) => self.on_window(window, classifier, events),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "discarding malformed window"),
                }
            }
        }
    }

    fn on_window(
        &mut self,
        window: SequenceWindow,
        classifier: Option<&dyn SequenceClassifier>,
        events: &mut Vec<RecognitionEvent>,
    ) {
        match self.mode.clone() {
            Some(CaptureMode::OneShot { class_name }) => {
                let prediction = classifier.and_then(|c| match top_result(c, &window) {
                    Ok(top) => Some(top),
                    Err(e) => {
                        warn!(error = %e, "could not classify recorded sample");
                        None
                    }
                });
                info!(class = %class_name, frames = window.shape().frames, "sample captured");
                self.stop();
                self.status = OverlayStatus::SampleCaptured {
                    class_name: class_name.clone(),
                };
                events.push(RecognitionEvent::SampleReady {
                    class_name,
                    window,
                    prediction,
                });
            }
            Some(CaptureMode::Continuous) => {
                let Some(classifier) = classifier else {
                    events.push(RecognitionEvent::ClassificationFailed {
                        message: "no classifier available".to_string(),
                    });
                    return;
                };
                match top_result(classifier, &window) {
                    Ok(result) => events.push(self.stabilize(result)),
                    Err(e) => {
                        warn!(error = %e, "window classification failed");
                        events.push(RecognitionEvent::ClassificationFailed {
                            message: e.to_string(),
                        });
                    }
                }
            }
            None => {}
        }
    }

    /// Compare a new top-1 result against the stable label
    fn stabilize(&mut self, result: ClassificationResult) -> RecognitionEvent {
        if result.confidence < self.settings.confidence_threshold {
            debug!(label = %result.label, confidence = result.confidence, "below threshold");
            self.status = OverlayStatus::LowConfidence {
                label: result.label.clone(),
                percent: result.confidence_percent(),
            };
            return RecognitionEvent::LowConfidence { result };
        }

        self.status = OverlayStatus::Collecting;
        if self.stable.as_ref().map(|s| s.label.as_str()) == Some(result.label.as_str()) {
            return RecognitionEvent::DuplicateSuppressed { result };
        }

        let previous = self.stable.replace(result.clone()).map(|s| s.label);
        info!(label = %result.label, confidence = result.confidence, previous = ?previous, "label changed");
        RecognitionEvent::LabelChanged { previous, result }
    }
}

fn top_result(classifier: &dyn SequenceClassifier, window: &SequenceWindow) -> crate::Result<ClassificationResult> {
    classifier
        .classify(window)?
        .into_iter()
        .next()
        .ok_or_else(|| crate::Error::ArtifactIntegrity("classifier returned no classes".to_string()))
}

/// Trim and lower-case a gesture name. The result names a corpus directory.
pub fn normalize_class_name(raw: &str) -> crate::Result<String> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return Err(crate::Error::InvalidInput("gesture name must not be empty".to_string()));
    }
    if name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(crate::Error::InvalidInput(format!(
            "gesture name '{}' cannot be used as a directory name",
            name
        )));
    }
    Ok(name)
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
