//! Session host loop
//!
//! Owns the scheduling the state machine deliberately leaves out: pulls one
//! frame per tick from a [`FrameSource`], runs the landmark detector, ticks the
//! machine, persists recorded samples, fans label changes out to speech and
//! renders the overlay.
//!
//! Capture failures are retried on the next tick. After
//! `max_consecutive_failures` in a row the session surfaces a device error
//! (once per outage) and keeps retrying.

use super::overlay::{NullOverlay, OverlaySink};
use super::speech::SpeechDispatcher;
use super::state_machine::{FrameInput, OverlayStatus, RecognitionEvent, RecognitionSettings, RecognitionStateMachine};
use crate::capture::{BufferStats, FrameSource, LandmarkDetector};
use crate::classifier::{ClassificationResult, SequenceClassifier};
use crate::dataset::{Corpus, LabeledSample};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How session time advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Wall clock; sleep out the rest of each tick interval
    RealTime,
    /// Advance by one tick interval per frame without sleeping (replays, tests)
    Virtual,
}

/// Host policy for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub tick_interval: Duration,
    /// Consecutive capture failures before a device error is surfaced
    pub max_consecutive_failures: u32,
    pub pace: Pace,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(15),
            max_consecutive_failures: 60,
            pace: Pace::RealTime,
        }
    }
}

/// What the host reports to its caller while running
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A recorded sample was written to the corpus
    SampleSaved {
        class_name: String,
        path: PathBuf,
        /// Samples now in the class directory
        class_count: usize,
        prediction: Option<ClassificationResult>,
    },
    LabelChanged {
        previous: Option<String>,
        result: ClassificationResult,
    },
    LowConfidence { result: ClassificationResult },
    ClassificationFailed { message: String },
    /// Capture failed `consecutive_failures` times in a row
    DeviceError { consecutive_failures: u32, message: String },
    /// A frame arrived again after a surfaced device error
    DeviceRecovered,
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionEnd {
    /// All requested samples were recorded
    Completed,
    /// The stop handle was set
    Stopped,
    /// The frame source ran out of frames
    #[default]
    EndOfStream,
}

/// Totals for a finished session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub ticks: u64,
    pub frames: u64,
    pub device_failures: u64,
    pub device_errors_surfaced: u64,
    pub label_changes: Vec<ClassificationResult>,
    pub low_confidence: u64,
    pub duplicates_suppressed: u64,
    pub classification_failures: u64,
    pub samples: Vec<PathBuf>,
    pub buffer: BufferStats,
    pub end: SessionEnd,
}

struct RecordingPlan<'c> {
    corpus: &'c Corpus,
    class_name: String,
    remaining: usize,
}

struct SessionClock {
    pace: Pace,
    interval: Duration,
    started: Instant,
    virtual_now: Duration,
}

impl SessionClock {
    fn new(pace: Pace, interval: Duration) -> Self {
        Self {
            pace,
            interval,
            started: Instant::now(),
            virtual_now: Duration::ZERO,
        }
    }

    fn now(&self) -> Duration {
        match self.pace {
            Pace::RealTime => self.started.elapsed(),
            Pace::Virtual => self.virtual_now,
        }
    }

    fn wait(&mut self, tick_started: Instant) {
        match self.pace {
            Pace::RealTime => {
                let spent = tick_started.elapsed();
                if spent < self.interval {
                    std::thread::sleep(self.interval - spent);
                }
            }
            Pace::Virtual => self.virtual_now += self.interval,
        }
    }
}

/// One camera session: a frame source, a detector and a private state machine
pub struct Session<S, D> {
    source: S,
    detector: D,
    machine: RecognitionStateMachine,
    classifier: Option<Arc<dyn SequenceClassifier>>,
    speech: Option<SpeechDispatcher>,
    overlay: Box<dyn OverlaySink>,
    options: SessionOptions,
    stop: Arc<AtomicBool>,
}

impl<S: FrameSource, D: LandmarkDetector> Session<S, D> {
    pub fn new(source: S, detector: D, settings: RecognitionSettings, options: SessionOptions) -> Self {
        Self {
            source,
            detector,
            machine: RecognitionStateMachine::new(settings),
            classifier: None,
            speech: None,
            overlay: Box::new(NullOverlay),
            options,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Classifier shared read-only with other sessions
    pub fn with_classifier(mut self, classifier: Arc<dyn SequenceClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_speech(mut self, speech: SpeechDispatcher) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_overlay(mut self, overlay: Box<dyn OverlaySink>) -> Self {
        self.overlay = overlay;
        self
    }

    /// Setting the flag ends the session at the next tick
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn machine(&self) -> &RecognitionStateMachine {
        &self.machine
    }

    /// Run continuous recognition until stopped or the source ends.
    ///
    /// Requires a classifier whose input shape equals the configured window.
    pub fn run_recognition<F>(&mut self, mut on_event: F) -> crate::Result<SessionSummary>
    where
        F: FnMut(&SessionEvent),
    {
        let classifier = self.classifier.clone().ok_or_else(|| {
            crate::Error::ArtifactIntegrity("continuous recognition requires a loaded classifier".to_string())
        })?;
        let window = self.machine.settings().window_shape();
        if classifier.input_shape() != window {
            return Err(crate::Error::shape_mismatch(
                classifier.input_shape().as_tuple(),
                window.as_tuple(),
            ));
        }

        self.machine.start_recognition()?;
        info!(length = window.frames, threshold = self.machine.settings().confidence_threshold, "Recognition started");
        self.run(Some(classifier), None, &mut on_event)
    }

    /// Record `samples` one-shot samples of `class_name` into `corpus`.
    ///
    /// Each sample gets its own countdown. A classifier, if present and
    /// compatible, predicts each recorded sample; recording works without one.
    pub fn run_recording<F>(
        &mut self,
        corpus: &Corpus,
        class_name: &str,
        samples: usize,
        mut on_event: F,
    ) -> crate::Result<SessionSummary>
    where
        F: FnMut(&SessionEvent),
    {
        if samples == 0 {
            return Err(crate::Error::InvalidInput("sample count must be at least 1".to_string()));
        }
        let window = self.machine.settings().window_shape();
        let classifier = match self.classifier.clone() {
            Some(c) if c.input_shape() == window => Some(c),
            Some(c) => {
                warn!(model = %c.input_shape(), window = %window, "classifier does not match the window; recording without predictions");
                None
            }
            None => None,
        };

        let class_name = self.machine.start_recording(class_name, Duration::ZERO)?;
        info!(class = %class_name, samples, "Recording started");
        let plan = RecordingPlan {
            corpus,
            class_name,
            remaining: samples,
        };
        self.run(classifier, Some(plan), &mut on_event)
    }

    /// Drain pending speech and end the session
    pub fn finish(mut self) {
        if let Some(speech) = self.speech.take() {
            speech.shutdown();
        }
    }

    fn run<F>(
        &mut self,
        classifier: Option<Arc<dyn SequenceClassifier>>,
        mut recording: Option<RecordingPlan<'_>>,
        on_event: &mut F,
    ) -> crate::Result<SessionSummary>
    where
        F: FnMut(&SessionEvent),
    {
        let mut clock = SessionClock::new(self.options.pace, self.options.tick_interval);
        let mut summary = SessionSummary::default();
        let mut consecutive_failures = 0u32;
        let mut device_error = false;

        loop {
            if self.stop.load(Ordering::SeqCst) {
                summary.end = SessionEnd::Stopped;
                break;
            }
            let tick_started = Instant::now();
            let now = clock.now();
            summary.ticks += 1;

            let output = match self.source.next_frame() {
                Ok(None) => {
                    summary.end = SessionEnd::EndOfStream;
                    break;
                }
                Ok(Some(frame)) => {
                    if device_error {
                        info!("Capture device recovered");
                        on_event(&SessionEvent::DeviceRecovered);
                        device_error = false;
                    }
                    consecutive_failures = 0;
                    summary.frames += 1;
                    let hands = self.detector.detect(&frame);
                    self.machine.tick(now, FrameInput::Hands(&hands), classifier.as_deref())
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    summary.device_failures += 1;
                    debug!(error = %e, consecutive_failures, "frame unavailable");
                    if !device_error && consecutive_failures >= self.options.max_consecutive_failures.max(1) {
                        error!(error = %e, consecutive_failures, "Capture device unavailable");
                        device_error = true;
                        summary.device_errors_surfaced += 1;
                        on_event(&SessionEvent::DeviceError {
                            consecutive_failures,
                            message: e.user_message(),
                        });
                    }
                    self.machine.tick(now, FrameInput::Unavailable, classifier.as_deref())
                }
            };

            for event in output.events {
                self.handle_event(event, &mut recording, now, &mut summary, on_event)?;
            }

            let mut overlay = output.overlay;
            if device_error {
                overlay.status = OverlayStatus::DeviceError;
            }
            self.overlay.render(&overlay);

            if recording.as_ref().map(|plan| plan.remaining == 0).unwrap_or(false) {
                summary.end = SessionEnd::Completed;
                break;
            }
            clock.wait(tick_started);
        }

        self.machine.stop();
        summary.buffer = self.machine.buffer_stats();
        info!(
            ticks = summary.ticks,
            frames = summary.frames,
            label_changes = summary.label_changes.len(),
            samples = summary.samples.len(),
            end = ?summary.end,
            "Session ended"
        );
        Ok(summary)
    }

    fn handle_event<F>(
        &mut self,
        event: RecognitionEvent,
        recording: &mut Option<RecordingPlan<'_>>,
        now: Duration,
        summary: &mut SessionSummary,
        on_event: &mut F,
    ) -> crate::Result<()>
    where
        F: FnMut(&SessionEvent),
    {
        match event {
            RecognitionEvent::SampleReady {
                class_name,
                window,
                prediction,
            } => {
                let Some(plan) = recording.as_mut() else {
                    warn!(class = %class_name, "sample captured outside a recording session; discarded");
                    return Ok(());
                };
                let sample = LabeledSample::new(class_name.clone(), window);
                let path = plan.corpus.save_sample(&sample)?;
                let class_count = plan.corpus.sample_count(&class_name)?;
                summary.samples.push(path.clone());
                plan.remaining = plan.remaining.saturating_sub(1);
                on_event(&SessionEvent::SampleSaved {
                    class_name,
                    path,
                    class_count,
                    prediction,
                });
                if plan.remaining > 0 {
                    self.machine.start_recording(&plan.class_name, now)?;
                }
            }
            RecognitionEvent::LabelChanged { previous, result } => {
                if let Some(speech) = self.speech.as_mut() {
                    speech.announce(&result.label);
                }
                summary.label_changes.push(result.clone());
                on_event(&SessionEvent::LabelChanged { previous, result });
            }
            RecognitionEvent::LowConfidence { result } => {
                summary.low_confidence += 1;
                on_event(&SessionEvent::LowConfidence { result });
            }
            RecognitionEvent::DuplicateSuppressed { .. } => summary.duplicates_suppressed += 1,
            RecognitionEvent::ClassificationFailed { message } => {
                summary.classification_failures += 1;
                on_event(&SessionEvent::ClassificationFailed { message });
            }
            RecognitionEvent::CollectionStarted
            | RecognitionEvent::HandsLost { .. }
            | RecognitionEvent::FrameUnavailable => {}
        }
        Ok(())
    }
}
