//! Spoken notifications
//!
//! Label changes are handed to a dedicated speech thread through a lock-free
//! SPSC queue. The recognition loop never waits on speech: if the queue is
//! full the announcement is dropped and counted.

use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of pending announcements
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Text-to-speech backend. Called only from the speech thread.
pub trait Speaker: Send {
    fn speak(&mut self, text: &str) -> crate::Result<()>;
}

/// Logs announcements instead of speaking them
#[derive(Debug, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&mut self, text: &str) -> crate::Result<()> {
        tracing::info!(text = %text, "speak");
        Ok(())
    }
}

/// Runs an external program with the text as its last argument (e.g. `espeak`)
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    /// Parse a command line such as `"espeak -s 150"`
    pub fn from_command_line(command: &str) -> crate::Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| crate::Error::Config("speech command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&mut self, text: &str) -> crate::Result<()> {
        let status = std::process::Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()?;
        if !status.success() {
            warn!(program = %self.program, status = %status, "speech command failed");
        }
        Ok(())
    }
}

/// Counters shared with the speech thread
#[derive(Debug, Default)]
pub struct SpeechStats {
    pub queued: AtomicU64,
    pub dropped: AtomicU64,
    pub spoken: AtomicU64,
    pub failed: AtomicU64,
}

/// Producer side of the speech queue
pub struct SpeechDispatcher {
    producer: Option<Producer<String>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<SpeechStats>,
}

impl SpeechDispatcher {
    /// Start the speech thread
    pub fn spawn(speaker: Box<dyn Speaker>) -> crate::Result<Self> {
        Self::with_capacity(speaker, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(speaker: Box<dyn Speaker>, capacity: usize) -> crate::Result<Self> {
        let (producer, consumer) = RingBuffer::new(capacity.max(1));
        let stats = Arc::new(SpeechStats::default());
        let worker_stats = Arc::clone(&stats);
        let worker = std::thread::Builder::new()
            .name("handsign-speech".to_string())
            .spawn(move || speech_loop(consumer, speaker, worker_stats))?;
        Ok(Self {
            producer: Some(producer),
            worker: Some(worker),
            stats,
        })
    }

    /// Queue a label for speaking. Never blocks; returns false if dropped.
    pub fn announce(&mut self, text: &str) -> bool {
        let Some(producer) = self.producer.as_mut() else {
            return false;
        };
        match producer.push(text.to_string()) {
            Ok(()) => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(text = %text, "speech queue full, dropping announcement");
                false
            }
        }
    }

    pub fn stats(&self) -> Arc<SpeechStats> {
        Arc::clone(&self.stats)
    }

    /// Close the queue and wait for pending announcements to finish
    pub fn shutdown(mut self) {
        self.producer.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("speech thread panicked");
            }
        }
    }
}

fn speech_loop(mut consumer: Consumer<String>, mut speaker: Box<dyn Speaker>, stats: Arc<SpeechStats>) {
    loop {
        match consumer.pop() {
            Ok(text) => match speaker.speak(&text) {
                Ok(()) => {
                    stats.spoken.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "speech failed");
                }
            },
            Err(_) if consumer.is_abandoned() => break,
            Err(_) => std::thread::sleep(Duration::from_millis(5)),
        }
    }
}
