//! Frame Sources
//!
//! The camera and the landmark detector are external collaborators. This module
//! defines the seams the pipeline calls them through, plus a replay source that
//! reads pre-computed landmark streams as newline-delimited JSON:
//!
//! ```text
//! {"hands": [[[0.41, 0.62, 0.0], ... 21 points], [[0.72, 0.60, 0.0], ...]]}
//! {"hands": []}
//! {"error": "camera busy"}
//! ```
//!
//! An `error` line stands for a failed frame read; a blank line is skipped.

use super::types::HandDetection;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Content of one captured frame
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    /// Raw image for an external detector (row-major RGB)
    Image {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
    /// Landmarks already detected upstream
    Landmarks(Vec<HandDetection>),
}

/// One frame delivered by a [`FrameSource`]
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position of the frame in its stream, starting at 0
    pub sequence: u64,
    pub payload: FramePayload,
}

/// Supplies one frame per tick.
///
/// `Ok(None)` ends the stream. `Err` is a transient read failure; the caller
/// retries on the next tick.
pub trait FrameSource {
    fn next_frame(&mut self) -> crate::Result<Option<Frame>>;
}

/// Turns a frame into zero or more hand detections. Stateless per call.
pub trait LandmarkDetector {
    fn detect(&self, frame: &Frame) -> Vec<HandDetection>;
}

/// Detector for frames whose landmarks were computed upstream.
///
/// Image frames carry no landmarks for it and yield no detections.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrecomputedLandmarks;

impl LandmarkDetector for PrecomputedLandmarks {
    fn detect(&self, frame: &Frame) -> Vec<HandDetection> {
        match &frame.payload {
            FramePayload::Landmarks(hands) => hands.clone(),
            FramePayload::Image { .. } => {
                debug!(sequence = frame.sequence, "image frame has no precomputed landmarks");
                Vec::new()
            }
        }
    }
}

/// One line of a landmark stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LandmarkRecord {
    Hands { hands: Vec<HandDetection> },
    Failure { error: String },
}

/// Replays a newline-delimited JSON landmark stream
pub struct ReplaySource {
    lines: std::io::Lines<Box<dyn BufRead + Send>>,
    sequence: u64,
    line_number: usize,
}

impl ReplaySource {
    /// Replay from any reader (file, stdin, in-memory buffer)
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(reader));
        Self {
            lines: reader.lines(),
            sequence: 0,
            line_number: 0,
        }
    }

    /// Replay a stream file
    pub fn open(path: &Path) -> crate::Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            crate::Error::Device(format!("cannot open landmark stream {:?}: {}", path, e))
        })?;
        Ok(Self::from_reader(file))
    }

    /// Write a stream of records, one JSON object per line
    pub fn write_records<W: std::io::Write>(
        mut writer: W,
        records: &[LandmarkRecord],
    ) -> crate::Result<()> {
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> crate::Result<Option<Frame>> {
        loop {
            let line = match self.lines.next() {
                None => return Ok(None),
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    return Err(crate::Error::Device(format!("landmark stream read failed: {}", e)))
                }
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let sequence = self.sequence;
            self.sequence += 1;

            return match serde_json::from_str::<LandmarkRecord>(&line) {
                Ok(LandmarkRecord::Hands { hands }) => Ok(Some(Frame {
                    sequence,
                    payload: FramePayload::Landmarks(hands),
                })),
                Ok(LandmarkRecord::Failure { error }) => Err(crate::Error::Device(error)),
                Err(e) => {
                    warn!(line = self.line_number, error = %e, "unreadable landmark record");
                    Err(crate::Error::Device(format!(
                        "unreadable landmark record at line {}: {}",
                        self.line_number, e
                    )))
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(text: &str) -> ReplaySource {
        ReplaySource::from_reader(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_replay_yields_frames_in_order() {
        let mut source = stream(
            "{\"hands\": [[[0.5, 0.5, 0.0]]]}\n\n{\"hands\": []}\n",
        );
        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.sequence, 0);
        match &first.payload {
            FramePayload::Landmarks(hands) => assert_eq!(hands.len(), 1),
            other => panic!("unexpected payload {:?}", other),
        }
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.sequence, 1);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_error_record_is_device_error_and_stream_continues() {
        let mut source = stream("{\"error\": \"camera busy\"}\n{\"hands\": []}\n");
        let err = source.next_frame().unwrap_err();
        assert!(matches!(err, crate::Error::Device(ref m) if m == "camera busy"));
        assert!(source.next_frame().unwrap().is_some());
    }

    #[test]
    fn test_garbage_line_is_device_error() {
        let mut source = stream("not json\n");
        assert!(matches!(source.next_frame(), Err(crate::Error::Device(_))));
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_write_records_round_trips_through_replay() {
        let records = vec![
            LandmarkRecord::Hands {
                hands: vec![HandDetection::from_points(&[[0.25, 0.5, 0.0]])],
            },
            LandmarkRecord::Failure { error: "dropped".into() },
        ];
        let mut out = Vec::new();
        ReplaySource::write_records(&mut out, &records).unwrap();

        let mut source = ReplaySource::from_reader(Cursor::new(out));
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn test_precomputed_detector_ignores_images() {
        let detector = PrecomputedLandmarks;
        let image = Frame {
            sequence: 0,
            payload: FramePayload::Image { width: 2, height: 2, data: vec![0; 12] },
        };
        assert!(detector.detect(&image).is_empty());
    }

    #[test]
    fn test_open_missing_file_is_device_error() {
        let err = ReplaySource::open(Path::new("/nonexistent/stream.jsonl"))
            .err()
            .unwrap();
        assert!(matches!(err, crate::Error::Device(_)));
    }
}
