//! Detections produced ahead of time by an external model.
//!
//! The file is JSON lines, one object per frame that has detections:
//!
//! ```text
//! {"frame": 0, "detections": [{"bbox": [12, 40, 88, 230], "score": 0.91, "class_id": 0}]}
//! {"frame": 3, "detections": []}
//! ```
//!
//! Frames are zero-based and in decode order. Frames missing from the file
//! have no detections.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::integration::{DetectionSource, RawDetection};
use crate::media::Frame;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read detections: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One line of a detections file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDetections {
    pub frame: u64,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

/// [`DetectionSource`] that replays stored detections frame by frame.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetections {
    frames: HashMap<u64, Vec<RawDetection>>,
    cursor: u64,
}

impl ReplayDetections {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let file = File::open(path.as_ref())?;
        let replay = Self::from_reader(BufReader::new(file))?;
        debug!(
            path = %path.as_ref().display(),
            frames = replay.frames.len(),
            "loaded replayed detections"
        );
        Ok(replay)
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self, ReplayError> {
        let mut frames: HashMap<u64, Vec<RawDetection>> = HashMap::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: FrameDetections = serde_json::from_str(&line)
                .map_err(|source| ReplayError::Parse {
                    line: idx + 1,
                    source,
                })?;
            frames.entry(entry.frame).or_default().extend(entry.detections);
        }
        Ok(Self { frames, cursor: 0 })
    }

    /// Script in memory: element `i` holds the detections of frame `i`.
    pub fn from_frames(frames: Vec<Vec<RawDetection>>) -> Self {
        Self {
            frames: frames
                .into_iter()
                .enumerate()
                .map(|(i, dets)| (i as u64, dets))
                .collect(),
            cursor: 0,
        }
    }

    /// Index of the next frame to be replayed.
    pub fn position(&self) -> u64 {
        self.cursor
    }
}

impl DetectionSource for ReplayDetections {
    type Error = Infallible;

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>, Self::Error> {
        let dets = self.frames.get(&self.cursor).cloned().unwrap_or_default();
        self.cursor += 1;
        Ok(dets)
    }
}
