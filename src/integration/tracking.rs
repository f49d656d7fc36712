//! Tracker seam: what the pipeline sees of a tracking backend.

use serde::Serialize;

use crate::media::Frame;
use crate::tracker::{BYTETracker, Detection, Rect, STrack, TrackState, TrackerConfig};

/// Confirmation lifecycle of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    Tentative,
    Confirmed,
    Deleted,
}

/// Read-only view of a backend track.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: u64,
    pub state: Confirmation,
    /// Last known box
    pub bbox: Rect,
}

impl Track {
    pub fn is_confirmed(&self) -> bool {
        self.state == Confirmation::Confirmed
    }
}

impl From<&STrack> for Track {
    fn from(track: &STrack) -> Self {
        let state = match track.state {
            TrackState::Removed => Confirmation::Deleted,
            _ if track.is_activated => Confirmation::Confirmed,
            _ => Confirmation::Tentative,
        };
        Self {
            id: track.track_id,
            state,
            bbox: track.rect(),
        }
    }
}

/// A multi-object tracking backend.
///
/// `update` must be called exactly once per frame, in frame order. The
/// returned tracks may include tentative ones.
pub trait Tracker {
    fn update(&mut self, detections: Vec<Detection>, frame: &Frame) -> Vec<Track>;
}

impl<T: Tracker + ?Sized> Tracker for Box<T> {
    fn update(&mut self, detections: Vec<Detection>, frame: &Frame) -> Vec<Track> {
        (**self).update(detections, frame)
    }
}

/// [`Tracker`] backed by the in-crate [`BYTETracker`].
///
/// ByteTrack is motion-only, so the frame pixels are not looked at.
pub struct ByteTrackAdapter {
    tracker: BYTETracker,
}

impl ByteTrackAdapter {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tracker: BYTETracker::new(config),
        }
    }

    pub fn tracker(&self) -> &BYTETracker {
        &self.tracker
    }
}

impl Default for ByteTrackAdapter {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl Tracker for ByteTrackAdapter {
    fn update(&mut self, detections: Vec<Detection>, _frame: &Frame) -> Vec<Track> {
        self.tracker
            .update(detections)
            .iter()
            .map(Track::from)
            .collect()
    }
}
