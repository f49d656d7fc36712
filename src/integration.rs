//! Detection, tracking and the pipeline that ties them to the media layer.
//!
//! Models plug in through [`DetectionSource`] and tracking backends through
//! [`Tracker`]. [`Pipeline`] owns one of each for a single run.

mod builder;
mod detector;
mod identities;
mod pipeline;
mod replay;
mod tracking;

pub use builder::DetectionBuilder;
pub use detector::{DetectionSource, PERSON_CLASS_ID, PersonDetector, RawDetection, filter_people};
pub use identities::UniqueIdentities;
pub use pipeline::{FrameStats, Pipeline, RunResult, StopReason};
pub use replay::{FrameDetections, ReplayDetections, ReplayError};
pub use tracking::{ByteTrackAdapter, Confirmation, Track, Tracker};

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnDetector, BurnDetectorError, BurnModel};
