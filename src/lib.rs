//! People counting over recorded video or a live camera.
//!
//! Frames are pulled from a [`media::FrameSource`], filtered down to person
//! detections, tracked with ByteTrack, annotated and written to a
//! [`media::FrameSink`]. The [`integration::Pipeline`] drives that loop and
//! reports how many distinct people were confirmed over the whole run.
//!
//! ```ignore
//! use headcount_rs::{
//!     ByteTrackAdapter, FfmpegBackend, Pipeline, PipelineConfig, ReplayDetections,
//! };
//!
//! let config = PipelineConfig::default();
//! let backend = FfmpegBackend::new(config.encoder.clone());
//! let detector = ReplayDetections::from_path("detections.jsonl")?;
//! let tracker = ByteTrackAdapter::new(config.tracker_config());
//!
//! let result = Pipeline::new(backend, detector, tracker, config)
//!     .process_video("input.mp4".as_ref(), "output.mp4".as_ref())?;
//! println!("{} people", result.total_unique_people);
//! ```

pub mod annotate;
pub mod config;
pub mod error;
pub mod integration;
pub mod media;
pub mod tracker;

pub use annotate::Annotator;
pub use config::{EncoderConfig, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use integration::{
    ByteTrackAdapter, Confirmation, DetectionSource, FrameStats, PersonDetector, Pipeline,
    RawDetection, ReplayDetections, RunResult, StopReason, Track, Tracker, UniqueIdentities,
};
pub use media::{FfmpegBackend, Frame, FrameSink, FrameSource, MediaBackend, SourceTarget};
pub use tracker::{BYTETracker, Detection, Rect, TrackerConfig};
