//! Frame sources, frame sinks and the backend that opens them.
//!
//! The pipeline only talks to the traits here. [`FfmpegBackend`] is the
//! production implementation; tests swap in an in-memory backend.

mod ffmpeg;
mod probe;
pub mod repair;
mod sink;
mod source;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::PipelineResult;

pub use ffmpeg::{FfmpegBackend, FfmpegCommand};
pub use probe::{StreamInfo, parse_frame_rate};
pub use repair::{RepairedInput, repair_codec, repaired_path_for};
pub use sink::FfmpegSink;
pub use source::FfmpegSource;

/// Decoded frame, 8-bit RGB.
pub type Frame = image::RgbImage;

/// Frame rate assumed when a source does not report one.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Reported frame rate, or [`DEFAULT_FRAME_RATE`] when it is missing or bogus.
pub fn effective_frame_rate(reported: f64) -> f64 {
    if reported.is_finite() && reported > 0.0 {
        reported
    } else {
        DEFAULT_FRAME_RATE
    }
}

/// What to read frames from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTarget {
    File(PathBuf),
    /// Capture device index
    Camera(u32),
}

impl SourceTarget {
    /// Live sources treat read failures as the end of the footage.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Camera(_))
    }
}

impl fmt::Display for SourceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Camera(index) => write!(f, "camera {index}"),
        }
    }
}

/// An open video input.
///
/// Owns one underlying resource. `release` is idempotent and implementations
/// also release on drop.
pub trait FrameSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Reported frame rate, 0.0 when unknown.
    fn frame_rate(&self) -> f64;
    /// Next frame, `None` at end of stream.
    fn next_frame(&mut self) -> PipelineResult<Option<Frame>>;
    fn release(&mut self) -> PipelineResult<()>;
    fn is_released(&self) -> bool;
}

/// An open video output.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> PipelineResult<()>;
    /// Flush and close the output. Idempotent.
    fn release(&mut self) -> PipelineResult<()>;
    fn is_released(&self) -> bool;
}

/// Opens sources and sinks, and runs the external transcoder.
pub trait MediaBackend {
    type Source: FrameSource;
    type Sink: FrameSink;

    /// Fails with `SourceUnavailable` when the target cannot be opened.
    fn open_source(&self, target: &SourceTarget) -> PipelineResult<Self::Source>;

    fn open_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        frame_rate: f64,
    ) -> PipelineResult<Self::Sink>;

    /// Write a widely decodable copy of `input` to `output`. Fails with
    /// `TranscodeFailure`.
    fn transcode(&self, input: &Path, output: &Path) -> PipelineResult<()>;
}
