//! Run configuration.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{PipelineError, PipelineResult};
use crate::tracker::TrackerConfig;

/// Accepted range for the detection confidence threshold.
pub const CONFIDENCE_RANGE: (f32, f32) = (0.1, 1.0);
/// Accepted range for a camera recording, in seconds.
pub const DURATION_RANGE: (u32, u32) = (5, 300);

/// FFmpeg binaries and output encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    /// ffmpeg executable, looked up in PATH when not absolute
    pub ffmpeg: PathBuf,
    /// ffprobe executable
    pub ffprobe: PathBuf,
    /// Video codec of the annotated output
    pub codec: String,
    /// Codec used when repairing an unreadable input
    pub repair_codec: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            codec: "mpeg4".to_string(),
            repair_codec: "libx264".to_string(),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// People must score strictly above this to be tracked
    pub confidence_threshold: f32,
    /// Recording length for camera runs
    pub duration_seconds: u32,
    pub camera_index: u32,
    /// Log progress every this many frames
    pub progress_interval: u64,
    /// TrueType font for labels; well-known system fonts are tried when unset
    pub font_path: Option<PathBuf>,
    /// Base tracker settings; see [`PipelineConfig::tracker_config`]
    pub tracker: TrackerConfig,
    pub encoder: EncoderConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.35,
            duration_seconds: 30,
            camera_index: 0,
            progress_interval: 30,
            font_path: None,
            tracker: TrackerConfig::default(),
            encoder: EncoderConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from `HEADCOUNT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` knows. Unparsable values
    /// fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            confidence_threshold: parse_var(&lookup, "HEADCOUNT_CONFIDENCE")
                .unwrap_or(defaults.confidence_threshold),
            duration_seconds: parse_var(&lookup, "HEADCOUNT_DURATION")
                .unwrap_or(defaults.duration_seconds),
            camera_index: parse_var(&lookup, "HEADCOUNT_CAMERA_INDEX")
                .unwrap_or(defaults.camera_index),
            progress_interval: parse_var(&lookup, "HEADCOUNT_PROGRESS_INTERVAL")
                .unwrap_or(defaults.progress_interval),
            font_path: lookup("HEADCOUNT_FONT").map(PathBuf::from),
            tracker: TrackerConfig {
                n_init: parse_var(&lookup, "HEADCOUNT_N_INIT")
                    .unwrap_or(defaults.tracker.n_init),
                track_buffer: parse_var(&lookup, "HEADCOUNT_MAX_AGE")
                    .unwrap_or(defaults.tracker.track_buffer),
                ..defaults.tracker
            },
            encoder: EncoderConfig {
                ffmpeg: lookup("HEADCOUNT_FFMPEG")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.encoder.ffmpeg),
                ffprobe: lookup("HEADCOUNT_FFPROBE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.encoder.ffprobe),
                codec: lookup("HEADCOUNT_CODEC").unwrap_or(defaults.encoder.codec),
                repair_codec: defaults.encoder.repair_codec,
            },
        }
    }

    /// Tracker settings for a run at `confidence_threshold`.
    ///
    /// Every detection that passes the person filter may start and keep a
    /// track, so the score gates follow the threshold and matching is on
    /// overlap alone.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            track_thresh: self.confidence_threshold,
            new_track_thresh: self.confidence_threshold,
            fuse_score: false,
            ..self.tracker.clone()
        }
    }

    /// Check the caller-facing ranges.
    pub fn validate(&self) -> PipelineResult<()> {
        let (min_conf, max_conf) = CONFIDENCE_RANGE;
        if !(min_conf..=max_conf).contains(&self.confidence_threshold) {
            return Err(PipelineError::InvalidConfig(format!(
                "confidence threshold {} outside [{min_conf}, {max_conf}]",
                self.confidence_threshold
            )));
        }
        let (min_dur, max_dur) = DURATION_RANGE;
        if !(min_dur..=max_dur).contains(&self.duration_seconds) {
            return Err(PipelineError::InvalidConfig(format!(
                "duration {}s outside [{min_dur}, {max_dur}]",
                self.duration_seconds
            )));
        }
        if self.progress_interval == 0 {
            return Err(PipelineError::InvalidConfig(
                "progress interval must be at least one frame".to_string(),
            ));
        }
        if self.tracker.n_init == 0 {
            return Err(PipelineError::InvalidConfig(
                "n_init must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}
