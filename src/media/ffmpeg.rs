//! FFmpeg command builder and the subprocess-backed media backend.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::config::EncoderConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::media::probe::probe_stream;
use crate::media::{FfmpegSink, FfmpegSource, MediaBackend, SourceTarget};

/// Builder for FFmpeg argument lists.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input path, device or `-` for stdin
    input: String,
    /// Output path or `-` for stdout
    output: String,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Decode to packed RGB24 frames, video only.
    pub fn raw_rgb_output(self) -> Self {
        self.output_args(["-an", "-f", "rawvideo"]).pixel_format("rgb24")
    }

    /// Read packed RGB24 frames of the given size and rate.
    pub fn raw_rgb_input(self, width: u32, height: u32, frame_rate: f64) -> Self {
        self.input_args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .input_arg("-s")
            .input_arg(format!("{width}x{height}"))
            .input_arg("-r")
            .input_arg(format!("{frame_rate:.3}"))
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push("-hide_banner".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.clone());

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.clone());

        args
    }
}

/// Input arguments and input name for a target. `None` when capture by
/// device index is not available on this platform.
pub(crate) fn input_for(target: &SourceTarget) -> Option<(Vec<String>, String)> {
    match target {
        SourceTarget::File(path) => Some((Vec::new(), path.to_string_lossy().to_string())),
        SourceTarget::Camera(index) => camera_input(*index),
    }
}

#[cfg(target_os = "linux")]
fn camera_input(index: u32) -> Option<(Vec<String>, String)> {
    Some((
        vec!["-f".to_string(), "v4l2".to_string()],
        format!("/dev/video{index}"),
    ))
}

#[cfg(target_os = "macos")]
fn camera_input(index: u32) -> Option<(Vec<String>, String)> {
    Some((
        vec!["-f".to_string(), "avfoundation".to_string()],
        format!("{index}:none"),
    ))
}

// dshow selects devices by name, not by index.
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn camera_input(_index: u32) -> Option<(Vec<String>, String)> {
    None
}

/// [`MediaBackend`] driving the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    config: EncoderConfig,
}

impl FfmpegBackend {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn locate(binary: &Path) -> Result<PathBuf, which::Error> {
        which::which(binary)
    }

    /// Encoder reading RGB24 frames from stdin. The output keeps the source
    /// size; codecs that only take even sizes get a one-pixel pad instead
    /// of failing.
    fn encoder_command(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        frame_rate: f64,
    ) -> FfmpegCommand {
        let codec = self.config.codec.as_str();
        let mut command = FfmpegCommand::new("-", path.to_string_lossy())
            .raw_rgb_input(width, height, frame_rate)
            .output_arg("-an");
        if (width % 2 == 1 || height % 2 == 1) && needs_even_dimensions(codec) {
            command = command.video_filter("pad=ceil(iw/2)*2:ceil(ih/2)*2");
        }
        command.video_codec(codec).pixel_format("yuv420p")
    }
}

/// H.264/H.265 encoders reject odd frame sizes with yuv420p.
fn needs_even_dimensions(codec: &str) -> bool {
    ["libx264", "libx265", "h264", "hevc"]
        .iter()
        .any(|family| codec.starts_with(family))
}

impl MediaBackend for FfmpegBackend {
    type Source = FfmpegSource;
    type Sink = FfmpegSink;

    fn open_source(&self, target: &SourceTarget) -> PipelineResult<FfmpegSource> {
        if let SourceTarget::File(path) = target {
            if !path.is_file() {
                return Err(PipelineError::source_unavailable(target, "no such file"));
            }
        }

        let ffprobe = Self::locate(&self.config.ffprobe).map_err(|e| {
            PipelineError::source_unavailable(target, format!("ffprobe not found: {e}"))
        })?;
        let ffmpeg = Self::locate(&self.config.ffmpeg).map_err(|e| {
            PipelineError::source_unavailable(target, format!("ffmpeg not found: {e}"))
        })?;

        let (input_args, input) = input_for(target).ok_or_else(|| {
            PipelineError::source_unavailable(
                target,
                "camera capture by index is not supported on this platform",
            )
        })?;
        let info = probe_stream(&ffprobe, &input_args, &input, target)?;
        debug!(input = %target, ?info, "probed source");

        let command = FfmpegCommand::new(input, "-")
            .input_args(input_args)
            .raw_rgb_output();
        FfmpegSource::spawn(&ffmpeg, &command, info, target.clone())
    }

    fn open_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        frame_rate: f64,
    ) -> PipelineResult<FfmpegSink> {
        let ffmpeg = Self::locate(&self.config.ffmpeg)
            .map_err(|e| PipelineError::processing(format!("ffmpeg not found: {e}")))?;

        let command = self.encoder_command(path, width, height, frame_rate);
        FfmpegSink::spawn(&ffmpeg, &command, path, width, height)
    }

    fn transcode(&self, input: &Path, output: &Path) -> PipelineResult<()> {
        let ffmpeg = Self::locate(&self.config.ffmpeg).map_err(|e| {
            PipelineError::transcode_failed(format!("ffmpeg not found: {e}"), None, None)
        })?;

        let args = FfmpegCommand::new(input.to_string_lossy(), output.to_string_lossy())
            .video_codec(self.config.repair_codec.clone())
            .pixel_format("yuv420p")
            .build_args();

        info!(input = %input.display(), output = %output.display(), "transcoding unreadable input");
        let result = Command::new(&ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        let failure = match result {
            Ok(out) if out.status.success() => return Ok(()),
            Ok(out) => PipelineError::transcode_failed(
                format!("ffmpeg exited with {}", out.status),
                Some(String::from_utf8_lossy(&out.stderr).to_string()),
                out.status.code(),
            ),
            Err(e) => PipelineError::transcode_failed(format!("failed to run ffmpeg: {e}"), None, None),
        };

        if output.exists() {
            if let Err(e) = std::fs::remove_file(output) {
                warn!(path = %output.display(), error = %e, "failed to remove partial transcode");
            }
        }
        Err(failure)
    }
}
