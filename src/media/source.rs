use std::io::{self, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::media::{FfmpegCommand, Frame, FrameSource, SourceTarget, StreamInfo};

/// Frames decoded by an `ffmpeg` child process writing RGB24 to a pipe.
#[derive(Debug)]
pub struct FfmpegSource {
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    info: StreamInfo,
    target: SourceTarget,
}

impl FfmpegSource {
    pub(crate) fn spawn(
        ffmpeg: &Path,
        command: &FfmpegCommand,
        info: StreamInfo,
        target: SourceTarget,
    ) -> PipelineResult<Self> {
        let mut child = Command::new(ffmpeg)
            .args(command.build_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PipelineError::source_unavailable(&target, format!("ffmpeg: {e}")))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(PipelineError::source_unavailable(
                &target,
                "ffmpeg stdout not captured",
            ));
        };

        debug!(input = %target, width = info.width, height = info.height, "decoder started");
        Ok(Self {
            child: Some(child),
            stdout: Some(BufReader::new(stdout)),
            info,
            target,
        })
    }

    pub fn target(&self) -> &SourceTarget {
        &self.target
    }
}

/// Fill `buf` unless the stream ends first. Returns the bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Turn one frame's worth of pipe output into a frame; `None` on a clean EOF.
pub(crate) fn read_frame(
    reader: &mut impl Read,
    width: u32,
    height: u32,
) -> PipelineResult<Option<Frame>> {
    let frame_len = width as usize * height as usize * 3;
    let mut buf = vec![0u8; frame_len];
    let filled = read_full(reader, &mut buf)?;
    if filled == 0 {
        return Ok(None);
    }
    if filled < frame_len {
        return Err(PipelineError::from(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("truncated frame: {filled} of {frame_len} bytes"),
        )));
    }
    Frame::from_raw(width, height, buf)
        .map(Some)
        .ok_or_else(|| PipelineError::processing("decoded buffer does not match frame size"))
}

impl FrameSource for FfmpegSource {
    fn width(&self) -> u32 {
        self.info.width
    }

    fn height(&self) -> u32 {
        self.info.height
    }

    fn frame_rate(&self) -> f64 {
        self.info.frame_rate
    }

    fn next_frame(&mut self) -> PipelineResult<Option<Frame>> {
        let Some(reader) = self.stdout.as_mut() else {
            return Err(PipelineError::processing(format!(
                "{} read after release",
                self.target
            )));
        };
        read_frame(reader, self.info.width, self.info.height)
    }

    fn release(&mut self) -> PipelineResult<()> {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            // Already exited at end of stream; a live capture is still running.
            let _ = child.kill();
            child.wait()?;
            debug!(input = %self.target, "decoder released");
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.child.is_none()
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(input = %self.target, error = %e, "failed to release decoder");
        }
    }
}
