use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::media::{FfmpegCommand, Frame, FrameSink};

/// Annotated frames piped into an `ffmpeg` encoder.
pub struct FfmpegSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    path: PathBuf,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl FfmpegSink {
    pub(crate) fn spawn(
        ffmpeg: &Path,
        command: &FfmpegCommand,
        path: &Path,
        width: u32,
        height: u32,
    ) -> PipelineResult<Self> {
        let mut child = Command::new(ffmpeg)
            .args(command.build_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PipelineError::adapter("spawning encoder", e))?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(PipelineError::processing("encoder stdin not captured"));
        };

        debug!(path = %path.display(), width, height, "encoder started");
        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            path: path.to_path_buf(),
            width,
            height,
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> PipelineResult<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(PipelineError::processing(format!(
                "frame is {:?}, encoder expects {}x{}",
                frame.dimensions(),
                self.width,
                self.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| PipelineError::processing("write after encoder release"))?;
        stdin.write_all(frame.as_raw())?;
        self.frames_written += 1;
        Ok(())
    }

    fn release(&mut self) -> PipelineResult<()> {
        // Closing stdin lets ffmpeg finish the container.
        self.stdin = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        debug!(path = %self.path.display(), frames = self.frames_written, %status, "encoder released");
        if !status.success() {
            return Err(PipelineError::processing(format!(
                "encoder for {} exited with {status}",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.child.is_none()
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path.display(), error = %e, "failed to release encoder");
        }
    }
}
