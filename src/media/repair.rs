//! Codec repair: re-encode inputs the decoder cannot read.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::media::{FrameSource, MediaBackend, SourceTarget};

/// Suffix appended to the output stem for the repaired copy.
const REPAIRED_SUFFIX: &str = "_fixed";

/// The file a run actually reads from.
///
/// A transcoded copy is deleted when this value is dropped.
#[derive(Debug)]
pub struct RepairedInput {
    path: PathBuf,
    temporary: bool,
}

impl RepairedInput {
    /// The caller's file, used as is.
    pub fn original(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temporary: false,
        }
    }

    /// A transcoded copy owned by the run.
    pub fn transcoded(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temporary: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Delete the transcoded copy now instead of on drop.
    pub fn cleanup(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if !self.temporary {
            return;
        }
        self.temporary = false;
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed repaired input"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove repaired input"),
        }
    }
}

impl Drop for RepairedInput {
    fn drop(&mut self) {
        self.remove();
    }
}

/// `<dir>/<stem>_fixed.mp4` next to `output`.
pub fn repaired_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{stem}{REPAIRED_SUFFIX}.mp4"))
}

/// Whether the backend can open `input` and decode at least one frame.
fn is_readable<B: MediaBackend>(backend: &B, input: &Path) -> bool {
    let target = SourceTarget::File(input.to_path_buf());
    let mut source = match backend.open_source(&target) {
        Ok(source) => source,
        Err(e) => {
            debug!(input = %input.display(), error = %e, "probe open failed");
            return false;
        }
    };
    let readable = matches!(source.next_frame(), Ok(Some(_)));
    if let Err(e) = source.release() {
        warn!(input = %input.display(), error = %e, "failed to release probe");
    }
    readable
}

/// Make sure `input` is decodable, transcoding it to `repaired` if not.
///
/// Readable inputs are returned untouched. A missing input is
/// `SourceUnavailable`; a failed transcode is `TranscodeFailure`.
pub fn repair_codec<B: MediaBackend>(
    backend: &B,
    input: &Path,
    repaired: &Path,
) -> PipelineResult<RepairedInput> {
    if !input.is_file() {
        return Err(PipelineError::source_unavailable(
            SourceTarget::File(input.to_path_buf()),
            "no such file",
        ));
    }

    if is_readable(backend, input) {
        debug!(input = %input.display(), "input decodes as is");
        return Ok(RepairedInput::original(input));
    }

    info!(input = %input.display(), repaired = %repaired.display(), "input unreadable, repairing codec");
    backend.transcode(input, repaired)?;
    Ok(RepairedInput::transcoded(repaired))
}
