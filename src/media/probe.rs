//! FFprobe stream information.

use std::path::Path;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::media::SourceTarget;

/// Geometry and rate of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// 0.0 when the container does not say
    pub frame_rate: f64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe the first video stream of `input`.
pub(crate) fn probe_stream(
    ffprobe: &Path,
    input_args: &[String],
    input: &str,
    target: &SourceTarget,
) -> PipelineResult<StreamInfo> {
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_streams", "-print_format", "json"])
        .args(input_args)
        .arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| PipelineError::source_unavailable(target, format!("ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::source_unavailable(
            target,
            format!("ffprobe exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    parse_probe_output(&output.stdout)
        .map_err(|reason| PipelineError::source_unavailable(target, reason))
}

pub(crate) fn parse_probe_output(json: &[u8]) -> Result<StreamInfo, String> {
    let probe: FfprobeOutput =
        serde_json::from_slice(json).map_err(|e| format!("unreadable ffprobe output: {e}"))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref().is_none_or(|t| t == "video"))
        .ok_or_else(|| "no video stream found".to_string())?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no dimensions".to_string()),
    };

    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    Ok(StreamInfo {
        width,
        height,
        frame_rate,
    })
}

/// Parse `"30000/1001"` or `"25"`. Zero or undefined rates give `None`.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}
