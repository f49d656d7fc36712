//! Error types for a pipeline run.

use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that end a run.
///
/// Soft terminations (end of file, a camera that stops delivering frames,
/// the duration bound) are not errors; they surface as a
/// [`StopReason`](crate::integration::StopReason) on the result instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The frame source could not be opened at all.
    #[error("source unavailable ({target}): {reason}")]
    SourceUnavailable { target: String, reason: String },

    /// The external codec repair step exited abnormally or was missing.
    #[error("transcode failed: {message}")]
    TranscodeFailure {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// Failure inside the frame loop: decode, encode or adapter errors.
    #[error("processing failed: {message}")]
    Processing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create a source-unavailable error.
    pub fn source_unavailable(target: impl ToString, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a transcode failure error.
    pub fn transcode_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::TranscodeFailure {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a processing error without an underlying cause.
    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an error raised by a detector, tracker or codec adapter.
    pub fn adapter<E>(stage: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Processing {
            message: format!("{stage}: {err}"),
            source: Some(Box::new(err)),
        }
    }

    /// Whether the run failed before any output could be produced.
    pub fn is_fatal_open(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::TranscodeFailure { .. } | Self::InvalidConfig(_)
        )
    }

    /// Whether this error belongs to the in-loop processing class.
    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing { .. } | Self::Io(_))
    }
}
