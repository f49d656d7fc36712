//! The per-frame detect, track, annotate loop and its resource lifecycle.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::annotate::Annotator;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::integration::{DetectionSource, PersonDetector, Tracker, UniqueIdentities};
use crate::media::repair::{repair_codec, repaired_path_for};
use crate::media::{FrameSink, FrameSource, MediaBackend, SourceTarget, effective_frame_rate};

/// Why the frame loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The source ran out of frames.
    EndOfStream,
    /// A live source stopped delivering frames.
    ReadFailure,
    /// The camera recording reached its configured length.
    DurationReached,
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub total_unique_people: usize,
    pub total_frames: u64,
    /// Recorded length, camera runs only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub stop_reason: StopReason,
}

/// Counters after a frame has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Zero-based index of the frame just written
    pub frame_index: u64,
    /// Confirmed tracks in this frame
    pub active: usize,
    /// Distinct confirmed identities so far
    pub unique: usize,
}

type Observer = Box<dyn FnMut(&FrameStats)>;

/// Detector, tracker and annotator for a single run.
///
/// The run methods consume the pipeline, so tracker state never leaks from
/// one video into the next.
pub struct Pipeline<B, D, T> {
    backend: B,
    detector: PersonDetector<D>,
    tracker: T,
    annotator: Annotator,
    config: PipelineConfig,
    observer: Option<Observer>,
}

impl<B, D, T> Pipeline<B, D, T>
where
    B: MediaBackend,
    D: DetectionSource,
    D::Error: std::error::Error + Send + Sync + 'static,
    T: Tracker,
{
    /// The annotator font comes from `config.font_path` or the system.
    pub fn new(backend: B, detector: D, tracker: T, config: PipelineConfig) -> Self {
        let annotator = Annotator::load(config.font_path.as_deref());
        Self {
            backend,
            detector: PersonDetector::new(detector),
            tracker,
            annotator,
            config,
            observer: None,
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    /// Call `observer` after every written frame.
    pub fn with_observer(mut self, observer: impl FnMut(&FrameStats) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Count people in a video file, writing the annotated copy to `output`.
    ///
    /// Inputs the decoder cannot read are transcoded next to `output` first;
    /// that copy is removed before returning, on success or failure.
    pub fn process_video(self, input: &Path, output: &Path) -> PipelineResult<RunResult> {
        self.config.validate()?;
        let repaired = repair_codec(&self.backend, input, &repaired_path_for(output))?;
        let target = SourceTarget::File(repaired.path().to_path_buf());
        let result = self.run(target, output);
        repaired.cleanup();
        result
    }

    /// Record from the configured camera for `duration_seconds`.
    pub fn process_camera(self, output: &Path) -> PipelineResult<RunResult> {
        self.config.validate()?;
        let target = SourceTarget::Camera(self.config.camera_index);
        self.run(target, output)
    }

    fn run(mut self, target: SourceTarget, output: &Path) -> PipelineResult<RunResult> {
        let mut source = self.backend.open_source(&target)?;
        let frame_rate = effective_frame_rate(source.frame_rate());
        let (width, height) = (source.width(), source.height());
        let mut sink = self.backend.open_sink(output, width, height, frame_rate)?;

        let frame_budget = target
            .is_live()
            .then(|| (f64::from(self.config.duration_seconds) * frame_rate).floor() as u64);
        info!(
            input = %target,
            output = %output.display(),
            width,
            height,
            frame_rate,
            ?frame_budget,
            "run started"
        );

        let outcome = self.frame_loop(&mut source, &mut sink, &target, frame_budget);

        // Both handles are released before any error is returned.
        let source_released = source.release();
        let sink_released = sink.release();
        let (total_frames, unique, stop_reason) = outcome?;
        source_released?;
        sink_released?;

        let result = RunResult {
            total_unique_people: unique,
            total_frames,
            duration_seconds: target
                .is_live()
                .then(|| total_frames as f64 / frame_rate),
            stop_reason,
        };
        info!(
            frames = result.total_frames,
            unique = result.total_unique_people,
            stop = ?result.stop_reason,
            "run finished"
        );
        Ok(result)
    }

    fn frame_loop(
        &mut self,
        source: &mut B::Source,
        sink: &mut B::Sink,
        target: &SourceTarget,
        frame_budget: Option<u64>,
    ) -> PipelineResult<(u64, usize, StopReason)> {
        let threshold = self.config.confidence_threshold;
        let interval = self.config.progress_interval.max(1);
        let started = Instant::now();
        let mut identities = UniqueIdentities::new();
        let mut frame_count: u64 = 0;

        let stop = loop {
            if frame_budget.is_some_and(|budget| frame_count >= budget) {
                break StopReason::DurationReached;
            }

            let mut frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break StopReason::EndOfStream,
                Err(e) if target.is_live() => {
                    warn!(input = %target, frame = frame_count, error = %e, "capture stopped");
                    break StopReason::ReadFailure;
                }
                Err(e) => return Err(e),
            };

            let detections = self
                .detector
                .detect(&frame, threshold)
                .map_err(|e| PipelineError::adapter("detector", e))?;
            let tracks = self.tracker.update(detections, &frame);
            let new_ids = identities.observe(&tracks);
            if new_ids > 0 {
                debug!(frame = frame_count, new_ids, unique = identities.len(), "new identities");
            }

            let active = self.annotator.annotate(&mut frame, &tracks, identities.len());
            sink.write_frame(&frame)?;
            frame_count += 1;

            if let Some(observer) = self.observer.as_mut() {
                observer(&FrameStats {
                    frame_index: frame_count - 1,
                    active,
                    unique: identities.len(),
                });
            }

            if frame_count % interval == 0 {
                if target.is_live() {
                    info!(
                        frames = frame_count,
                        unique = identities.len(),
                        elapsed_secs = started.elapsed().as_secs_f64(),
                        "recording"
                    );
                } else {
                    info!(frames = frame_count, unique = identities.len(), "processing");
                }
            }
        };

        Ok((frame_count, identities.len(), stop))
    }
}
