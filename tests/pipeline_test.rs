mod common;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use common::{FakeBackend, Footage, Ledger, scored_script, script};
use headcount_rs::{
    Annotator, ByteTrackAdapter, Frame, FrameStats, Pipeline, PipelineConfig, PipelineError,
    RawDetection, ReplayDetections, RunResult, StopReason,
};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn input(&self) -> PathBuf {
        let path = self.dir.path().join("input.avi");
        std::fs::write(&path, b"not really a video").unwrap();
        path
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("output.mp4")
    }

    fn repaired(&self) -> PathBuf {
        self.dir.path().join("output_fixed.mp4")
    }
}

fn pipeline(
    backend: FakeBackend,
    frames: Vec<Vec<RawDetection>>,
    config: PipelineConfig,
) -> Pipeline<FakeBackend, ReplayDetections, ByteTrackAdapter> {
    let tracker = ByteTrackAdapter::new(config.tracker_config());
    Pipeline::new(backend, ReplayDetections::from_frames(frames), tracker, config)
        .with_annotator(Annotator::boxes_only())
}

fn run_video(backend: FakeBackend, frames: Vec<Vec<RawDetection>>, ws: &Workspace) -> RunResult {
    pipeline(backend, frames, PipelineConfig::default())
        .process_video(&ws.input(), &ws.output())
        .unwrap()
}

#[test]
fn test_single_person_counted_once() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(10));
    let ledger = backend.ledger.clone();

    let result = run_video(backend, script(10, &[(100.0, 2..10)]), &ws);

    assert_eq!(result.total_unique_people, 1);
    assert_eq!(result.total_frames, 10);
    assert_eq!(result.duration_seconds, None);
    assert_eq!(result.stop_reason, StopReason::EndOfStream);
    assert_eq!(Ledger::get(&ledger.frames_written), 10);
    assert!(ledger.all_released());
}

#[test]
fn test_distinct_identities() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(40));
    let people = [(10.0, 0..8), (130.0, 10..18), (250.0, 20..40)];

    let result = run_video(backend, script(40, &people), &ws);

    assert_eq!(result.total_unique_people, 3);
    assert_eq!(result.total_frames, 40);
}

#[test]
fn test_simultaneous_people() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(12));
    let people = [(10.0, 0..12), (130.0, 0..12), (250.0, 3..12)];

    let result = run_video(backend, script(12, &people), &ws);
    assert_eq!(result.total_unique_people, 3);
}

#[test]
fn test_brief_detection_is_not_counted() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(10));

    // Three frames is fewer than the five hits needed for confirmation.
    let result = run_video(backend, script(10, &[(100.0, 4..7)]), &ws);
    assert_eq!(result.total_unique_people, 0);
}

#[test]
fn test_unique_count_never_decreases() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(40));
    let people = [(10.0, 0..8), (130.0, 10..30), (250.0, 20..26)];

    let seen: Rc<RefCell<Vec<FrameStats>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let result = pipeline(backend, script(40, &people), PipelineConfig::default())
        .with_observer(move |stats| sink.borrow_mut().push(*stats))
        .process_video(&ws.input(), &ws.output())
        .unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 40);
    assert!(seen.windows(2).all(|w| w[0].unique <= w[1].unique));
    assert!(seen.iter().enumerate().all(|(i, s)| s.frame_index == i as u64));
    assert!(seen.iter().all(|s| s.active <= s.unique));
    assert_eq!(seen.last().unwrap().unique, result.total_unique_people);
}

#[test]
fn test_threshold_one_counts_nobody() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(10));
    let config = PipelineConfig {
        confidence_threshold: 1.0,
        ..PipelineConfig::default()
    };

    let result = pipeline(backend, script(10, &[(100.0, 0..10)]), config)
        .process_video(&ws.input(), &ws.output())
        .unwrap();
    assert_eq!(result.total_unique_people, 0);
    assert_eq!(result.total_frames, 10);
}

fn count_at(threshold: f32, score: f32) -> usize {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(20));
    let config = PipelineConfig {
        confidence_threshold: threshold,
        ..PipelineConfig::default()
    };

    pipeline(backend, scored_script(20, &[(100.0, 0..20)], score), config)
        .process_video(&ws.input(), &ws.output())
        .unwrap()
        .total_unique_people
}

#[test]
fn test_faint_people_above_threshold_are_counted() {
    assert_eq!(count_at(0.35, 0.40), 1);
    assert_eq!(count_at(0.20, 0.30), 1);
    assert_eq!(count_at(0.10, 0.12), 1);
    assert_eq!(count_at(0.35, 0.50), 1);
}

#[test]
fn test_threshold_is_exclusive_end_to_end() {
    assert_eq!(count_at(0.5, 0.501), 1);
    assert_eq!(count_at(0.5, 0.5), 0);
    assert_eq!(count_at(0.35, 0.35), 0);
}

#[test]
fn test_several_faint_people_counted() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(30));
    let config = PipelineConfig {
        confidence_threshold: 0.15,
        ..PipelineConfig::default()
    };
    let people = [(10.0, 0..10), (130.0, 5..20), (250.0, 15..30)];

    let result = pipeline(backend, scored_script(30, &people, 0.2), config)
        .process_video(&ws.input(), &ws.output())
        .unwrap();
    assert_eq!(result.total_unique_people, 3);
}

#[test]
fn test_other_classes_are_ignored() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(10));
    let cars = (0..10)
        .map(|_| vec![RawDetection::new([100.0, 40.0, 140.0, 200.0], 0.95, 2)])
        .collect();

    let result = run_video(backend, cars, &ws);
    assert_eq!(result.total_unique_people, 0);
}

#[test]
fn test_missing_input_is_unavailable() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(10));
    let ledger = backend.ledger.clone();
    let missing = ws.dir.path().join("nope.mp4");

    let err = pipeline(backend, Vec::new(), PipelineConfig::default())
        .process_video(&missing, &ws.output())
        .unwrap_err();

    assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    assert!(err.is_fatal_open());
    assert!(!ws.output().exists());
    assert_eq!(Ledger::get(&ledger.sinks_opened), 0);
    assert_eq!(Ledger::get(&ledger.transcodes), 0);
}

#[test]
fn test_invalid_config_rejected_before_opening() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(10));
    let ledger = backend.ledger.clone();
    let config = PipelineConfig {
        confidence_threshold: 0.01,
        ..PipelineConfig::default()
    };

    let err = pipeline(backend, Vec::new(), config)
        .process_video(&ws.input(), &ws.output())
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
    assert_eq!(Ledger::get(&ledger.sources_opened), 0);
}

#[test]
fn test_readable_input_is_never_transcoded() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(5));
    let ledger = backend.ledger.clone();

    for _ in 0..2 {
        run_video(backend.clone(), script(5, &[]), &ws);
    }

    assert_eq!(Ledger::get(&ledger.transcodes), 0);
    assert!(!ws.repaired().exists());
    assert!(ws.input().exists());
    assert!(ledger.all_released());
}

#[test]
fn test_unreadable_input_is_repaired_and_cleaned_up() {
    let ws = Workspace::new();
    let backend = FakeBackend {
        unreadable_originals: true,
        ..FakeBackend::new(Footage::frames(10))
    };
    let ledger = backend.ledger.clone();

    let result = run_video(backend, script(10, &[(100.0, 0..10)]), &ws);

    assert_eq!(result.total_frames, 10);
    assert_eq!(result.total_unique_people, 1);
    assert_eq!(Ledger::get(&ledger.transcodes), 1);
    assert!(!ws.repaired().exists());
    assert!(ws.input().exists());
    assert!(ledger.all_released());
}

#[test]
fn test_transcode_failure_is_fatal() {
    let ws = Workspace::new();
    let backend = FakeBackend {
        unreadable_originals: true,
        fail_transcode: true,
        ..FakeBackend::new(Footage::frames(10))
    };
    let ledger = backend.ledger.clone();

    let err = pipeline(backend, Vec::new(), PipelineConfig::default())
        .process_video(&ws.input(), &ws.output())
        .unwrap_err();

    match &err {
        PipelineError::TranscodeFailure { exit_code, .. } => assert_eq!(*exit_code, Some(1)),
        other => panic!("expected transcode failure, got {other:?}"),
    }
    assert!(!ws.output().exists());
    assert!(!ws.repaired().exists());
    assert_eq!(Ledger::get(&ledger.sinks_opened), 0);
    assert!(ledger.all_released());
}

#[test]
fn test_sink_failure_releases_everything() {
    let ws = Workspace::new();
    let backend = FakeBackend {
        unreadable_originals: true,
        sink_error_at: Some(3),
        ..FakeBackend::new(Footage::frames(10))
    };
    let ledger = backend.ledger.clone();

    let err = pipeline(backend, script(10, &[(100.0, 0..10)]), PipelineConfig::default())
        .process_video(&ws.input(), &ws.output())
        .unwrap_err();

    assert!(err.is_processing());
    assert!(err.to_string().contains("injected write failure at frame 3"));
    assert_eq!(Ledger::get(&ledger.frames_written), 3);
    assert!(ledger.all_released());
    assert!(!ws.repaired().exists());
}

#[test]
fn test_file_read_error_propagates() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage {
        read_error_at: Some(4),
        ..Footage::frames(10)
    });
    let ledger = backend.ledger.clone();

    let err = pipeline(backend, Vec::new(), PipelineConfig::default())
        .process_video(&ws.input(), &ws.output())
        .unwrap_err();

    assert!(matches!(err, PipelineError::Io(_)));
    assert!(ledger.all_released());
}

#[derive(Debug)]
struct BrokenModel;

impl headcount_rs::DetectionSource for BrokenModel {
    type Error = std::io::Error;

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>, Self::Error> {
        Err(std::io::Error::other("model crashed"))
    }
}

#[test]
fn test_detector_error_is_processing() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(10));
    let ledger = backend.ledger.clone();
    let config = PipelineConfig::default();
    let tracker = ByteTrackAdapter::new(config.tracker_config());

    let err = Pipeline::new(backend, BrokenModel, tracker, config)
        .with_annotator(Annotator::boxes_only())
        .process_video(&ws.input(), &ws.output())
        .unwrap_err();

    assert!(matches!(err, PipelineError::Processing { .. }));
    assert!(err.to_string().contains("detector: model crashed"));
    assert!(ledger.all_released());
}

fn camera_config(duration_seconds: u32) -> PipelineConfig {
    PipelineConfig {
        duration_seconds,
        camera_index: 0,
        ..PipelineConfig::default()
    }
}

fn run_camera(backend: FakeBackend, config: PipelineConfig, output: &Path) -> RunResult {
    pipeline(backend, script(400, &[(100.0, 10..400)]), config)
        .process_camera(output)
        .unwrap()
}

#[test]
fn test_camera_stops_at_duration() {
    let ws = Workspace::new();
    let backend = FakeBackend::camera(Footage {
        frame_rate: 0.0,
        ..Footage::frames(u64::MAX)
    });
    let ledger = backend.ledger.clone();

    let result = run_camera(backend, camera_config(5), &ws.output());

    assert_eq!(result.total_frames, 150);
    assert_eq!(result.duration_seconds, Some(5.0));
    assert_eq!(result.stop_reason, StopReason::DurationReached);
    assert_eq!(result.total_unique_people, 1);
    assert!(ledger.all_released());
}

#[test]
fn test_camera_uses_reported_rate() {
    let ws = Workspace::new();
    let backend = FakeBackend::camera(Footage {
        frame_rate: 15.0,
        ..Footage::frames(u64::MAX)
    });

    let result = run_camera(backend, camera_config(6), &ws.output());
    assert_eq!(result.total_frames, 90);
    assert_eq!(result.duration_seconds, Some(6.0));
}

#[test]
fn test_camera_read_failure_is_soft_stop() {
    let ws = Workspace::new();
    let backend = FakeBackend::camera(Footage {
        read_error_at: Some(45),
        ..Footage::frames(u64::MAX)
    });
    let ledger = backend.ledger.clone();

    let result = run_camera(backend, camera_config(30), &ws.output());

    assert_eq!(result.stop_reason, StopReason::ReadFailure);
    assert_eq!(result.total_frames, 45);
    assert_eq!(result.duration_seconds, Some(1.5));
    assert!(ledger.all_released());
}

#[test]
fn test_camera_end_of_stream() {
    let ws = Workspace::new();
    let backend = FakeBackend::camera(Footage::frames(20));

    let result = run_camera(backend, camera_config(30), &ws.output());
    assert_eq!(result.stop_reason, StopReason::EndOfStream);
    assert_eq!(result.total_frames, 20);
}

#[test]
fn test_missing_camera_is_unavailable() {
    let ws = Workspace::new();
    let backend = FakeBackend::new(Footage::frames(10));

    let err = pipeline(backend, Vec::new(), camera_config(5))
        .process_camera(&ws.output())
        .unwrap_err();
    assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    assert!(!ws.output().exists());
}
