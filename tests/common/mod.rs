//! In-memory media backend for driving the pipeline without ffmpeg.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use headcount_rs::{
    Frame, FrameSink, FrameSource, MediaBackend, PipelineError, PipelineResult, RawDetection,
    SourceTarget,
};

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 240;

/// Counters shared between a backend and every handle it opened.
#[derive(Debug, Default)]
pub struct Ledger {
    pub sources_opened: AtomicUsize,
    pub sources_released: AtomicUsize,
    pub sinks_opened: AtomicUsize,
    pub sinks_released: AtomicUsize,
    pub frames_written: AtomicUsize,
    pub transcodes: AtomicUsize,
}

impl Ledger {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn all_released(&self) -> bool {
        Self::get(&self.sources_opened) == Self::get(&self.sources_released)
            && Self::get(&self.sinks_opened) == Self::get(&self.sinks_released)
    }
}

/// What a fake input produces.
#[derive(Debug, Clone, Copy)]
pub struct Footage {
    pub frames: u64,
    pub frame_rate: f64,
    /// Fail the read of this zero-based frame
    pub read_error_at: Option<u64>,
}

impl Footage {
    pub fn frames(frames: u64) -> Self {
        Self {
            frames,
            frame_rate: 30.0,
            read_error_at: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeBackend {
    pub ledger: Arc<Ledger>,
    pub file: Footage,
    pub camera: Option<Footage>,
    /// Files not produced by a transcode decode zero frames
    pub unreadable_originals: bool,
    pub fail_transcode: bool,
    /// Fail writing this zero-based frame
    pub sink_error_at: Option<u64>,
}

impl FakeBackend {
    pub fn new(file: Footage) -> Self {
        Self {
            ledger: Arc::new(Ledger::default()),
            file,
            camera: None,
            unreadable_originals: false,
            fail_transcode: false,
            sink_error_at: None,
        }
    }

    pub fn camera(camera: Footage) -> Self {
        Self {
            camera: Some(camera),
            ..Self::new(Footage::frames(0))
        }
    }
}

impl MediaBackend for FakeBackend {
    type Source = FakeSource;
    type Sink = FakeSink;

    fn open_source(&self, target: &SourceTarget) -> PipelineResult<FakeSource> {
        let footage = match target {
            SourceTarget::File(path) => {
                if !path.is_file() {
                    return Err(PipelineError::source_unavailable(target, "no such file"));
                }
                let transcoded = path.to_string_lossy().contains("_fixed");
                if self.unreadable_originals && !transcoded {
                    Footage::frames(0)
                } else {
                    self.file
                }
            }
            SourceTarget::Camera(_) => self
                .camera
                .ok_or_else(|| PipelineError::source_unavailable(target, "no camera"))?,
        };
        self.ledger.sources_opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSource {
            footage,
            next: 0,
            released: false,
            ledger: Arc::clone(&self.ledger),
        })
    }

    fn open_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        _frame_rate: f64,
    ) -> PipelineResult<FakeSink> {
        std::fs::write(path, b"")?;
        self.ledger.sinks_opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSink {
            path: path.to_path_buf(),
            size: (width, height),
            written: 0,
            error_at: self.sink_error_at,
            released: false,
            ledger: Arc::clone(&self.ledger),
        })
    }

    fn transcode(&self, _input: &Path, output: &Path) -> PipelineResult<()> {
        if self.fail_transcode {
            return Err(PipelineError::transcode_failed(
                "ffmpeg exited with 1",
                Some("Invalid data found when processing input".to_string()),
                Some(1),
            ));
        }
        std::fs::write(output, b"transcoded")?;
        self.ledger.transcodes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeSource {
    footage: Footage,
    next: u64,
    released: bool,
    ledger: Arc<Ledger>,
}

impl FrameSource for FakeSource {
    fn width(&self) -> u32 {
        WIDTH
    }

    fn height(&self) -> u32 {
        HEIGHT
    }

    fn frame_rate(&self) -> f64 {
        self.footage.frame_rate
    }

    fn next_frame(&mut self) -> PipelineResult<Option<Frame>> {
        if self.footage.read_error_at == Some(self.next) {
            return Err(PipelineError::from(std::io::Error::other("device went away")));
        }
        if self.next >= self.footage.frames {
            return Ok(None);
        }
        self.next += 1;
        Ok(Some(Frame::new(WIDTH, HEIGHT)))
    }

    fn release(&mut self) -> PipelineResult<()> {
        if !self.released {
            self.released = true;
            self.ledger.sources_released.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

pub struct FakeSink {
    path: PathBuf,
    size: (u32, u32),
    written: u64,
    error_at: Option<u64>,
    released: bool,
    ledger: Arc<Ledger>,
}

impl FrameSink for FakeSink {
    fn write_frame(&mut self, frame: &Frame) -> PipelineResult<()> {
        assert_eq!(frame.dimensions(), self.size);
        if self.error_at == Some(self.written) {
            return Err(PipelineError::processing(format!(
                "injected write failure at frame {} of {}",
                self.written,
                self.path.display()
            )));
        }
        self.written += 1;
        self.ledger.frames_written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) -> PipelineResult<()> {
        if !self.released {
            self.released = true;
            self.ledger.sinks_released.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for FakeSink {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// A standing person at `x`, 40px wide.
pub fn person_at(x: f32, score: f32) -> RawDetection {
    RawDetection::person([x, 40.0, x + 40.0, 200.0], score)
}

/// Detections for `frames` frames, each person at `x` during its range.
pub fn script(frames: usize, people: &[(f32, std::ops::Range<usize>)]) -> Vec<Vec<RawDetection>> {
    scored_script(frames, people, 0.9)
}

/// Like [`script`], every detection scoring `score`.
pub fn scored_script(
    frames: usize,
    people: &[(f32, std::ops::Range<usize>)],
    score: f32,
) -> Vec<Vec<RawDetection>> {
    (0..frames)
        .map(|i| {
            people
                .iter()
                .filter(|(_, range)| range.contains(&i))
                .map(|(x, _)| person_at(*x, score))
                .collect()
        })
        .collect()
}
