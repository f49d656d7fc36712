//! Detection model seam and the person filter in front of the tracker.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::integration::DetectionBuilder;
use crate::media::Frame;
use crate::tracker::Detection;

/// COCO class index for "person".
pub const PERSON_CLASS_ID: u32 = 0;

/// Model output for one object, before any filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Corner pair `[x1, y1, x2, y2]` in frame pixels
    pub bbox: [f32; 4],
    pub score: f32,
    pub class_id: u32,
}

impl RawDetection {
    pub fn new(bbox: [f32; 4], score: f32, class_id: u32) -> Self {
        Self {
            bbox,
            score,
            class_id,
        }
    }

    /// Shorthand for a person box.
    pub fn person(bbox: [f32; 4], score: f32) -> Self {
        Self::new(bbox, score, PERSON_CLASS_ID)
    }
}

/// Trait for object detection inference backends.
///
/// Implement this trait to plug any detection model into the pipeline. The
/// model sees every frame once, in order, and returns every class it found;
/// filtering happens in [`PersonDetector`].
///
/// # Example
///
/// ```ignore
/// use headcount_rs::{DetectionSource, Frame, RawDetection};
///
/// struct MyDetector;
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    type Error;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, Self::Error>;
}

impl<D: DetectionSource + ?Sized> DetectionSource for Box<D> {
    type Error = D::Error;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, Self::Error> {
        (**self).detect(frame)
    }
}

/// Wraps a model and keeps only confident person detections.
pub struct PersonDetector<D> {
    source: D,
}

impl<D: DetectionSource> PersonDetector<D> {
    pub fn new(source: D) -> Self {
        Self { source }
    }

    /// Run the model on `frame` and keep people scoring strictly above
    /// `confidence_threshold`.
    pub fn detect(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, D::Error> {
        let raw = self.source.detect(frame)?;
        let total = raw.len();
        let people = filter_people(raw, confidence_threshold);
        trace!(total, kept = people.len(), "filtered detections");
        Ok(people)
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut D {
        &mut self.source
    }

    pub fn into_inner(self) -> D {
        self.source
    }
}

/// Person filter with an exclusive threshold: a score equal to the
/// threshold is dropped.
pub fn filter_people(
    raw: impl IntoIterator<Item = RawDetection>,
    confidence_threshold: f32,
) -> Vec<Detection> {
    raw.into_iter()
        .filter(|d| d.class_id == PERSON_CLASS_ID && d.score > confidence_threshold)
        .map(|d| {
            let [x1, y1, x2, y2] = d.bbox;
            DetectionBuilder::new()
                .tlbr(x1, y1, x2, y2)
                .score(d.score)
                .class_id(d.class_id)
                .build()
        })
        .collect()
}
