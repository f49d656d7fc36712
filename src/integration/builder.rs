//! Builder for creating Detection objects from various input formats.

use crate::integration::detector::PERSON_CLASS_ID;
use crate::tracker::{Detection, Rect};

/// Builder for creating `Detection` objects from various input formats.
///
/// Whatever layout the box comes in, the result is stored as origin + size.
#[derive(Debug, Clone)]
pub struct DetectionBuilder {
    bbox: Rect,
    score: f32,
    class_id: u32,
}

impl Default for DetectionBuilder {
    fn default() -> Self {
        Self {
            bbox: Rect::default(),
            score: 0.0,
            class_id: PERSON_CLASS_ID,
        }
    }
}

impl DetectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box from a corner pair (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = Rect::from_tlbr(x1, y1, x2, y2);
        self
    }

    /// Set bounding box from center and size (cx, cy, w, h).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::new(cx - w / 2.0, cy - h / 2.0, w, h);
        self
    }

    /// Set bounding box from origin and size (x, y, w, h).
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::new(x, y, w, h);
        self
    }

    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn class_id(mut self, class_id: u32) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn build(self) -> Detection {
        Detection::from_rect(self.bbox, self.score).with_class(self.class_id)
    }
}
