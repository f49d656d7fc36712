//! Detections and the association step between tracks and detections.

use ndarray::Array2;

use crate::tracker::rect::Rect;

/// COCO labels for the classes the pipeline cares about.
const COCO_LABELS: &[&str] = &["person", "bicycle", "car", "motorcycle"];

/// Detection input for the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box, origin + size in pixels
    pub bbox: Rect,
    /// Confidence in `[0, 1]`
    pub score: f32,
    /// COCO class index
    pub class_id: u32,
}

impl Detection {
    /// Person detection from a corner pair.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self::from_rect(Rect::from_tlbr(x1, y1, x2, y2), score)
    }

    pub fn from_rect(bbox: Rect, score: f32) -> Self {
        Self {
            bbox,
            score,
            class_id: 0,
        }
    }

    pub fn with_class(mut self, class_id: u32) -> Self {
        self.class_id = class_id;
        self
    }

    /// Human readable class label, `"unknown"` past the known table.
    pub fn label(&self) -> &'static str {
        COCO_LABELS
            .get(self.class_id as usize)
            .copied()
            .unwrap_or("unknown")
    }
}

/// IoU distance (`1 - IoU`) between every track and detection.
pub fn iou_distance(track_boxes: &[Rect], det_boxes: &[Rect]) -> Array2<f32> {
    Array2::from_shape_fn((track_boxes.len(), det_boxes.len()), |(i, j)| {
        1.0 - track_boxes[i].iou(&det_boxes[j])
    })
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Solve the assignment with LAPJV and reject pairs costlier than `thresh`.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    // lapjv needs a square matrix
    let size = num_rows.max(num_cols);
    let padded = Array2::<f64>::from_shape_fn((size, size), |(i, j)| {
        if i < num_rows && j < num_cols {
            f64::from(cost_matrix[[i, j]])
        } else {
            1e6
        }
    });

    let mut result = AssignmentResult::default();
    let mut detection_free = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row, &col) in row_to_col.iter().enumerate().take(num_rows) {
                if col < num_cols && cost_matrix[[row, col]] <= thresh {
                    result.matches.push((row, col));
                    detection_free[col] = false;
                } else {
                    result.unmatched_tracks.push(row);
                }
            }
        }
        Err(_) => {
            result.unmatched_tracks = (0..num_rows).collect();
        }
    }

    result.unmatched_detections = detection_free
        .iter()
        .enumerate()
        .filter_map(|(i, &free)| free.then_some(i))
        .collect();

    result
}

/// Blend detection confidence into an IoU cost matrix.
pub fn fuse_score(cost_matrix: &mut Array2<f32>, detections: &[Detection]) {
    for ((_, j), cost) in cost_matrix.indexed_iter_mut() {
        let iou_sim = 1.0 - *cost;
        *cost = 1.0 - iou_sim * detections[j].score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_label() {
        let det = Detection::new(0.0, 0.0, 10.0, 20.0, 0.8);
        assert_eq!(det.label(), "person");
        assert_eq!(det.bbox.to_tlwh(), [0.0, 0.0, 10.0, 20.0]);
        assert_eq!(det.clone().with_class(2).label(), "car");
        assert_eq!(det.with_class(99).label(), "unknown");
    }

    #[test]
    fn test_linear_assignment_rejects_expensive_pairs() {
        let tracks = [Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(100.0, 100.0, 10.0, 10.0)];
        let dets = [Rect::new(1.0, 1.0, 10.0, 10.0), Rect::new(300.0, 300.0, 10.0, 10.0)];
        let dists = iou_distance(&tracks, &dets);

        let result = linear_assignment(&dists, 0.8);
        assert_eq!(result.matches, vec![(0, 0)]);
        assert_eq!(result.unmatched_tracks, vec![1]);
        assert_eq!(result.unmatched_detections, vec![1]);
    }

    #[test]
    fn test_linear_assignment_empty_sides() {
        let result = linear_assignment(&Array2::zeros((0, 3)), 0.8);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_detections, vec![0, 1, 2]);

        let result = linear_assignment(&Array2::zeros((2, 0)), 0.8);
        assert_eq!(result.unmatched_tracks, vec![0, 1]);
    }

    #[test]
    fn test_fuse_score() {
        let mut cost = Array2::from_elem((1, 1), 0.0_f32);
        fuse_score(&mut cost, &[Detection::new(0.0, 0.0, 1.0, 1.0, 0.5)]);
        assert!((cost[[0, 0]] - 0.5).abs() < 1e-6);
    }
}
