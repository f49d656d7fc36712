//! Main BYTETracker algorithm implementation.

use std::collections::HashSet;

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::rect::{Rect, iou_batch};
use crate::tracker::strack::STrack;
use crate::tracker::track_state::TrackState;

/// Configuration for the BYTETracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Detections at or above this score take part in the first association
    pub track_thresh: f32,
    /// Maximum fused IoU cost for the first association
    pub match_thresh: f32,
    /// Minimum score for an unmatched detection to start a new track
    pub new_track_thresh: f32,
    /// Frames (at 30 fps) a lost confirmed track is kept before removal
    pub track_buffer: u32,
    pub frame_rate: f32,
    /// Consecutive hits before a track is confirmed
    pub n_init: u32,
    /// Weight IoU costs by detection score before matching
    pub fuse_score: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            match_thresh: 0.8,
            new_track_thresh: 0.6,
            track_buffer: 50,
            frame_rate: 30.0,
            n_init: 5,
            fuse_score: true,
        }
    }
}

pub struct BYTETracker {
    tracked_stracks: Vec<STrack>,
    lost_stracks: Vec<STrack>,
    removed_count: usize,
    frame_id: u32,
    next_id: u64,
    config: TrackerConfig,
    max_time_lost: u32,
    kalman_filter: KalmanFilter,
}

impl BYTETracker {
    pub fn new(config: TrackerConfig) -> Self {
        let max_time_lost = (config.frame_rate / 30.0 * config.track_buffer as f32) as u32;
        Self {
            tracked_stracks: Vec::new(),
            lost_stracks: Vec::new(),
            removed_count: 0,
            frame_id: 0,
            next_id: 0,
            config,
            max_time_lost,
            kalman_filter: KalmanFilter::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Frames seen so far.
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Tracks dropped over the tracker's lifetime.
    pub fn removed_count(&self) -> usize {
        self.removed_count
    }

    fn next_track_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Advance one frame.
    ///
    /// Returns every track matched in this frame, tentative ones included;
    /// check [`STrack::is_activated`] to tell them apart.
    pub fn update(&mut self, detections: Vec<Detection>) -> Vec<STrack> {
        self.frame_id += 1;
        let n_init = self.config.n_init;

        let mut activated_stracks = Vec::new();
        let mut refind_stracks = Vec::new();
        let mut lost_stracks = Vec::new();
        let mut removed = 0;

        // Step 1: split detections into high-score and low-score
        let mut detections_high = Vec::new();
        let mut detections_low = Vec::new();
        for det in detections {
            if det.score >= self.config.track_thresh {
                detections_high.push(STrack::new(det.bbox, det.score));
            } else if det.score > 0.1 {
                detections_low.push(STrack::new(det.bbox, det.score));
            }
        }

        let (tracked_stracks, mut unconfirmed): (Vec<_>, Vec<_>) = self
            .tracked_stracks
            .drain(..)
            .partition(|track| track.is_activated);

        let mut strack_pool = joint_stracks(tracked_stracks, &self.lost_stracks);

        // Step 2: first association, confirmed and lost tracks vs high score boxes
        STrack::multi_predict(&mut strack_pool, &self.kalman_filter);

        let mut dists = matching::iou_distance(&rects(&strack_pool), &rects(&detections_high));
        if self.config.fuse_score {
            matching::fuse_score(&mut dists, &as_detections(&detections_high));
        }

        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = matching::linear_assignment(&dists, self.config.match_thresh);

        for (itracked, idet) in matches {
            let mut track = strack_pool[itracked].clone();
            let det = &detections_high[idet];
            if track.state == TrackState::Tracked {
                track.update(det, &self.kalman_filter, self.frame_id, n_init);
                activated_stracks.push(track);
            } else {
                track.re_activate(det, &self.kalman_filter, self.frame_id);
                refind_stracks.push(track);
            }
        }

        // Step 3: second association, leftover tracked tracks vs low score boxes
        let r_tracked_stracks: Vec<STrack> = unmatched_tracks
            .iter()
            .map(|&idx| &strack_pool[idx])
            .filter(|track| track.state == TrackState::Tracked)
            .cloned()
            .collect();

        let dists_second =
            matching::iou_distance(&rects(&r_tracked_stracks), &rects(&detections_low));

        let AssignmentResult {
            matches: matches_second,
            unmatched_tracks: unmatched_tracks_second,
            ..
        } = matching::linear_assignment(&dists_second, 0.5);

        for (itracked, idet) in matches_second {
            let mut track = r_tracked_stracks[itracked].clone();
            track.update(&detections_low[idet], &self.kalman_filter, self.frame_id, n_init);
            activated_stracks.push(track);
        }

        for idx in unmatched_tracks_second {
            let mut track = r_tracked_stracks[idx].clone();
            track.mark_lost();
            lost_stracks.push(track);
        }

        // Tentative tracks only get the high score boxes nobody else took.
        let detections_rem: Vec<STrack> = unmatched_detections
            .into_iter()
            .map(|idx| detections_high[idx].clone())
            .collect();

        let mut dist_unconfirmed =
            matching::iou_distance(&rects(&unconfirmed), &rects(&detections_rem));
        if self.config.fuse_score {
            matching::fuse_score(&mut dist_unconfirmed, &as_detections(&detections_rem));
        }

        let AssignmentResult {
            matches: matches_unconfirmed,
            unmatched_tracks: unmatched_unconfirmed,
            unmatched_detections: unmatched_new,
        } = matching::linear_assignment(&dist_unconfirmed, 0.7);

        for (itracked, idet) in matches_unconfirmed {
            unconfirmed[itracked].update(
                &detections_rem[idet],
                &self.kalman_filter,
                self.frame_id,
                n_init,
            );
            activated_stracks.push(unconfirmed[itracked].clone());
        }
        // A tentative track that misses a frame never becomes a person.
        removed += unmatched_unconfirmed.len();

        // Step 4: init new stracks
        for idx in unmatched_new {
            let mut track = detections_rem[idx].clone();
            if track.score < self.config.new_track_thresh {
                continue;
            }
            let track_id = self.next_track_id();
            track.activate(&self.kalman_filter, track_id, self.frame_id, n_init);
            activated_stracks.push(track);
        }

        // Step 5: expire tracks lost for too long
        for mut track in self.lost_stracks.drain(..) {
            if self.frame_id - track.end_frame() > self.max_time_lost {
                track.mark_removed();
                removed += 1;
            } else {
                lost_stracks.push(track);
            }
        }

        self.tracked_stracks = activated_stracks
            .into_iter()
            .chain(refind_stracks)
            .filter(|t| t.state == TrackState::Tracked)
            .collect();

        let lost_stracks = sub_stracks(lost_stracks, &self.tracked_stracks);
        let (tracked, lost) = remove_duplicate_stracks(&self.tracked_stracks, &lost_stracks);
        self.tracked_stracks = tracked;
        self.lost_stracks = lost;
        self.removed_count += removed;

        self.tracked_stracks.clone()
    }
}

fn rects(stracks: &[STrack]) -> Vec<Rect> {
    stracks.iter().map(STrack::rect).collect()
}

fn as_detections(stracks: &[STrack]) -> Vec<Detection> {
    stracks
        .iter()
        .map(|t| Detection::from_rect(t.rect(), t.score))
        .collect()
}

pub fn joint_stracks(tlista: Vec<STrack>, tlistb: &[STrack]) -> Vec<STrack> {
    let mut exists: HashSet<u64> = tlista.iter().map(|t| t.track_id).collect();
    let mut res = tlista;
    for t in tlistb {
        if exists.insert(t.track_id) {
            res.push(t.clone());
        }
    }
    res
}

pub fn sub_stracks(tlista: Vec<STrack>, tlistb: &[STrack]) -> Vec<STrack> {
    let b_ids: HashSet<u64> = tlistb.iter().map(|t| t.track_id).collect();
    tlista
        .into_iter()
        .filter(|t| !b_ids.contains(&t.track_id))
        .collect()
}

/// Drop near-identical boxes shared by the tracked and lost lists, keeping
/// whichever track has lived longer.
pub fn remove_duplicate_stracks(
    stracksa: &[STrack],
    stracksb: &[STrack],
) -> (Vec<STrack>, Vec<STrack>) {
    if stracksa.is_empty() || stracksb.is_empty() {
        return (stracksa.to_vec(), stracksb.to_vec());
    }

    let ious = iou_batch(&rects(stracksa), &rects(stracksb));

    let mut dupa = vec![false; stracksa.len()];
    let mut dupb = vec![false; stracksb.len()];

    for ((i, j), &iou) in ious.indexed_iter() {
        if iou > 0.85 {
            let time_a = stracksa[i].frame_id - stracksa[i].start_frame;
            let time_b = stracksb[j].frame_id - stracksb[j].start_frame;
            if time_a > time_b {
                dupb[j] = true;
            } else {
                dupa[i] = true;
            }
        }
    }

    let keep = |tracks: &[STrack], dup: &[bool]| -> Vec<STrack> {
        tracks
            .iter()
            .zip(dup)
            .filter(|(_, d)| !**d)
            .map(|(t, _)| t.clone())
            .collect()
    };

    (keep(stracksa, &dupa), keep(stracksb, &dupb))
}
