use std::collections::BTreeSet;

use crate::integration::Track;

/// Every confirmed identity seen during one run.
///
/// Grows only: a person who leaves the frame, or whose track the backend
/// later deletes, stays counted.
#[derive(Debug, Clone, Default)]
pub struct UniqueIdentities {
    ids: BTreeSet<u64>,
}

impl UniqueIdentities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the confirmed tracks of one frame. Returns how many were new.
    pub fn observe(&mut self, tracks: &[Track]) -> usize {
        tracks
            .iter()
            .filter(|track| track.is_confirmed())
            .filter(|track| self.ids.insert(track.id))
            .count()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.ids.iter().copied()
    }
}
