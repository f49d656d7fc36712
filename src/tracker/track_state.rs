/// Lifecycle of a track inside the tracker.
///
/// Whether a `Tracked` track is trusted yet is a separate flag
/// ([`STrack::is_activated`](super::STrack)), set once it has enough hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Built from a detection, no identity yet
    #[default]
    New,
    /// Matched in the most recent frame
    Tracked,
    /// Confirmed track that missed the most recent frame
    Lost,
    /// Dropped for good; its identity is never handed out again
    Removed,
}
