//! ByteTrack multi-object tracker used as the default tracking backend.
//!
//! Tracks need `n_init` consecutive hits before they are activated
//! (confirmed); a tentative track that misses a single frame is dropped and a
//! confirmed one survives `track_buffer` frames of absence.

mod byte_tracker;
mod kalman_filter;
mod matching;
mod rect;
mod strack;
mod track_state;

pub use byte_tracker::{BYTETracker, TrackerConfig};
pub use matching::Detection;
pub use rect::Rect;
pub use strack::STrack;
pub use track_state::TrackState;
