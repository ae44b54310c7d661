//! Bundled multi-object tracker.

mod iou_tracker;
mod track_state;

pub use iou_tracker::{IouTracker, IouTrackerConfig};
pub use track_state::TrackState;
