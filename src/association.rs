//! Association of tracker output with the filtered detections of a frame.

mod engine;
mod matching;
mod types;

pub use engine::{AssociationStrategy, Associator, IOU_MATCH_FLOOR};
pub use matching::{Assignment, greedy_assignment, linear_assignment};
pub use types::{TrackedObject, TrackingRecord};
