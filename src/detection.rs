//! Detector output and the class/confidence filter applied to it.

mod builder;
mod filter;
mod types;

pub use builder::DetectionBuilder;
pub use filter::{CONFIDENCE_THRESHOLD, filter_detections, filter_slices};
pub use types::{Detection, FilteredDetections, RawDetections, ShapeError};
