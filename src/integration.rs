//! Integration module connecting detectors, trackers, frame sources and
//! storage into a per-frame tracking pipeline.
//!
//! The traits here are the seams for external collaborators; bundled
//! implementations live in [`crate::backends`] and [`crate::tracker`].

mod annotator;
mod detector;
mod pipeline;
mod source;
mod tracker;

pub use annotator::FrameAnnotator;
pub use detector::DetectionSource;
pub use pipeline::{PipelineState, RunSummary, StopHandle, StopReason, TrackingPipeline};
pub use source::{Frame, FrameSource};
pub use tracker::MultiObjectTracker;
