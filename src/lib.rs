//! # cartrack-rs
//!
//! Vehicle tracking pipeline. Each frame's detections are filtered down to
//! one class above a confidence threshold, fed to a multi-object tracker, and
//! every tracked object that overlaps a filtered detection is persisted with
//! that detection's confidence. Records are buffered and written to SQLite
//! in atomic batches.
//!
//! ## Quick start
//!
//! ```ignore
//! use cartrack_rs::{
//!     ImageSequenceSource, IouTracker, PipelineConfig, ReplayDetector, SqliteStore,
//!     TrackingPipeline,
//! };
//!
//! let config = PipelineConfig::default();
//! let detector = ReplayDetector::open("detections.jsonl")?;
//! let tracker = IouTracker::new(config.tracker.clone());
//! let store = SqliteStore::open("tracking_data.db")?;
//!
//! let mut pipeline = TrackingPipeline::new(detector, tracker, store, &config)?;
//! let summary = pipeline.run(&mut ImageSequenceSource::new("frames/"))?;
//! println!("{} records from {} frames", summary.records_written, summary.frames_processed);
//! ```

pub mod association;
pub mod backends;
pub mod config;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod history;
pub mod integration;
pub mod recorder;
pub mod report;
pub mod storage;
pub mod tracker;

pub use association::{AssociationStrategy, Associator, TrackedObject, TrackingRecord};
pub use backends::{BoxAnnotator, ImageSequenceSource, ReplayDetector};
pub use config::{ConfigError, PipelineConfig};
pub use detection::{Detection, DetectionBuilder, FilteredDetections, RawDetections, filter_detections};
pub use error::{BoxError, PipelineError, Stage};
pub use geometry::{BBox, intersection_over_union};
pub use history::TrackingHistory;
pub use integration::{
    DetectionSource, Frame, FrameAnnotator, FrameSource, MultiObjectTracker, PipelineState,
    RunSummary, StopHandle, StopReason, TrackingPipeline,
};
pub use recorder::{BatchRecorder, FlushError};
pub use storage::{MemoryStore, SqliteStore, TrackingStore};
pub use tracker::{IouTracker, IouTrackerConfig};
